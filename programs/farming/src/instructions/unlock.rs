//! Unlock instruction handler
//!
//! Early exit from a Locked position before its window ends. The owner keeps
//! vested-but-unclaimed reward, forfeits everything still scheduled, pays the
//! setup's penalty on the forfeited amount in the reward asset, and pays the
//! protocol exit fee out of the returned stake.

use {
    crate::{
        adapter,
        error::FarmError,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
    anchor_spl::token::{Mint, Token, TokenAccount},
};

/// Accounts required for unlocking a position early
#[derive(Accounts)]
pub struct Unlock<'info> {
    /// Position owner (signer)
    pub owner: Signer<'info>,

    /// User's token account the penalty is paid from
    #[account(
        mut,
        constraint = penalty_funding_account.mint == farm.reward_mint,
        constraint = penalty_funding_account.owner == owner.key()
    )]
    pub penalty_funding_account: Box<Account<'info, TokenAccount>>,

    /// User's token account receiving the stake
    ///
    /// Holds liquidity-pool tokens, or the pair's main token when unwrapping
    #[account(
        mut,
        constraint = receiving_account.owner == owner.key()
    )]
    pub receiving_account: Box<Account<'info, TokenAccount>>,

    /// User's token account receiving the vested reward
    #[account(
        mut,
        constraint = reward_receiving_account.mint == farm.reward_mint,
        constraint = reward_receiving_account.owner == owner.key()
    )]
    pub reward_receiving_account: Box<Account<'info, TokenAccount>>,

    /// Fee receiver's token account for the protocol exit fee (LP units)
    #[account(
        mut,
        constraint = fee_account.owner == farm.fee_receiver,
        constraint = fee_account.mint == lp_mint.key()
    )]
    pub fee_account: Box<Account<'info, TokenAccount>>,

    /// Transfer authority PDA for token transfers
    ///
    /// CHECK: Empty PDA, authority for token accounts
    #[account(
        seeds = [b"transfer_authority"],
        bump = farm.transfer_authority_bump
    )]
    pub transfer_authority: AccountInfo<'info>,

    /// Farm singleton (mutable, setup stats will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump
    )]
    pub farm: Box<Account<'info, Farm>>,

    /// Position being unlocked
    #[account(
        mut,
        has_one = owner @ FarmError::Unauthorized,
        seeds = [b"position", &position.id.to_le_bytes()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, Position>>,

    /// Mint of the setup's liquidity-pool token
    pub lp_mint: Box<Account<'info, Mint>>,

    /// Farm vault holding staked liquidity-pool tokens for this mint
    #[account(
        mut,
        seeds = [b"vault", lp_mint.key().as_ref()],
        bump
    )]
    pub setup_vault: Box<Account<'info, TokenAccount>>,

    /// Vault holding the reward budget; also receives penalties
    #[account(
        mut,
        seeds = [b"reward_vault"],
        bump = farm.reward_vault_bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    /// AMM adapter program for main-token conversions
    ///
    /// CHECK: validated against the farm's configured adapter
    #[account(
        constraint = adapter_program.key() == farm.adapter_program
    )]
    pub adapter_program: AccountInfo<'info>,

    token_program: Program<'info, Token>,
    // remaining accounts: forwarded to the adapter when unwrapping
}

/// Parameters for unlocking a position
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct UnlockParams {
    /// Unwrap the returned stake into the pair's main token
    pub unwrap: bool,
}

pub fn unlock<'info>(
    ctx: Context<'_, '_, '_, 'info, Unlock<'info>>,
    params: &UnlockParams,
) -> Result<()> {
    msg!("Validate inputs");
    let farm = ctx.accounts.farm.as_mut();
    let setup = farm.setup(ctx.accounts.position.setup_index)?;
    require_keys_eq!(
        ctx.accounts.lp_mint.key(),
        setup.liquidity_pool_token,
        FarmError::InvalidSetupConfig
    );
    let expected_receiving_mint = if params.unwrap {
        setup.main_token
    } else {
        setup.liquidity_pool_token
    };
    require_keys_eq!(
        ctx.accounts.receiving_account.mint,
        expected_receiving_mint,
        FarmError::InvalidSetupConfig
    );

    msg!("Settle position");
    let block = farm.get_block()?;
    let position = ctx.accounts.position.as_mut();
    let amounts = farm.unlock(position, block)?;
    msg!("Amounts out: {:?}", amounts);

    // Penalty is pulled up front; the unlock fails if the owner cannot pay
    require!(
        ctx.accounts.penalty_funding_account.amount >= amounts.penalty,
        FarmError::InsufficientPenaltyPayment
    );

    if amounts.penalty > 0 {
        msg!("Collect penalty");
        ctx.accounts.farm.transfer_tokens_from_user(
            ctx.accounts.penalty_funding_account.to_account_info(),
            ctx.accounts.reward_vault.to_account_info(),
            ctx.accounts.owner.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            amounts.penalty,
        )?;
    }

    if amounts.reward > 0 {
        msg!("Transfer vested reward");
        ctx.accounts.farm.transfer_tokens(
            ctx.accounts.reward_vault.to_account_info(),
            ctx.accounts.reward_receiving_account.to_account_info(),
            ctx.accounts.transfer_authority.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            amounts.reward,
        )?;
    }

    if params.unwrap {
        // Bookkeeping is final and flushed before the adapter runs
        msg!("Unwrap stake through adapter");
        let farm = ctx.accounts.farm.as_mut();
        farm.begin_external_call()?;
        ctx.accounts.farm.exit(&crate::ID)?;

        let authority_seeds: &[&[&[u8]]] = &[&[
            b"transfer_authority",
            &[ctx.accounts.farm.transfer_authority_bump],
        ]];
        adapter::unwrap_liquidity(
            &ctx.accounts.adapter_program,
            ctx.remaining_accounts,
            amounts.staked,
            authority_seeds,
        )?;

        let farm = ctx.accounts.farm.as_mut();
        farm.end_external_call();
    } else {
        msg!("Transfer stake");
        ctx.accounts.farm.transfer_tokens(
            ctx.accounts.setup_vault.to_account_info(),
            ctx.accounts.receiving_account.to_account_info(),
            ctx.accounts.transfer_authority.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            amounts.staked,
        )?;
    }

    if amounts.exit_fee > 0 {
        msg!("Transfer exit fee");
        ctx.accounts.farm.transfer_tokens(
            ctx.accounts.setup_vault.to_account_info(),
            ctx.accounts.fee_account.to_account_info(),
            ctx.accounts.transfer_authority.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            amounts.exit_fee,
        )?;
    }

    Ok(())
}
