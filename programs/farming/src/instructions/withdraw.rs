//! Withdraw instruction handler
//!
//! Full exit from a position: returns the stake and pays all unpaid reward.
//! Free positions may leave at any block; Locked positions only once their
//! window has ended. The stake comes back as liquidity-pool tokens or, when
//! requested, unwrapped into the pair's main token through the adapter.

use {
    crate::{
        adapter,
        error::FarmError,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
    anchor_spl::token::{Mint, Token, TokenAccount},
};

/// Accounts required for withdrawing a position
#[derive(Accounts)]
pub struct Withdraw<'info> {
    /// Position owner (signer)
    pub owner: Signer<'info>,

    /// User's token account receiving the stake
    ///
    /// Holds liquidity-pool tokens, or the pair's main token when unwrapping
    #[account(
        mut,
        constraint = receiving_account.owner == owner.key()
    )]
    pub receiving_account: Box<Account<'info, TokenAccount>>,

    /// User's token account receiving the reward
    #[account(
        mut,
        constraint = reward_receiving_account.mint == farm.reward_mint,
        constraint = reward_receiving_account.owner == owner.key()
    )]
    pub reward_receiving_account: Box<Account<'info, TokenAccount>>,

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

    /// Position being withdrawn
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

    /// Vault holding the reward budget
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

/// Parameters for withdrawing a position
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct WithdrawParams {
    /// Unwrap the returned stake into the pair's main token
    pub unwrap: bool,
}

pub fn withdraw<'info>(
    ctx: Context<'_, '_, '_, 'info, Withdraw<'info>>,
    params: &WithdrawParams,
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
    let amounts = farm.withdraw(position, block)?;
    msg!("Amounts out: {:?}", amounts);

    if amounts.reward > 0 {
        msg!("Transfer reward");
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

    Ok(())
}
