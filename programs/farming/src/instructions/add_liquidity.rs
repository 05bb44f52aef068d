//! AddLiquidity instruction handler
//!
//! Adds stake to an existing position. Accrual up to the current block is
//! realized first; Locked positions are re-reserved at the setup's rate at
//! addition time over the remaining window.

use {
    crate::{
        adapter,
        error::FarmError,
        math,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
    anchor_spl::token::{Mint, Token, TokenAccount},
};

/// Accounts required for adding liquidity to a position
#[derive(Accounts)]
pub struct AddLiquidity<'info> {
    /// Position owner (signer)
    #[account(mut)]
    pub owner: Signer<'info>,

    /// User's token account the extra stake is pulled from
    #[account(
        mut,
        constraint = funding_account.owner == owner.key()
    )]
    pub funding_account: Box<Account<'info, TokenAccount>>,

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

    /// Position being increased
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

    /// AMM adapter program for main-token conversions
    ///
    /// CHECK: validated against the farm's configured adapter
    #[account(
        constraint = adapter_program.key() == farm.adapter_program
    )]
    pub adapter_program: AccountInfo<'info>,

    token_program: Program<'info, Token>,
    // remaining accounts: forwarded to the adapter on main-token conversions
}

/// Parameters for adding liquidity
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct AddLiquidityParams {
    /// Stake amount, in LP units or main-token units
    pub amount: u64,
    /// Whether `amount` is already denominated in liquidity-pool tokens
    pub amount_is_lp_token: bool,
}

pub fn add_liquidity<'info>(
    ctx: Context<'_, '_, '_, 'info, AddLiquidity<'info>>,
    params: &AddLiquidityParams,
) -> Result<()> {
    msg!("Validate inputs");
    let farm = ctx.accounts.farm.as_mut();
    let setup = farm.setup(ctx.accounts.position.setup_index)?;
    require_keys_eq!(
        ctx.accounts.lp_mint.key(),
        setup.liquidity_pool_token,
        FarmError::InvalidSetupConfig
    );
    let expected_funding_mint = if params.amount_is_lp_token {
        setup.liquidity_pool_token
    } else {
        setup.main_token
    };
    require_keys_eq!(
        ctx.accounts.funding_account.mint,
        expected_funding_mint,
        FarmError::InvalidSetupConfig
    );

    let lp_amount = if params.amount_is_lp_token {
        params.amount
    } else {
        msg!("Convert main tokens through adapter");
        let vault_before = ctx.accounts.setup_vault.amount;

        farm.begin_external_call()?;
        ctx.accounts.farm.exit(&crate::ID)?;
        let produced = adapter::wrap_liquidity(
            &ctx.accounts.adapter_program,
            ctx.remaining_accounts,
            params.amount,
            &[],
        )?;
        let farm = ctx.accounts.farm.as_mut();
        farm.end_external_call();

        ctx.accounts.setup_vault.reload()?;
        let received = math::checked_sub(ctx.accounts.setup_vault.amount, vault_before)?;
        require!(received >= produced, FarmError::InvalidAdapterResponse);
        produced
    };

    msg!("Update position");
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    let position = ctx.accounts.position.as_mut();
    farm.add_liquidity(position, lp_amount, block)?;

    if params.amount_is_lp_token {
        msg!("Transfer tokens");
        ctx.accounts.farm.transfer_tokens_from_user(
            ctx.accounts.funding_account.to_account_info(),
            ctx.accounts.setup_vault.to_account_info(),
            ctx.accounts.owner.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            lp_amount,
        )?;
    }

    Ok(())
}
