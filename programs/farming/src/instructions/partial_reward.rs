//! PartialReward instruction handler
//!
//! Pays out a position's realized reward without touching the stake. Free
//! positions collect their pro-rata accrual; Locked positions collect only
//! what has vested by elapsed blocks.

use {
    crate::{
        error::FarmError,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
    anchor_spl::token::{Token, TokenAccount},
};

/// Accounts required for a partial reward claim
#[derive(Accounts)]
pub struct PartialReward<'info> {
    /// Position owner (signer)
    pub owner: Signer<'info>,

    /// User's token account receiving the reward
    #[account(
        mut,
        constraint = receiving_account.mint == farm.reward_mint,
        constraint = receiving_account.owner == owner.key()
    )]
    pub receiving_account: Box<Account<'info, TokenAccount>>,

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

    /// Position being claimed against
    #[account(
        mut,
        has_one = owner @ FarmError::Unauthorized,
        seeds = [b"position", &position.id.to_le_bytes()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, Position>>,

    /// Vault holding the reward budget
    #[account(
        mut,
        seeds = [b"reward_vault"],
        bump = farm.reward_vault_bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    token_program: Program<'info, Token>,
}

pub fn partial_reward(ctx: Context<PartialReward>) -> Result<()> {
    msg!("Settle accrued reward");
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    let position = ctx.accounts.position.as_mut();
    let payout = farm.collect_partial_reward(position, block)?;
    msg!("Reward out: {}", payout);

    if payout > 0 {
        msg!("Transfer tokens");
        ctx.accounts.farm.transfer_tokens(
            ctx.accounts.reward_vault.to_account_info(),
            ctx.accounts.receiving_account.to_account_info(),
            ctx.accounts.transfer_authority.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            payout,
        )?;
    }

    Ok(())
}
