//! Configure instruction handler
//!
//! Governance batch entry point: add new setups to the arena or update
//! existing ones by index. Grows the farm account as needed and rebalances
//! the pinned setup after applying the batch.

use {
    crate::state::farm::{Farm, SetupConfig},
    anchor_lang::prelude::*,
};

/// Accounts required for configuring setups
#[derive(Accounts)]
pub struct Configure<'info> {
    /// Farm authority; pays for account growth
    #[account(mut)]
    pub authority: Signer<'info>,

    /// Farm singleton (mutable, setup arena will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump,
        has_one = authority @ crate::error::FarmError::Unauthorized
    )]
    pub farm: Box<Account<'info, Farm>>,

    system_program: Program<'info, System>,
}

/// Parameters for configuring setups
#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct ConfigureParams {
    /// Batch of add/update entries, applied in order
    pub setups: Vec<SetupConfig>,
}

pub fn configure(ctx: Context<Configure>, params: &ConfigureParams) -> Result<()> {
    // Grow the farm account up front so the arena can absorb the adds
    msg!("Resize farm account");
    let additions = params.setups.iter().filter(|entry| entry.add).count();
    if additions > 0 {
        let new_len = Farm::space(ctx.accounts.farm.setups.len() + additions);
        Farm::realloc(
            ctx.accounts.authority.to_account_info(),
            ctx.accounts.farm.to_account_info(),
            ctx.accounts.system_program.to_account_info(),
            new_len,
            false,
        )?;
    }

    msg!("Apply setup configuration");
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    farm.configure(&params.setups, block)?;

    Ok(())
}
