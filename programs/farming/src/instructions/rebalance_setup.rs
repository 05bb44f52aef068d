//! RebalanceSetup instruction handler
//!
//! Permissionless recomputation of the pinned Free setup's effective rate.
//! Anyone may call it at any time; the result depends only on the current
//! block and the setups' reservation state, so repeated calls are harmless.

use {
    crate::state::farm::Farm,
    anchor_lang::prelude::*,
};

/// Accounts required for rebalancing the pinned setup
#[derive(Accounts)]
pub struct RebalanceSetup<'info> {
    /// Farm singleton (mutable, pinned setup rate will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump
    )]
    pub farm: Box<Account<'info, Farm>>,
}

pub fn rebalance_setup(ctx: Context<RebalanceSetup>) -> Result<()> {
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    let rate = farm.rebalance_pinned_setup(block)?;
    msg!("Pinned setup rate: {}", rate);

    Ok(())
}
