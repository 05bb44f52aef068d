//! ActivateSetup instruction handler
//!
//! Permissionless renewal of an expired Locked setup. Consumes one of the
//! setup's remaining renewals and re-arms a same-length window starting at
//! the current block. Only possible once every position has exited.

use {
    crate::state::farm::Farm,
    anchor_lang::prelude::*,
};

/// Accounts required for activating a setup
#[derive(Accounts)]
pub struct ActivateSetup<'info> {
    /// Farm singleton (mutable, setup window will be re-armed)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump
    )]
    pub farm: Box<Account<'info, Farm>>,
}

/// Parameters for activating a setup
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct ActivateSetupParams {
    /// Arena index of the setup to renew
    pub setup_index: u64,
}

pub fn activate_setup(ctx: Context<ActivateSetup>, params: &ActivateSetupParams) -> Result<()> {
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    farm.activate_setup(params.setup_index, block)?;

    let setup = farm.setup(params.setup_index)?;
    msg!(
        "Setup {} renewed for [{}, {})",
        params.setup_index,
        setup.start_block,
        setup.end_block
    );

    Ok(())
}
