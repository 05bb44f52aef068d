//! SetTestBlock instruction handler
//!
//! Sets the block override used by `Farm::get_block` when the program is
//! compiled with the "test" feature. Not available in production builds.

use {
    crate::{error::FarmError, state::farm::Farm},
    anchor_lang::prelude::*,
};

/// Accounts required for setting the test block
#[derive(Accounts)]
pub struct SetTestBlock<'info> {
    /// Farm authority (signer)
    pub authority: Signer<'info>,

    /// Farm singleton (mutable, block override will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump,
        has_one = authority @ FarmError::Unauthorized
    )]
    pub farm: Box<Account<'info, Farm>>,
}

/// Parameters for setting the test block
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct SetTestBlockParams {
    /// Block height to report from `Farm::get_block`
    pub block: u64,
}

pub fn set_test_block(ctx: Context<SetTestBlock>, params: &SetTestBlockParams) -> Result<()> {
    // Only available when compiled with the "test" feature
    if !cfg!(feature = "test") {
        return err!(FarmError::InvalidEnvironment);
    }

    ctx.accounts.farm.current_block = params.block;

    Ok(())
}
