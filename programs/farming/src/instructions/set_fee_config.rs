//! SetFeeConfig instruction handler
//!
//! Governance update of the protocol exit fee and its receiver. Applies to
//! unlocks settled after the update; positions carry no fee snapshot.

use {
    crate::{error::FarmError, state::farm::Farm},
    anchor_lang::prelude::*,
};

/// Accounts required for updating the fee configuration
#[derive(Accounts)]
pub struct SetFeeConfig<'info> {
    /// Farm authority (signer)
    pub authority: Signer<'info>,

    /// Farm singleton (mutable, fee configuration will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump,
        has_one = authority @ FarmError::Unauthorized
    )]
    pub farm: Box<Account<'info, Farm>>,
}

/// Parameters for updating the fee configuration
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct SetFeeConfigParams {
    /// Protocol exit fee, parts of [`Farm::ONE_HUNDRED`]
    pub exit_fee_bps: u64,
    /// Receiver of the protocol exit fee
    pub fee_receiver: Pubkey,
}

pub fn set_fee_config(ctx: Context<SetFeeConfig>, params: &SetFeeConfigParams) -> Result<()> {
    let farm = ctx.accounts.farm.as_mut();

    farm.exit_fee_bps = params.exit_fee_bps;
    farm.fee_receiver = params.fee_receiver;

    if !farm.validate() {
        return err!(FarmError::InvalidSetupConfig);
    }

    Ok(())
}
