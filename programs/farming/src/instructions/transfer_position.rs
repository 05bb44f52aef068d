//! TransferPosition instruction handler
//!
//! Reassigns a position to a new owner. Bookkeeping is untouched; only the
//! claim on the stake and its future reward moves.

use {
    crate::{
        error::FarmError,
        state::position::Position,
    },
    anchor_lang::prelude::*,
};

/// Accounts required for transferring a position
#[derive(Accounts)]
pub struct TransferPosition<'info> {
    /// Current position owner (signer)
    pub owner: Signer<'info>,

    /// Position being transferred
    #[account(
        mut,
        has_one = owner @ FarmError::Unauthorized,
        seeds = [b"position", &position.id.to_le_bytes()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, Position>>,
}

/// Parameters for transferring a position
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct TransferPositionParams {
    /// New owner of the position
    pub new_owner: Pubkey,
}

pub fn transfer_position(
    ctx: Context<TransferPosition>,
    params: &TransferPositionParams,
) -> Result<()> {
    let position = ctx.accounts.position.as_mut();
    require!(position.is_open(), FarmError::PositionClosed);
    require_keys_neq!(params.new_owner, Pubkey::default(), FarmError::InvalidOwner);

    msg!("Transfer position {} to {}", position.id, params.new_owner);
    position.owner = params.new_owner;

    Ok(())
}
