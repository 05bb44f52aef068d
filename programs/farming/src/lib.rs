//! Liquidity farming program
//!
//! Stake liquidity-pool tokens into reward campaigns ("setups") and accrue
//! rewards per block. Free setups pay a pro-rata share of a shared rate and
//! can be left at any time; Locked setups reserve a deterministic rate per
//! position at entry for a fixed block window, with an early-exit penalty.
//! A pinned Free setup absorbs every unit of rate the Locked setups have not
//! reserved.

pub mod adapter;
pub mod error;
pub mod instructions;
pub mod math;
pub mod state;

use {
    anchor_lang::prelude::*,
    instructions::*,
    solana_security_txt::security_txt,
};

#[cfg(not(feature = "no-entrypoint"))]
security_txt! {
    name: "Farming",
    project_url: "https://github.com/solana-farming/farming",
    contacts: "email:security@solana-farming.dev",
    policy: "Please report security vulnerabilities by email. We aim to respond within 48 hours.",
    source_code: "https://github.com/solana-farming/farming",
    preferred_languages: "en"
}

declare_id!("FarMNg6yU4ZsHxGZ2HXM1A9QdPJxLpSXLWCnaEBWzCd1");

#[program]
pub mod farming {
    use super::*;

    /// Initialize the farm (called once by the upgrade authority)
    pub fn initialize(ctx: Context<Initialize>, params: InitializeParams) -> Result<()> {
        instructions::initialize(ctx, &params)
    }

    /// Add or update setups (governance)
    pub fn configure(ctx: Context<Configure>, params: ConfigureParams) -> Result<()> {
        instructions::configure(ctx, &params)
    }

    /// Update the protocol exit fee and its receiver (governance)
    pub fn set_fee_config(ctx: Context<SetFeeConfig>, params: SetFeeConfigParams) -> Result<()> {
        instructions::set_fee_config(ctx, &params)
    }

    /// Stake liquidity into a setup, creating a new position
    pub fn open_position<'info>(
        ctx: Context<'_, '_, '_, 'info, OpenPosition<'info>>,
        params: OpenPositionParams,
    ) -> Result<()> {
        instructions::open_position(ctx, &params)
    }

    /// Add stake to an existing position
    pub fn add_liquidity<'info>(
        ctx: Context<'_, '_, '_, 'info, AddLiquidity<'info>>,
        params: AddLiquidityParams,
    ) -> Result<()> {
        instructions::add_liquidity(ctx, &params)
    }

    /// Collect realized reward without touching the stake
    pub fn partial_reward(ctx: Context<PartialReward>) -> Result<()> {
        instructions::partial_reward(ctx)
    }

    /// Exit a position in full, returning stake and all unpaid reward
    pub fn withdraw<'info>(
        ctx: Context<'_, '_, '_, 'info, Withdraw<'info>>,
        params: WithdrawParams,
    ) -> Result<()> {
        instructions::withdraw(ctx, &params)
    }

    /// Exit a Locked position before maturity, paying the penalty
    pub fn unlock<'info>(
        ctx: Context<'_, '_, '_, 'info, Unlock<'info>>,
        params: UnlockParams,
    ) -> Result<()> {
        instructions::unlock(ctx, &params)
    }

    /// Reassign a position to a new owner
    pub fn transfer_position(
        ctx: Context<TransferPosition>,
        params: TransferPositionParams,
    ) -> Result<()> {
        instructions::transfer_position(ctx, &params)
    }

    /// Recompute the pinned setup's effective rate (permissionless)
    pub fn rebalance_setup(ctx: Context<RebalanceSetup>) -> Result<()> {
        instructions::rebalance_setup(ctx)
    }

    /// Renew an expired Locked setup (permissionless)
    pub fn activate_setup(
        ctx: Context<ActivateSetup>,
        params: ActivateSetupParams,
    ) -> Result<()> {
        instructions::activate_setup(ctx, &params)
    }

    /// Set the block override (test builds only)
    pub fn set_test_block(ctx: Context<SetTestBlock>, params: SetTestBlockParams) -> Result<()> {
        instructions::set_test_block(ctx, &params)
    }
}
