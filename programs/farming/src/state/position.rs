//! Position state
//!
//! A position is one staker's claim against a setup: the staked liquidity
//! plus its accrual bookkeeping. Positions are addressed by a monotonically
//! increasing id that is never reused.

use anchor_lang::prelude::*;

/// Position account - one stake against one setup
///
/// Lifecycle: opened, mutated by add-liquidity and partial claims, then
/// terminated by withdraw or unlock. Termination zeroes the record; a closed
/// position is never reopened.
#[account]
#[derive(Default, Debug)]
pub struct Position {
    /// Monotonic position id (also the PDA seed)
    pub id: u64,
    /// Current owner; reassignable only through an explicit transfer
    pub owner: Pubkey,
    /// Index of the setup this position stakes into
    pub setup_index: u64,
    /// Staked amount in liquidity-pool-token units
    pub staked_amount: u64,
    /// Entry-time rate snapshot (Locked setups; 0 for Free)
    pub locked_reward_per_block: u64,
    /// Block at which the position was opened
    pub creation_block: u64,
    /// Block of the last accrual-realizing interaction
    pub last_interaction_block: u64,
    /// Scheduled entitlement still ahead of `last_interaction_block`
    /// (Locked setups; recomputed on demand for Free)
    pub reward: u64,
    /// Reward already realized but not yet paid out
    pub accrued_reward: u64,
    /// Setup reward-per-token index at the last interaction (Free setups;
    /// 0 for Locked)
    pub reward_per_token_paid: u128,
    /// Mirror of the setup's kind (true for Free)
    pub free: bool,

    /// Bump seed for the position PDA
    pub bump: u8,
}

impl Position {
    /// Account size in bytes (8 byte discriminator + data)
    pub const LEN: usize = 8 + std::mem::size_of::<Position>();

    /// A position is open while it still holds stake
    pub fn is_open(&self) -> bool {
        self.staked_amount > 0
    }

    /// Terminate the position, keeping only its identity fields
    ///
    /// The id, setup index and bump survive so the account remains a valid,
    /// queryable tombstone; everything value-bearing is zeroed.
    pub fn close_out(&mut self) {
        self.staked_amount = 0;
        self.locked_reward_per_block = 0;
        self.reward = 0;
        self.accrued_reward = 0;
        self.reward_per_token_paid = 0;
        self.last_interaction_block = 0;
    }
}
