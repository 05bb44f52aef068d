//! Setup state and the reward accrual engine
//!
//! A setup is one reward campaign: its own rate, time window, and capacity.
//! Free setups accrue continuously and pro-rata; Locked setups reserve a
//! deterministic per-position rate eagerly at entry. Both variants share the
//! same record, dispatched on [`SetupKind`].

use {
    crate::{
        error::FarmError,
        math,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
};

/// Setup kind (reward accrual model)
#[derive(Copy, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize, Debug)]
pub enum SetupKind {
    /// Open-ended, continuously accruing, pro-rata reward pool
    Free,
    /// Time-boxed pool with eagerly reserved, deterministic rewards
    Locked,
}

impl Default for SetupKind {
    fn default() -> Self {
        Self::Free
    }
}

/// One reward campaign
///
/// Setups live inline in the farm's append-only arena; an index handed out
/// once stays valid forever. Disabling a setup only flips `active`.
#[derive(Copy, Clone, PartialEq, AnchorSerialize, AnchorDeserialize, Default, Debug)]
pub struct Setup {
    /// Accrual model for this campaign
    pub kind: SetupKind,
    /// Mint of the liquidity-pool receipt token staked into this setup
    pub liquidity_pool_token: Pubkey,
    /// Mint of the pair's main token (adapter-side conversions)
    pub main_token: Pubkey,
    /// First block of the reward window
    pub start_block: u64,
    /// End of the reward window, exclusive (0 = open-ended, Free only)
    pub end_block: u64,
    /// Nominal budget rate (reward tokens per block)
    pub reward_per_block: u64,
    /// Effective rate after reservations (Locked) or rebalancing (Free)
    pub current_reward_per_block: u64,
    /// Sum of open positions' locked rates (Locked only)
    pub reserved_reward_per_block: u64,
    /// Running sum of live positions' staked amounts (LP units)
    pub total_staked: u64,
    /// Cumulative reward per staked token, scaled by REWARD_INDEX_SCALE
    /// (Free only; folded forward on every stake or rate change)
    pub reward_per_token_stored: u128,
    /// Block of the last mutation touching this setup
    pub last_update_block: u64,
    /// Penalty on forfeited reward at early exit, parts of ONE_HUNDRED
    pub penalty_fee_bps: u64,
    /// Remaining times an expired window may be re-armed
    pub renewals_remaining: u32,
    /// Whether the setup accepts interaction
    pub active: bool,
    /// Capacity absorber flag; at most one Free setup carries it
    pub pinned: bool,
}

impl Setup {
    /// Serialized size in bytes (setups are stored inline in the farm)
    pub const SIZE: usize = 1 + // kind
        32 + // liquidity_pool_token
        32 + // main_token
        8 + // start_block
        8 + // end_block
        8 + // reward_per_block
        8 + // current_reward_per_block
        8 + // reserved_reward_per_block
        8 + // total_staked
        16 + // reward_per_token_stored
        8 + // last_update_block
        8 + // penalty_fee_bps
        4 + // renewals_remaining
        1 + // active
        1; // pinned

    /// Scale of the cumulative reward-per-token index
    pub const REWARD_INDEX_SCALE: u128 = 1_000_000_000_000;

    /// Validate the setup definition
    ///
    /// Free setups are open-ended and carry no penalty; Locked setups need a
    /// non-empty window and a penalty within the fixed denominator. The
    /// pinned flag is meaningful for Free setups only.
    pub fn validate(&self) -> bool {
        let kind_ok = match self.kind {
            SetupKind::Free => self.end_block == 0 && self.penalty_fee_bps == 0,
            SetupKind::Locked => {
                self.end_block > self.start_block
                    && (self.penalty_fee_bps as u128) <= Farm::ONE_HUNDRED
                    && !self.pinned
            }
        };
        kind_ok
            && self.reward_per_block > 0
            && self.reserved_reward_per_block <= self.reward_per_block
    }

    /// Whether the setup's reward window covers the given block
    ///
    /// The end bound is exclusive: a Locked setup at exactly `end_block` is
    /// no longer time-active. Free setups are time-active while enabled.
    pub fn is_time_active(&self, block: u64) -> bool {
        self.active
            && match self.kind {
                SetupKind::Free => true,
                SetupKind::Locked => self.start_block <= block && block < self.end_block,
            }
    }

    /// Whether new stake is accepted at the given block
    pub fn accepts_stake(&self, block: u64) -> bool {
        self.is_time_active(block)
    }

    /// Unreserved budget still available to new Locked positions
    pub fn unreserved_reward_per_block(&self) -> u64 {
        self.reward_per_block
            .saturating_sub(self.reserved_reward_per_block)
    }

    /// Rate snapshot for a stake joining a Locked setup
    ///
    /// `current_reward_per_block * stake / total_staked_after`, floor.
    /// `total_staked_after` already includes the stake being priced.
    pub fn reservation_for_stake(&self, stake: u64, total_staked_after: u64) -> Result<u64> {
        if total_staked_after == 0 {
            return err!(FarmError::InvalidAmount);
        }
        math::checked_as_u64(math::checked_div(
            math::checked_mul(self.current_reward_per_block as u128, stake as u128)?,
            total_staked_after as u128,
        )?)
    }

    /// Reserve capacity for a Locked position
    ///
    /// Fails with a capacity error instead of ever letting the effective rate
    /// go negative; the setup can never promise more than its nominal budget.
    pub fn reserve_capacity(&mut self, reward_per_block: u64) -> Result<()> {
        self.current_reward_per_block = self
            .current_reward_per_block
            .checked_sub(reward_per_block)
            .ok_or(FarmError::InsufficientRewardCapacity)?;
        self.reserved_reward_per_block =
            math::checked_add(self.reserved_reward_per_block, reward_per_block)?;
        if self.reserved_reward_per_block > self.reward_per_block {
            return err!(FarmError::InsufficientRewardCapacity);
        }
        Ok(())
    }

    /// Release a position's reservation back into the unreserved budget
    pub fn release_capacity(&mut self, reward_per_block: u64) -> Result<()> {
        self.reserved_reward_per_block =
            math::checked_sub(self.reserved_reward_per_block, reward_per_block)?;
        self.current_reward_per_block =
            math::checked_sub(self.reward_per_block, self.reserved_reward_per_block)?;
        Ok(())
    }

    /// Cumulative reward-per-token index projected to the given block
    ///
    /// Extends the stored index by the current rate over the blocks since
    /// the last fold. With no stake the index stands still; the emission of
    /// those blocks belongs to nobody.
    pub fn reward_index_at(&self, at_block: u64) -> Result<u128> {
        if self.kind != SetupKind::Free || self.total_staked == 0 {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = at_block.saturating_sub(self.last_update_block);
        math::checked_add(
            self.reward_per_token_stored,
            math::checked_div(
                math::checked_mul(
                    math::checked_mul(self.current_reward_per_block as u128, elapsed as u128)?,
                    Self::REWARD_INDEX_SCALE,
                )?,
                self.total_staked as u128,
            )?,
        )
    }

    /// Fold accrual since the last fold into the stored index
    ///
    /// Must run before any change to `total_staked` or the effective rate;
    /// the caller stamps `last_update_block` afterwards. No-op for Locked
    /// setups.
    pub fn update_reward_index(&mut self, at_block: u64) -> Result<()> {
        self.reward_per_token_stored = self.reward_index_at(at_block)?;
        Ok(())
    }

    /// Reward accrued by a position since its last interaction
    ///
    /// Free: stake times the index growth since the position's checkpoint.
    /// Locked: the position's own locked rate for elapsed blocks, capped at
    /// the end of the window. Floor arithmetic throughout.
    pub fn pending_reward(&self, position: &Position, at_block: u64) -> Result<u64> {
        match self.kind {
            SetupKind::Free => {
                let index = self.reward_index_at(at_block)?;
                let owed = math::checked_sub(index, position.reward_per_token_paid)?;
                math::checked_as_u64(math::checked_div(
                    math::checked_mul(position.staked_amount as u128, owed)?,
                    Self::REWARD_INDEX_SCALE,
                )?)
            }
            SetupKind::Locked => {
                let until = std::cmp::min(at_block, self.end_block);
                let elapsed = until.saturating_sub(position.last_interaction_block);
                math::checked_as_u64(math::checked_mul(
                    position.locked_reward_per_block as u128,
                    elapsed as u128,
                )?)
            }
        }
    }

    /// Penalty fee on reward forfeited by an early exit
    ///
    /// `forfeited * penalty_fee_bps / ONE_HUNDRED`, floor; the rounding
    /// remainder stays with the payer.
    pub fn penalty_amount(&self, forfeited_reward: u64) -> Result<u64> {
        math::checked_as_u64(math::checked_div(
            math::checked_mul(forfeited_reward as u128, self.penalty_fee_bps as u128)?,
            Farm::ONE_HUNDRED,
        )?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn locked_setup() -> Setup {
        Setup {
            kind: SetupKind::Locked,
            start_block: 100,
            end_block: 200,
            reward_per_block: 1_000,
            current_reward_per_block: 1_000,
            penalty_fee_bps: 500,
            active: true,
            ..Setup::default()
        }
    }

    #[test]
    fn test_end_block_is_exclusive() {
        let setup = locked_setup();
        assert!(!setup.is_time_active(99));
        assert!(setup.is_time_active(100));
        assert!(setup.is_time_active(199));
        assert!(!setup.is_time_active(200));
    }

    #[test]
    fn test_reservation_is_proportional() {
        let mut setup = locked_setup();
        // sole staker takes the full effective rate
        assert_eq!(setup.reservation_for_stake(500, 500).unwrap(), 1_000);

        setup.reserve_capacity(1_000).unwrap();
        assert_eq!(setup.current_reward_per_block, 0);
        assert_eq!(setup.reserved_reward_per_block, 1_000);
        // fully reserved: a second stake gets nothing
        assert_eq!(setup.reservation_for_stake(500, 1_000).unwrap(), 0);
    }

    #[test]
    fn test_reserve_capacity_never_goes_negative() {
        let mut setup = locked_setup();
        let res = setup.reserve_capacity(1_001);
        assert!(res.is_err());
        // failed reservation leaves the setup untouched
        assert_eq!(setup.current_reward_per_block, 1_000);
        assert_eq!(setup.reserved_reward_per_block, 0);
    }

    #[test]
    fn test_release_restores_effective_rate() {
        let mut setup = locked_setup();
        setup.reserve_capacity(400).unwrap();
        setup.reserve_capacity(600).unwrap();
        setup.release_capacity(400).unwrap();
        assert_eq!(setup.reserved_reward_per_block, 600);
        assert_eq!(setup.current_reward_per_block, 400);
    }

    #[test]
    fn test_penalty_floor_rounding() {
        let setup = locked_setup();
        // 500 bps of 1_999 = 99.95, floors to 99
        assert_eq!(setup.penalty_amount(1_999).unwrap(), 99);
        assert_eq!(setup.penalty_amount(0).unwrap(), 0);
    }

    #[test]
    fn test_reward_index_stands_still_without_stake() {
        let mut setup = Setup {
            kind: SetupKind::Free,
            reward_per_block: 100,
            current_reward_per_block: 100,
            last_update_block: 100,
            active: true,
            ..Setup::default()
        };
        // no stake: blocks pass, the index does not move
        assert_eq!(setup.reward_index_at(150).unwrap(), 0);

        setup.total_staked = 1_000;
        assert_eq!(
            setup.reward_index_at(150).unwrap(),
            5 * Setup::REWARD_INDEX_SCALE
        );

        setup.update_reward_index(150).unwrap();
        setup.last_update_block = 150;
        assert_eq!(setup.reward_per_token_stored, 5 * Setup::REWARD_INDEX_SCALE);
        // already folded, projecting again adds nothing
        assert_eq!(
            setup.reward_index_at(150).unwrap(),
            setup.reward_per_token_stored
        );
    }

    #[test]
    fn test_free_setup_validation() {
        let free = Setup {
            kind: SetupKind::Free,
            reward_per_block: 10,
            pinned: true,
            active: true,
            ..Setup::default()
        };
        assert!(free.validate());

        let bad_window = Setup {
            end_block: 10,
            ..free
        };
        assert!(!bad_window.validate());

        let pinned_locked = Setup {
            pinned: true,
            ..locked_setup()
        };
        assert!(!pinned_locked.validate());
    }
}
