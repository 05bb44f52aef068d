//! Core farm state and bookkeeping
//!
//! The Farm account is the single registry of setups plus the position
//! ledger's bookkeeping layer. Instructions orchestrate token movement around
//! the methods here; every method mutates internal state completely before
//! any caller performs an external transfer or adapter call.

use {
    crate::{
        error::FarmError,
        math,
        state::{
            position::Position,
            setup::{Setup, SetupKind},
        },
    },
    anchor_lang::prelude::*,
    anchor_spl::token::Transfer,
};

/// Amounts settled by a withdraw
#[derive(Copy, Clone, PartialEq, AnchorSerialize, AnchorDeserialize, Default, Debug)]
pub struct WithdrawAmounts {
    /// Staked liquidity returned to the owner (LP units)
    pub staked: u64,
    /// Unpaid reward owed to the owner
    pub reward: u64,
}

/// Amounts settled by an early unlock
#[derive(Copy, Clone, PartialEq, AnchorSerialize, AnchorDeserialize, Default, Debug)]
pub struct UnlockAmounts {
    /// Staked liquidity returned to the owner, exit fee already deducted
    pub staked: u64,
    /// Protocol exit fee routed to the fee receiver (LP units)
    pub exit_fee: u64,
    /// Penalty owed by the owner in the reward asset
    pub penalty: u64,
    /// Vested-but-unclaimed reward paid to the owner
    pub reward: u64,
}

/// Setup definition carried by a configure entry
#[derive(Copy, Clone, PartialEq, AnchorSerialize, AnchorDeserialize, Default, Debug)]
pub struct SetupParams {
    pub kind: SetupKind,
    pub liquidity_pool_token: Pubkey,
    pub main_token: Pubkey,
    pub start_block: u64,
    pub end_block: u64,
    pub reward_per_block: u64,
    pub penalty_fee_bps: u64,
    pub renewals_remaining: u32,
    pub active: bool,
    pub pinned: bool,
    /// Allow disabling a Locked setup that still holds stake
    pub force_disable: bool,
}

/// One entry of a configure batch: add a new setup or update by index
#[derive(Copy, Clone, PartialEq, AnchorSerialize, AnchorDeserialize, Default, Debug)]
pub struct SetupConfig {
    pub add: bool,
    pub index: u64,
    pub params: SetupParams,
}

/// Main farm account
///
/// Root account storing governance configuration and the append-only setup
/// arena. Setup indices handed out once stay valid forever.
#[account]
#[derive(Default, Debug)]
pub struct Farm {
    /// Governance executor allowed to configure the farm
    pub authority: Pubkey,
    /// External AMM adapter program used to wrap/unwrap liquidity
    pub adapter_program: Pubkey,
    /// Mint of the reward asset
    pub reward_mint: Pubkey,
    /// Receiver of the protocol exit fee
    pub fee_receiver: Pubkey,
    /// Protocol exit fee on early unlock, parts of ONE_HUNDRED (default 0)
    pub exit_fee_bps: u64,
    /// Next position id; monotonically increasing, never reused
    pub next_position_id: u64,
    /// Append-only setup arena
    pub setups: Vec<Setup>,

    /// Bump seed for the transfer authority PDA
    pub transfer_authority_bump: u8,
    /// Bump seed for the farm PDA
    pub farm_bump: u8,
    /// Bump seed for the reward vault PDA
    pub reward_vault_bump: u8,
    /// Block of inception, also the block override in test builds
    pub inception_block: u64,
    /// Block override used when compiled with the test feature
    pub current_block: u64,
    /// Latch blocking nested calls while an external call is in flight
    pub in_external_call: bool,
}

impl Farm {
    /// Base account size in bytes (8 byte discriminator + fixed fields)
    pub const LEN: usize = 8 + std::mem::size_of::<Farm>();
    /// Fixed-point denominator decimal places (1 part = 0.01%)
    pub const BPS_DECIMALS: u8 = 4;
    /// The fixed denominator all percentages are expressed against
    pub const ONE_HUNDRED: u128 = 10u64.pow(Self::BPS_DECIMALS as u32) as u128;

    /// Account size for a farm holding `setup_count` setups
    pub fn space(setup_count: usize) -> usize {
        Self::LEN + setup_count * Setup::SIZE
    }

    /// Get current block height (test mode - uses current_block)
    #[cfg(feature = "test")]
    pub fn get_block(&self) -> Result<u64> {
        Ok(self.current_block)
    }

    /// Get current block height from the clock sysvar (production mode)
    #[cfg(not(feature = "test"))]
    pub fn get_block(&self) -> Result<u64> {
        Ok(Clock::get()?.slot)
    }

    /// Validate the farm configuration
    pub fn validate(&self) -> bool {
        (self.exit_fee_bps as u128) <= Self::ONE_HUNDRED
            && self.setups.iter().filter(|s| s.pinned).count() <= 1
    }

    pub fn setup(&self, index: u64) -> Result<&Setup> {
        self.setups
            .get(index as usize)
            .ok_or_else(|| error!(FarmError::InvalidSetupIndex))
    }

    pub fn setup_mut(&mut self, index: u64) -> Result<&mut Setup> {
        self.setups
            .get_mut(index as usize)
            .ok_or_else(|| error!(FarmError::InvalidSetupIndex))
    }

    /// Index of the pinned Free setup, if one is configured
    pub fn pinned_setup_index(&self) -> Option<usize> {
        self.setups
            .iter()
            .position(|s| s.pinned && s.kind == SetupKind::Free)
    }

    /// Mark the start of a section that calls out of the program
    ///
    /// All bookkeeping must already be final when this is taken; the caller
    /// flushes the account before the external call so a nested invocation
    /// observes the latch.
    pub fn begin_external_call(&mut self) -> Result<()> {
        require!(!self.in_external_call, FarmError::ReentrantCall);
        self.in_external_call = true;
        Ok(())
    }

    pub fn end_external_call(&mut self) {
        self.in_external_call = false;
    }

    // ========== Position ledger bookkeeping ==========

    /// Open a new position against a setup
    ///
    /// Locked setups reserve the position's rate eagerly:
    /// `locked_reward_per_block = current_reward_per_block * stake /
    /// total_staked_after`, and the total entitlement over the remaining
    /// window is fixed at entry. The returned record carries a zero bump; the
    /// instruction fills it in from the PDA derivation.
    pub fn open_position(
        &mut self,
        setup_index: u64,
        lp_amount: u64,
        owner: Pubkey,
        block: u64,
    ) -> Result<Position> {
        require!(lp_amount > 0, FarmError::InvalidAmount);
        let id = self.next_position_id;

        let setup = self.setup_mut(setup_index)?;
        require!(setup.active, FarmError::InactiveSetup);
        require!(setup.accepts_stake(block), FarmError::OutsideBlockWindow);

        let total_staked_after = math::checked_add(setup.total_staked, lp_amount)?;
        let (locked_reward_per_block, reward) = match setup.kind {
            SetupKind::Locked => {
                let rate = setup.reservation_for_stake(lp_amount, total_staked_after)?;
                setup.reserve_capacity(rate)?;
                let reward = math::checked_as_u64(math::checked_mul(
                    rate as u128,
                    math::checked_sub(setup.end_block, block)? as u128,
                )?)?;
                (rate, reward)
            }
            SetupKind::Free => {
                setup.update_reward_index(block)?;
                (0, 0)
            }
        };
        let free = setup.kind == SetupKind::Free;
        let reward_per_token_paid = setup.reward_per_token_stored;
        setup.total_staked = total_staked_after;
        setup.last_update_block = block;

        self.next_position_id = math::checked_add(id, 1)?;

        Ok(Position {
            id,
            owner,
            setup_index,
            staked_amount: lp_amount,
            locked_reward_per_block,
            creation_block: block,
            last_interaction_block: block,
            reward,
            accrued_reward: 0,
            reward_per_token_paid,
            free,
            bump: 0,
        })
    }

    /// Add stake to an existing position (splice semantics)
    ///
    /// Accrual up to the current block is realized into `accrued_reward`
    /// first, so already-earned reward is never touched. For Locked setups
    /// the old reservation is released and the whole combined stake is
    /// re-reserved at the setup's rate at addition time over the remaining
    /// window.
    pub fn add_liquidity(
        &mut self,
        position: &mut Position,
        lp_amount: u64,
        block: u64,
    ) -> Result<()> {
        require!(position.is_open(), FarmError::PositionClosed);
        require!(lp_amount > 0, FarmError::InvalidAmount);

        let setup = self.setup_mut(position.setup_index)?;
        require!(setup.active, FarmError::InactiveSetup);
        require!(setup.accepts_stake(block), FarmError::OutsideBlockWindow);

        let pending = setup.pending_reward(position, block)?;
        position.accrued_reward = math::checked_add(position.accrued_reward, pending)?;
        setup.update_reward_index(block)?;
        position.reward_per_token_paid = setup.reward_per_token_stored;

        let total_staked_after = math::checked_add(setup.total_staked, lp_amount)?;
        let new_staked = math::checked_add(position.staked_amount, lp_amount)?;

        if setup.kind == SetupKind::Locked {
            setup.release_capacity(position.locked_reward_per_block)?;
            let rate = setup.reservation_for_stake(new_staked, total_staked_after)?;
            setup.reserve_capacity(rate)?;
            position.locked_reward_per_block = rate;
            position.reward = math::checked_as_u64(math::checked_mul(
                rate as u128,
                math::checked_sub(setup.end_block, block)? as u128,
            )?)?;
        }

        position.staked_amount = new_staked;
        position.last_interaction_block = block;
        setup.total_staked = total_staked_after;
        setup.last_update_block = block;

        Ok(())
    }

    /// Realize and collect reward without closing the position
    ///
    /// Free positions collect their pro-rata accrual; Locked positions may
    /// collect only the portion already vested by elapsed blocks. Returns the
    /// amount owed to the owner.
    pub fn collect_partial_reward(
        &mut self,
        position: &mut Position,
        block: u64,
    ) -> Result<u64> {
        require!(position.is_open(), FarmError::PositionClosed);

        let setup = self.setup_mut(position.setup_index)?;
        let pending = setup.pending_reward(position, block)?;
        if setup.kind == SetupKind::Locked {
            position.reward = math::checked_sub(position.reward, pending)?;
        }
        setup.update_reward_index(block)?;
        position.reward_per_token_paid = setup.reward_per_token_stored;

        let payout = math::checked_add(position.accrued_reward, pending)?;
        position.accrued_reward = 0;
        position.last_interaction_block = block;
        setup.last_update_block = block;

        Ok(payout)
    }

    /// Settle a full withdraw
    ///
    /// Free positions exit at any block; Locked positions only at or after
    /// the end of their window. Pays all unpaid reward, releases the Locked
    /// reservation and zeroes the position.
    pub fn withdraw(&mut self, position: &mut Position, block: u64) -> Result<WithdrawAmounts> {
        require!(position.is_open(), FarmError::PositionClosed);

        let setup = self.setup_mut(position.setup_index)?;
        let reward = match setup.kind {
            SetupKind::Locked => {
                require!(block >= setup.end_block, FarmError::SetupNotEnded);
                setup.release_capacity(position.locked_reward_per_block)?;
                math::checked_add(position.accrued_reward, position.reward)?
            }
            SetupKind::Free => {
                let pending = setup.pending_reward(position, block)?;
                setup.update_reward_index(block)?;
                math::checked_add(position.accrued_reward, pending)?
            }
        };

        let staked = position.staked_amount;
        setup.total_staked = math::checked_sub(setup.total_staked, staked)?;
        setup.last_update_block = block;
        position.close_out();

        Ok(WithdrawAmounts { staked, reward })
    }

    /// Settle an early exit from a non-matured Locked position
    ///
    /// Vested-but-unclaimed reward is kept by the owner; everything still
    /// scheduled is forfeited and charged the setup's penalty. The protocol
    /// exit fee comes out of the returned stake. Restores the setup's
    /// reserved capacity to its pre-stake value.
    pub fn unlock(&mut self, position: &mut Position, block: u64) -> Result<UnlockAmounts> {
        require!(position.is_open(), FarmError::PositionClosed);
        let exit_fee_bps = self.exit_fee_bps;

        let setup = self.setup_mut(position.setup_index)?;
        require!(
            setup.kind == SetupKind::Locked,
            FarmError::LockedSetupRequired
        );
        require!(block < setup.end_block, FarmError::OutsideBlockWindow);

        let vested = setup.pending_reward(position, block)?;
        let reward = math::checked_add(position.accrued_reward, vested)?;
        let forfeited = math::checked_sub(position.reward, vested)?;
        let penalty = setup.penalty_amount(forfeited)?;

        let exit_fee = math::checked_as_u64(math::checked_div(
            math::checked_mul(position.staked_amount as u128, exit_fee_bps as u128)?,
            Self::ONE_HUNDRED,
        )?)?;
        let staked = math::checked_sub(position.staked_amount, exit_fee)?;

        setup.release_capacity(position.locked_reward_per_block)?;
        setup.total_staked = math::checked_sub(setup.total_staked, position.staked_amount)?;
        setup.last_update_block = block;
        position.close_out();

        Ok(UnlockAmounts {
            staked,
            exit_fee,
            penalty,
            reward,
        })
    }

    // ========== Pinned setup rebalancing ==========

    /// Recompute the pinned Free setup's effective rate
    ///
    /// The pinned setup absorbs every unit of reward-per-block not reserved
    /// by time-active Locked setups. Ended or not-yet-started setups do not
    /// contribute; a fully-reserved setup contributes zero. Idempotent.
    pub fn rebalance_pinned_setup(&mut self, block: u64) -> Result<u64> {
        let pinned_index = self
            .pinned_setup_index()
            .ok_or_else(|| error!(FarmError::PinnedSetupMissing))?;

        let mut unreserved: u128 = 0;
        for setup in &self.setups {
            if setup.kind == SetupKind::Locked && setup.is_time_active(block) {
                unreserved = math::checked_add(
                    unreserved,
                    setup.unreserved_reward_per_block() as u128,
                )?;
            }
        }

        let pinned = &mut self.setups[pinned_index];
        pinned.update_reward_index(block)?;
        pinned.current_reward_per_block = math::checked_as_u64(math::checked_add(
            pinned.reward_per_block as u128,
            unreserved,
        )?)?;
        pinned.last_update_block = block;

        Ok(pinned.current_reward_per_block)
    }

    // ========== Setup registry ==========

    /// Apply a configure batch, then re-validate and rebalance
    pub fn configure(&mut self, entries: &[SetupConfig], block: u64) -> Result<()> {
        for entry in entries {
            if entry.add {
                self.add_setup(&entry.params, block)?;
            } else {
                self.update_setup(entry.index, &entry.params, block)?;
            }
        }
        require!(
            self.setups.iter().filter(|s| s.pinned).count() <= 1,
            FarmError::MultiplePinnedSetups
        );
        if self.pinned_setup_index().is_some() {
            self.rebalance_pinned_setup(block)?;
        }
        Ok(())
    }

    fn add_setup(&mut self, params: &SetupParams, block: u64) -> Result<()> {
        let setup = Setup {
            kind: params.kind,
            liquidity_pool_token: params.liquidity_pool_token,
            main_token: params.main_token,
            start_block: params.start_block,
            end_block: params.end_block,
            reward_per_block: params.reward_per_block,
            current_reward_per_block: params.reward_per_block,
            reserved_reward_per_block: 0,
            total_staked: 0,
            reward_per_token_stored: 0,
            last_update_block: block,
            penalty_fee_bps: params.penalty_fee_bps,
            renewals_remaining: params.renewals_remaining,
            active: params.active,
            pinned: params.pinned,
        };
        require!(setup.validate(), FarmError::InvalidSetupConfig);
        if setup.kind == SetupKind::Locked {
            require!(setup.end_block > block, FarmError::InvalidSetupConfig);
        }
        self.setups.push(setup);
        Ok(())
    }

    fn update_setup(&mut self, index: u64, params: &SetupParams, block: u64) -> Result<()> {
        let setup = self.setup_mut(index)?;

        // Identity fields never change; the window freezes once any schedule
        // has been priced against it.
        require!(
            params.kind == setup.kind
                && params.liquidity_pool_token == setup.liquidity_pool_token
                && params.main_token == setup.main_token,
            FarmError::ImmutableSetupField
        );
        if setup.total_staked > 0 || setup.reserved_reward_per_block > 0 {
            require!(
                params.start_block == setup.start_block && params.end_block == setup.end_block,
                FarmError::ImmutableSetupField
            );
        }
        require!(
            params.reward_per_block >= setup.reserved_reward_per_block,
            FarmError::InsufficientRewardCapacity
        );
        if setup.kind == SetupKind::Locked
            && setup.active
            && !params.active
            && setup.total_staked > 0
        {
            require!(params.force_disable, FarmError::InvalidSetupConfig);
        }

        // accrual at the old rate is folded in before anything moves
        setup.update_reward_index(block)?;

        setup.start_block = params.start_block;
        setup.end_block = params.end_block;
        setup.reward_per_block = params.reward_per_block;
        setup.penalty_fee_bps = params.penalty_fee_bps;
        setup.renewals_remaining = params.renewals_remaining;
        setup.active = params.active;
        setup.pinned = params.pinned;
        setup.last_update_block = block;
        match setup.kind {
            SetupKind::Locked => {
                setup.current_reward_per_block = setup.unreserved_reward_per_block();
            }
            SetupKind::Free => {
                // pinned setups get their effective rate from the rebalance
                if !setup.pinned {
                    setup.current_reward_per_block = setup.reward_per_block;
                }
            }
        }
        require!(setup.validate(), FarmError::InvalidSetupConfig);
        Ok(())
    }

    /// Re-arm an expired Locked setup for a same-length window
    ///
    /// Permissionless; consumes one renewal. Only possible once every
    /// position has exited, so schedules priced against the old window can
    /// never alias the new one.
    pub fn activate_setup(&mut self, index: u64, block: u64) -> Result<()> {
        let setup = self.setup_mut(index)?;
        require!(
            setup.kind == SetupKind::Locked,
            FarmError::LockedSetupRequired
        );
        require!(
            block >= setup.end_block
                && setup.renewals_remaining > 0
                && setup.total_staked == 0,
            FarmError::RenewalUnavailable
        );

        let duration = math::checked_sub(setup.end_block, setup.start_block)?;
        setup.start_block = block;
        setup.end_block = math::checked_add(block, duration)?;
        setup.renewals_remaining = math::checked_sub(setup.renewals_remaining, 1)?;
        setup.reserved_reward_per_block = 0;
        setup.current_reward_per_block = setup.reward_per_block;
        setup.active = true;
        setup.last_update_block = block;

        if self.pinned_setup_index().is_some() {
            self.rebalance_pinned_setup(block)?;
        }
        Ok(())
    }

    // ========== Account plumbing ==========

    /// Validate that the program upgrade authority matches expected authority
    pub fn validate_upgrade_authority<'info>(
        expected_upgrade_authority: Pubkey,
        program_data: &AccountInfo<'info>,
        program: &Program<'info, crate::program::Farming>,
    ) -> Result<()> {
        if let Some(programdata_address) = program.programdata_address()? {
            require_keys_eq!(
                programdata_address,
                program_data.key(),
                anchor_lang::error::ErrorCode::InvalidProgramExecutable
            );
            let data = program_data.try_borrow_data()?;
            let program_data = ProgramData::try_deserialize(&mut &data[..])?;
            if let Some(current_upgrade_authority) = program_data.upgrade_authority_address {
                if current_upgrade_authority != Pubkey::default() {
                    require_keys_eq!(
                        current_upgrade_authority,
                        expected_upgrade_authority,
                        anchor_lang::error::ErrorCode::ConstraintOwner
                    );
                }
            }
        } // otherwise not upgradeable

        Ok(())
    }

    /// Transfer tokens out of a farm vault using the transfer authority PDA
    pub fn transfer_tokens<'info>(
        &self,
        from: AccountInfo<'info>,
        to: AccountInfo<'info>,
        authority: AccountInfo<'info>,
        token_program: AccountInfo<'info>,
        amount: u64,
    ) -> Result<()> {
        let authority_seeds: &[&[&[u8]]] =
            &[&[b"transfer_authority", &[self.transfer_authority_bump]]];

        let context = CpiContext::new(
            token_program,
            Transfer {
                from,
                to,
                authority,
            },
        )
        .with_signer(authority_seeds);

        anchor_spl::token::transfer(context, amount)
    }

    /// Transfer tokens from a user account (user signs the transaction)
    pub fn transfer_tokens_from_user<'info>(
        &self,
        from: AccountInfo<'info>,
        to: AccountInfo<'info>,
        authority: AccountInfo<'info>,
        token_program: AccountInfo<'info>,
        amount: u64,
    ) -> Result<()> {
        let context = CpiContext::new(
            token_program,
            Transfer {
                from,
                to,
                authority,
            },
        );
        anchor_spl::token::transfer(context, amount)
    }

    /// Transfer SOL using system program CPI
    pub fn transfer_sol<'a>(
        source_account: AccountInfo<'a>,
        destination_account: AccountInfo<'a>,
        system_program: AccountInfo<'a>,
        amount: u64,
    ) -> Result<()> {
        let cpi_accounts = anchor_lang::system_program::Transfer {
            from: source_account,
            to: destination_account,
        };
        let cpi_context = anchor_lang::context::CpiContext::new(system_program, cpi_accounts);

        anchor_lang::system_program::transfer(cpi_context, amount)
    }

    /// Reallocate an account to a new size
    ///
    /// Transfers additional lamports if needed to cover rent for the new size.
    pub fn realloc<'a>(
        funding_account: AccountInfo<'a>,
        target_account: AccountInfo<'a>,
        system_program: AccountInfo<'a>,
        new_len: usize,
        zero_init: bool,
    ) -> Result<()> {
        let new_minimum_balance = Rent::get()?.minimum_balance(new_len);
        let lamports_diff = new_minimum_balance.saturating_sub(target_account.try_lamports()?);

        Farm::transfer_sol(
            funding_account,
            target_account.clone(),
            system_program,
            lamports_diff,
        )?;

        target_account
            .realloc(new_len, zero_init)
            .map_err(|_| error!(FarmError::InvalidSetupConfig))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Rates in the fixtures are scaled by 1_000 reward units per whole token
    // per block, so 150 reads as 0.15/block.
    const FREE_RATE: u64 = 150; // 0.15/block
    const LOCKED_A_RATE: u64 = 30; // 0.03/block over [100, 130)
    const LOCKED_B_RATE: u64 = 70; // 0.07/block over [105, 150)

    fn free_params(rate: u64, pinned: bool) -> SetupParams {
        SetupParams {
            kind: SetupKind::Free,
            reward_per_block: rate,
            active: true,
            pinned,
            ..SetupParams::default()
        }
    }

    fn locked_params(rate: u64, start: u64, end: u64, penalty_bps: u64) -> SetupParams {
        SetupParams {
            kind: SetupKind::Locked,
            start_block: start,
            end_block: end,
            reward_per_block: rate,
            penalty_fee_bps: penalty_bps,
            active: true,
            ..SetupParams::default()
        }
    }

    /// Farm with a pinned free setup (index 0) and two locked setups:
    /// A (index 1) over [100, 130), B (index 2) over [105, 150).
    fn get_fixture() -> Farm {
        let mut farm = Farm::default();
        farm.configure(
            &[
                SetupConfig {
                    add: true,
                    index: 0,
                    params: free_params(FREE_RATE, true),
                },
                SetupConfig {
                    add: true,
                    index: 0,
                    params: locked_params(LOCKED_A_RATE, 100, 130, 0),
                },
                SetupConfig {
                    add: true,
                    index: 0,
                    params: locked_params(LOCKED_B_RATE, 105, 150, 500),
                },
            ],
            90,
        )
        .unwrap();
        farm
    }

    fn staked_sum(positions: &[Position], setup_index: u64) -> u64 {
        positions
            .iter()
            .filter(|p| p.setup_index == setup_index)
            .map(|p| p.staked_amount)
            .sum()
    }

    #[test]
    fn test_rebalance_absorbs_unreserved_capacity() {
        let mut farm = get_fixture();

        // before both windows open, nothing spills over
        assert_eq!(farm.rebalance_pinned_setup(90).unwrap(), FREE_RATE);
        // both locked setups time-active and unreserved: 0.15 + 0.03 + 0.07
        assert_eq!(farm.rebalance_pinned_setup(110).unwrap(), 250);
        // A ended, B still running
        assert_eq!(farm.rebalance_pinned_setup(140).unwrap(), 220);
        // everything ended
        assert_eq!(farm.rebalance_pinned_setup(150).unwrap(), FREE_RATE);
    }

    #[test]
    fn test_rebalance_skips_fully_reserved_setup() {
        let mut farm = get_fixture();

        // sole staker reserves 100% of A's capacity
        let position = farm
            .open_position(1, 1_000, Pubkey::default(), 100)
            .unwrap();
        assert_eq!(position.locked_reward_per_block, LOCKED_A_RATE);
        assert_eq!(farm.setup(1).unwrap().unreserved_reward_per_block(), 0);

        assert_eq!(farm.rebalance_pinned_setup(110).unwrap(), 220);
    }

    #[test]
    fn test_rebalance_is_idempotent() {
        let mut farm = get_fixture();
        farm.open_position(2, 500, Pubkey::default(), 110).unwrap();

        let first = farm.rebalance_pinned_setup(110).unwrap();
        let second = farm.rebalance_pinned_setup(110).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            farm.setup(0).unwrap().current_reward_per_block,
            first
        );
    }

    #[test]
    fn test_rebalance_without_pinned_setup_fails() {
        let mut farm = Farm::default();
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(10, false),
            }],
            0,
        )
        .unwrap();
        assert!(farm.rebalance_pinned_setup(0).is_err());
    }

    #[test]
    fn test_open_at_end_block_fails() {
        let mut farm = get_fixture();
        // end bound is exclusive
        let res = farm.open_position(1, 1_000, Pubkey::default(), 130);
        assert!(res.is_err());
        // last eligible block
        assert!(farm.open_position(1, 1_000, Pubkey::default(), 129).is_ok());
        // before the window opens
        assert!(farm.open_position(1, 1_000, Pubkey::default(), 99).is_err());
    }

    #[test]
    fn test_total_staked_tracks_live_positions() {
        let mut farm = get_fixture();
        let mut positions = vec![
            farm.open_position(2, 400, Pubkey::default(), 105).unwrap(),
            farm.open_position(2, 600, Pubkey::default(), 110).unwrap(),
            farm.open_position(2, 1_000, Pubkey::default(), 115).unwrap(),
        ];
        assert_eq!(
            farm.setup(2).unwrap().total_staked,
            staked_sum(&positions, 2)
        );

        farm.unlock(&mut positions[1], 120).unwrap();
        assert_eq!(
            farm.setup(2).unwrap().total_staked,
            staked_sum(&positions, 2)
        );

        farm.withdraw(&mut positions[0], 150).unwrap();
        assert_eq!(
            farm.setup(2).unwrap().total_staked,
            staked_sum(&positions, 2)
        );
    }

    #[test]
    fn test_reserved_capacity_never_exceeds_nominal() {
        let mut farm = get_fixture();
        for block in [105u64, 110, 120, 130] {
            farm.open_position(2, 1_000, Pubkey::default(), block)
                .unwrap();
            let setup = farm.setup(2).unwrap();
            assert!(setup.reserved_reward_per_block <= setup.reward_per_block);
        }
    }

    #[test]
    fn test_unlock_round_trip() {
        let mut farm = get_fixture();
        farm.exit_fee_bps = 100; // 1%

        // sole staker on B at block 105: full rate reserved to end block 150
        let mut position = farm
            .open_position(2, 10_000, Pubkey::default(), 105)
            .unwrap();
        assert_eq!(position.locked_reward_per_block, LOCKED_B_RATE);
        assert_eq!(position.reward, LOCKED_B_RATE * 45);

        // unlock in the same block: zero vested, everything forfeited
        let amounts = farm.unlock(&mut position, 105).unwrap();
        assert_eq!(amounts.reward, 0);
        assert_eq!(amounts.exit_fee, 100);
        assert_eq!(amounts.staked, 9_900);
        // penalty = forfeited * 500 / 10_000
        assert_eq!(amounts.penalty, LOCKED_B_RATE * 45 * 500 / 10_000);

        assert_eq!(position.reward, 0);
        assert!(!position.is_open());

        let setup = farm.setup(2).unwrap();
        assert_eq!(setup.reserved_reward_per_block, 0);
        assert_eq!(setup.current_reward_per_block, LOCKED_B_RATE);
        assert_eq!(setup.total_staked, 0);
    }

    #[test]
    fn test_unlock_after_vesting_keeps_vested_reward() {
        let mut farm = get_fixture();
        let mut position = farm
            .open_position(2, 10_000, Pubkey::default(), 105)
            .unwrap();

        // 20 blocks vested, 25 forfeited
        let amounts = farm.unlock(&mut position, 125).unwrap();
        assert_eq!(amounts.reward, LOCKED_B_RATE * 20);
        assert_eq!(amounts.penalty, LOCKED_B_RATE * 25 * 500 / 10_000);
        assert_eq!(amounts.staked, 10_000); // fixture has no exit fee
    }

    #[test]
    fn test_unlock_rejected_for_free_and_matured_positions() {
        let mut farm = get_fixture();
        let mut free_position = farm
            .open_position(0, 1_000, Pubkey::default(), 100)
            .unwrap();
        assert!(farm.unlock(&mut free_position, 110).is_err());

        let mut locked_position = farm
            .open_position(2, 1_000, Pubkey::default(), 105)
            .unwrap();
        assert!(farm.unlock(&mut locked_position, 150).is_err());
        assert!(farm.withdraw(&mut locked_position, 150).is_ok());
    }

    #[test]
    fn test_free_accrual_partial_then_withdraw() {
        let mut farm = get_fixture();
        // stand-alone free setup: 0.1/block scaled by 1_000
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(100, false),
            }],
            90,
        )
        .unwrap();

        let mut position = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();
        assert!(position.free);

        // 100% share for 50 blocks at 0.1/block = 5.0
        let paid = farm.collect_partial_reward(&mut position, 150).unwrap();
        assert_eq!(paid, 5_000);

        // nothing more accrues within the same block
        assert_eq!(farm.collect_partial_reward(&mut position, 150).unwrap(), 0);

        // 100 more blocks at 0.1/block = 10.0, then the stake comes back
        let amounts = farm.withdraw(&mut position, 250).unwrap();
        assert_eq!(amounts.reward, 10_000);
        assert_eq!(amounts.staked, 1_000);
        assert!(!position.is_open());
        assert_eq!(farm.setup(3).unwrap().total_staked, 0);
    }

    #[test]
    fn test_free_accrual_is_pro_rata() {
        let mut farm = get_fixture();
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(100, false),
            }],
            90,
        )
        .unwrap();

        let mut first = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();
        let _second = farm
            .open_position(3, 3_000, Pubkey::default(), 100)
            .unwrap();

        // 25% share for 40 blocks at 0.1/block = 1.0
        let paid = farm.collect_partial_reward(&mut first, 140).unwrap();
        assert_eq!(paid, 1_000);
    }

    #[test]
    fn test_free_payouts_track_share_changes() {
        let mut farm = get_fixture();
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(100, false),
            }],
            90,
        )
        .unwrap();

        let mut first = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();
        let mut second = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();

        // equal halves of 100 blocks at 0.1/block
        let amounts = farm.withdraw(&mut first, 200).unwrap();
        assert_eq!(amounts.reward, 5_000);

        // the survivor's share of [100, 200) stays a half even though it is
        // now the sole staker
        let paid = farm.collect_partial_reward(&mut second, 200).unwrap();
        assert_eq!(paid, 5_000);
        // payouts exactly cover the emission over those 100 blocks
        assert_eq!(amounts.reward + paid, 100 * 100);

        // from here on the whole rate is its own
        assert_eq!(farm.collect_partial_reward(&mut second, 250).unwrap(), 5_000);
    }

    #[test]
    fn test_free_late_joiner_accrues_from_entry() {
        let mut farm = get_fixture();
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(100, false),
            }],
            90,
        )
        .unwrap();

        let mut early = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();
        let mut late = farm
            .open_position(3, 1_000, Pubkey::default(), 150)
            .unwrap();

        // the latecomer earns nothing from before its entry
        assert_eq!(farm.collect_partial_reward(&mut late, 200).unwrap(), 2_500);
        // 100% of [100, 150) plus half of [150, 200)
        assert_eq!(farm.collect_partial_reward(&mut early, 200).unwrap(), 7_500);
    }

    #[test]
    fn test_locked_partial_reward_pays_vested_only() {
        let mut farm = get_fixture();
        let mut position = farm
            .open_position(2, 1_000, Pubkey::default(), 105)
            .unwrap();
        let scheduled = position.reward;

        let paid = farm.collect_partial_reward(&mut position, 125).unwrap();
        assert_eq!(paid, LOCKED_B_RATE * 20);
        assert_eq!(position.reward, scheduled - paid);

        // claims never run past the end of the window
        let rest = farm.collect_partial_reward(&mut position, 400).unwrap();
        assert_eq!(rest, LOCKED_B_RATE * 25);
        assert_eq!(position.reward, 0);
    }

    #[test]
    fn test_add_liquidity_locked_reprices_at_addition_time() {
        let mut farm = get_fixture();
        let mut position = farm
            .open_position(2, 1_000, Pubkey::default(), 105)
            .unwrap();
        assert_eq!(position.locked_reward_per_block, LOCKED_B_RATE);

        farm.add_liquidity(&mut position, 1_000, 125).unwrap();

        // vested reward up to the add was realized, not discarded
        assert_eq!(position.accrued_reward, LOCKED_B_RATE * 20);
        // still the sole staker: the whole rate is re-reserved for [125, 150)
        assert_eq!(position.locked_reward_per_block, LOCKED_B_RATE);
        assert_eq!(position.reward, LOCKED_B_RATE * 25);
        assert_eq!(position.staked_amount, 2_000);

        // withdraw at maturity pays realized + rescheduled
        let amounts = farm.withdraw(&mut position, 150).unwrap();
        assert_eq!(amounts.reward, LOCKED_B_RATE * 45);
        assert_eq!(amounts.staked, 2_000);
    }

    #[test]
    fn test_add_liquidity_free_preserves_realized_reward() {
        let mut farm = get_fixture();
        farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(100, false),
            }],
            90,
        )
        .unwrap();

        let mut position = farm
            .open_position(3, 1_000, Pubkey::default(), 100)
            .unwrap();
        farm.add_liquidity(&mut position, 1_000, 150).unwrap();
        assert_eq!(position.accrued_reward, 5_000);
        assert_eq!(position.staked_amount, 2_000);

        let amounts = farm.withdraw(&mut position, 200).unwrap();
        assert_eq!(amounts.reward, 10_000);
    }

    #[test]
    fn test_add_liquidity_closed_window_fails() {
        let mut farm = get_fixture();
        let mut position = farm
            .open_position(1, 1_000, Pubkey::default(), 100)
            .unwrap();
        assert!(farm.add_liquidity(&mut position, 100, 130).is_err());
    }

    #[test]
    fn test_configure_rejects_second_pinned_setup() {
        let mut farm = get_fixture();
        let res = farm.configure(
            &[SetupConfig {
                add: true,
                index: 0,
                params: free_params(10, true),
            }],
            100,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_configure_cannot_shrink_rate_below_reserved() {
        let mut farm = get_fixture();
        farm.open_position(2, 1_000, Pubkey::default(), 105).unwrap();
        assert_eq!(
            farm.setup(2).unwrap().reserved_reward_per_block,
            LOCKED_B_RATE
        );

        let mut params = locked_params(LOCKED_B_RATE - 1, 105, 150, 500);
        let res = farm.configure(
            &[SetupConfig {
                add: false,
                index: 2,
                params,
            }],
            110,
        );
        assert!(res.is_err());

        // raising the budget is fine and frees new capacity
        params.reward_per_block = LOCKED_B_RATE * 2;
        farm.configure(
            &[SetupConfig {
                add: false,
                index: 2,
                params,
            }],
            110,
        )
        .unwrap();
        assert_eq!(
            farm.setup(2).unwrap().current_reward_per_block,
            LOCKED_B_RATE
        );
        // the raise spills into the pinned setup on the batch rebalance
        assert_eq!(
            farm.setup(0).unwrap().current_reward_per_block,
            FREE_RATE + LOCKED_A_RATE + LOCKED_B_RATE
        );
    }

    #[test]
    fn test_configure_disable_staked_setup_needs_override() {
        let mut farm = get_fixture();
        farm.open_position(2, 1_000, Pubkey::default(), 105).unwrap();

        let mut params = locked_params(LOCKED_B_RATE, 105, 150, 500);
        params.active = false;
        let entry = SetupConfig {
            add: false,
            index: 2,
            params,
        };
        assert!(farm.configure(&[entry], 110).is_err());

        let mut forced = entry;
        forced.params.force_disable = true;
        farm.configure(&[forced], 110).unwrap();
        assert!(!farm.setup(2).unwrap().active);
    }

    #[test]
    fn test_configure_window_frozen_while_staked() {
        let mut farm = get_fixture();
        farm.open_position(2, 1_000, Pubkey::default(), 105).unwrap();

        let params = locked_params(LOCKED_B_RATE, 105, 160, 500);
        let res = farm.configure(
            &[SetupConfig {
                add: false,
                index: 2,
                params,
            }],
            110,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_activate_setup_renews_expired_window() {
        let mut farm = get_fixture();
        let mut params = locked_params(LOCKED_A_RATE, 100, 130, 0);
        params.renewals_remaining = 1;
        farm.configure(
            &[SetupConfig {
                add: false,
                index: 1,
                params,
            }],
            95,
        )
        .unwrap();

        // not expired yet
        assert!(farm.activate_setup(1, 120).is_err());

        farm.activate_setup(1, 140).unwrap();
        let setup = farm.setup(1).unwrap();
        assert_eq!(setup.start_block, 140);
        assert_eq!(setup.end_block, 170);
        assert_eq!(setup.renewals_remaining, 0);

        // renewals exhausted
        assert!(farm.activate_setup(1, 200).is_err());
    }

    #[test]
    fn test_activate_setup_requires_full_exit() {
        let mut farm = get_fixture();
        let mut params = locked_params(LOCKED_B_RATE, 105, 150, 500);
        params.renewals_remaining = 1;
        farm.configure(
            &[SetupConfig {
                add: false,
                index: 2,
                params,
            }],
            95,
        )
        .unwrap();

        let mut position = farm
            .open_position(2, 1_000, Pubkey::default(), 105)
            .unwrap();
        assert!(farm.activate_setup(2, 160).is_err());

        farm.withdraw(&mut position, 160).unwrap();
        farm.activate_setup(2, 160).unwrap();
    }

    #[test]
    fn test_external_call_latch() {
        let mut farm = get_fixture();
        farm.begin_external_call().unwrap();
        assert!(farm.begin_external_call().is_err());
        farm.end_external_call();
        assert!(farm.begin_external_call().is_ok());
    }
}
