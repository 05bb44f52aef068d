use anchor_lang::prelude::*;

#[error_code]
pub enum FarmError {
    #[msg("Math overflow")]
    MathOverflow,
    #[msg("Setup index out of range")]
    InvalidSetupIndex,
    #[msg("Setup is not active")]
    InactiveSetup,
    #[msg("Amount out of bounds")]
    InvalidAmount,
    #[msg("Invalid setup configuration")]
    InvalidSetupConfig,
    #[msg("Setup field is immutable once staked")]
    ImmutableSetupField,
    #[msg("Position is closed")]
    PositionClosed,
    #[msg("Caller is not authorized")]
    Unauthorized,
    #[msg("Invalid new owner")]
    InvalidOwner,
    #[msg("Operation outside its eligible block window")]
    OutsideBlockWindow,
    #[msg("Locked setup has not ended yet")]
    SetupNotEnded,
    #[msg("Operation only valid on a Locked setup")]
    LockedSetupRequired,
    #[msg("Setup has not expired or cannot be renewed")]
    RenewalUnavailable,
    #[msg("Insufficient unreserved reward per block")]
    InsufficientRewardCapacity,
    #[msg("Penalty payment not covered")]
    InsufficientPenaltyPayment,
    #[msg("Reentrant call blocked")]
    ReentrantCall,
    #[msg("More than one pinned free setup")]
    MultiplePinnedSetups,
    #[msg("No pinned free setup configured")]
    PinnedSetupMissing,
    #[msg("Adapter returned malformed data")]
    InvalidAdapterResponse,
    #[msg("Invalid environment for this instruction")]
    InvalidEnvironment,
}
