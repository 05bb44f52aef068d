// Instruction handlers.

pub mod activate_setup;
pub mod add_liquidity;
pub mod configure;
pub mod initialize;
pub mod open_position;
pub mod partial_reward;
pub mod rebalance_setup;
pub mod set_fee_config;
pub mod set_test_block;
pub mod transfer_position;
pub mod unlock;
pub mod withdraw;

pub use {
    activate_setup::*, add_liquidity::*, configure::*, initialize::*, open_position::*,
    partial_reward::*, rebalance_setup::*, set_fee_config::*, set_test_block::*,
    transfer_position::*, unlock::*, withdraw::*,
};
