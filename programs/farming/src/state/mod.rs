// Farm state.

pub mod farm;
pub mod position;
pub mod setup;
