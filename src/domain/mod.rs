pub mod address;
pub mod gas_reserve;
pub mod notice;
pub mod preflight;
pub mod state_machine;
pub mod token_config;
pub mod types;
pub mod units;
