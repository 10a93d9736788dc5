//! Validator and token holder tooling for the SKALE staking contracts

pub mod commands;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod format;
pub mod logs;
pub mod metrics;
pub mod transaction;
pub mod units;
pub mod wallet;
