//! Core domain types and logic. No I/O happens below this module.

pub mod ohlcv;
pub mod signal;
pub mod position;
pub mod sizing;
pub mod execution;
pub mod equity;
pub mod portfolio;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
