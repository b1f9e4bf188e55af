//! Configuration validation.
//!
//! Runs against the raw config before a [`BacktestConfig`] is built, so a
//! mistyped value is reported instead of silently falling back to its
//! default. Absent keys are fine and take the defaults.
//!
//! [`BacktestConfig`]: crate::domain::backtest::BacktestConfig

use crate::domain::error::TradesimError;
use crate::domain::execution::DegenerateStopPolicy;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_risk_per_trade(config)?;
    validate_take_profit_ratio(config)?;
    validate_initial_balance(config)?;
    validate_cost_rates(config)?;
    validate_degenerate_stop(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradesimError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

/// The value of a numeric key, `None` if absent, an error if unparsable.
fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, TradesimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| TradesimError::invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "risk_per_trade_pct")? {
        if value <= 0.0 || value > 100.0 {
            return Err(TradesimError::invalid(
                "backtest",
                "risk_per_trade_pct",
                "risk_per_trade_pct must be in (0, 100]",
            ));
        }
    }
    Ok(())
}

fn validate_take_profit_ratio(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "take_profit_ratio")? {
        if value <= 0.0 {
            return Err(TradesimError::invalid(
                "backtest",
                "take_profit_ratio",
                "take_profit_ratio must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "initial_balance")? {
        if value <= 0.0 {
            return Err(TradesimError::invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_cost_rates(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    for key in ["commission_rate", "slippage_rate", "spread_rate"] {
        if let Some(value) = read_double(config, "backtest", key)? {
            if !(0.0..1.0).contains(&value) {
                return Err(TradesimError::invalid(
                    "backtest",
                    key,
                    format!("{key} must be in [0, 1)"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_degenerate_stop(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(raw) = config.get_string("backtest", "degenerate_stop") {
        raw.parse::<DegenerateStopPolicy>()
            .map_err(|reason| TradesimError::invalid("backtest", "degenerate_stop", reason))?;
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&value) {
            return Err(TradesimError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(value) = read_double(config, "backtest", "periods_per_year")? {
        if value <= 0.0 {
            return Err(TradesimError::invalid(
                "backtest",
                "periods_per_year",
                "periods_per_year must be positive",
            ));
        }
    }
    Ok(())
}
