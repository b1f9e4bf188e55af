#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::process::ExitCode;
use tradesim::domain::backtest::BacktestConfig;
use tradesim::domain::error::TradesimError;
pub use tradesim::domain::ohlcv::OhlcvBar;
pub use tradesim::domain::signal::Signal;
use tradesim::ports::data_port::{DataPort, MarketData};

pub struct MockDataPort {
    pub data: MarketData,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(bars: Vec<OhlcvBar>, signals: Vec<Signal>) -> Self {
        Self {
            data: MarketData { bars, signals },
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            data: MarketData::default(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn load(&self) -> Result<MarketData, TradesimError> {
        if let Some(reason) = &self.error {
            return Err(TradesimError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.clone())
    }
}

/// Five-minute bars starting 2024-01-15 00:00.
pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(5 * i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts(i),
        open,
        high,
        low,
        close,
        volume: Some(1_000.0),
    }
}

/// A bar that trades within one point of `price`.
pub fn flat_bar(i: usize, price: f64) -> OhlcvBar {
    make_bar(i, price, price + 1.0, price - 1.0, price)
}

pub fn flat_bars(n: usize, price: f64) -> Vec<OhlcvBar> {
    (0..n).map(|i| flat_bar(i, price)).collect()
}

pub fn no_signals(n: usize) -> Vec<Signal> {
    vec![Signal::none(); n]
}

pub fn frictionless_config() -> BacktestConfig {
    BacktestConfig {
        commission_rate: 0.0,
        slippage_rate: 0.0,
        spread_rate: 0.0,
        ..BacktestConfig::default()
    }
}

/// Compare exit codes through their debug rendering, which carries the raw status.
pub fn exit_code_is(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}
