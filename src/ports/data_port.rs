//! Data access port trait.

use crate::domain::error::TradesimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;

/// Bars and their aligned signals, one signal per bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketData {
    pub bars: Vec<OhlcvBar>,
    pub signals: Vec<Signal>,
}

impl MarketData {
    pub fn long_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.long && !s.short).count()
    }

    pub fn short_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.short && !s.long).count()
    }
}

pub trait DataPort {
    fn load(&self) -> Result<MarketData, TradesimError>;
}
