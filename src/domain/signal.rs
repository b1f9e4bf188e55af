//! Entry signals and the one-bar lag contract with the signal producer.
//!
//! A signal attached to bar `i` is only ever acted on at bar `i + SIGNAL_LAG`,
//! using that later bar's open. Producers compute signals and their
//! stop/target levels from information available at the close of bar `i`;
//! the engine never looks at the signal of the bar it is executing on.

use super::position::Direction;

/// Bars between a signal being observed and the engine acting on it.
pub const SIGNAL_LAG: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signal {
    pub long: bool,
    pub short: bool,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Signal {
    pub fn none() -> Self {
        Signal::default()
    }

    pub fn long(stop_loss: f64, take_profit: f64) -> Self {
        Signal {
            long: true,
            short: false,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }

    pub fn short(stop_loss: f64, take_profit: f64) -> Self {
        Signal {
            long: false,
            short: true,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }

    /// Resolved direction. Both flags set is contradictory and reads as no signal.
    pub fn direction(&self) -> Option<Direction> {
        match (self.long, self.short) {
            (true, false) => Some(Direction::Long),
            (false, true) => Some(Direction::Short),
            _ => None,
        }
    }

    /// Stop and target for a directional signal, if both are present.
    pub fn levels(&self) -> Option<(f64, f64)> {
        Some((self.stop_loss?, self.take_profit?))
    }
}

/// The signal the engine may act on at `bar_index`, or `None` during the lag
/// warmup.
pub fn lagged_signal(signals: &[Signal], bar_index: usize) -> Option<&Signal> {
    bar_index
        .checked_sub(SIGNAL_LAG)
        .and_then(|i| signals.get(i))
}
