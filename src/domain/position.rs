//! Open position and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    /// Stop is touched if the bar trades through it on the adverse side.
    pub fn should_stop_loss(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.stop_loss,
            Direction::Short => bar.high >= self.stop_loss,
        }
    }

    pub fn should_take_profit(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.take_profit,
            Direction::Short => bar.low <= self.take_profit,
        }
    }

    /// Exit condition for this bar and the price it fills at.
    ///
    /// When the bar touches both levels the stop wins: without intrabar data
    /// the adverse path is assumed.
    pub fn exit_trigger(&self, bar: &OhlcvBar) -> Option<(ExitReason, f64)> {
        if self.should_stop_loss(bar) {
            Some((ExitReason::StopLoss, self.stop_loss))
        } else if self.should_take_profit(bar) {
            Some((ExitReason::TakeProfit, self.take_profit))
        } else {
            None
        }
    }

    /// Price P&L before costs if closed at `exit_price`.
    pub fn gross_pnl(&self, exit_price: f64) -> f64 {
        match self.direction {
            Direction::Long => (exit_price - self.entry_price) * self.quantity,
            Direction::Short => (self.entry_price - exit_price) * self.quantity,
        }
    }

    /// Capital committed at entry.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub profit: f64,
    pub profit_pct: f64,
    pub exit_reason: ExitReason,
    pub balance_after: f64,
    pub bars_held: usize,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}
