//! Per-run simulation context: running balance, the single position slot,
//! the trade ledger and the equity curve.

use super::equity::EquityCurve;
use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub balance: f64,
    pub initial_balance: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: EquityCurve,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Portfolio {
            balance: initial_balance,
            initial_balance,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: EquityCurve::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Fill the slot. A position already held is left untouched and the new
    /// one is handed back.
    pub fn open(&mut self, position: Position) -> Option<Position> {
        if self.position.is_some() {
            return Some(position);
        }
        self.position = Some(position);
        None
    }

    pub fn close(&mut self) -> Option<Position> {
        self.position.take()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: chrono::NaiveDateTime) {
        self.equity_curve.record(timestamp, self.balance);
    }

    pub fn realized_pnl(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.profit).sum()
    }
}
