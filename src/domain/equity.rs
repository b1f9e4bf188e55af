//! Equity tracking: one balance sample per bar.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EquityCurve {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, timestamp: NaiveDateTime, balance: f64) {
        self.points.push(EquityPoint { timestamp, balance });
    }

    /// Overwrite the balance of the most recent sample. Used after a forced
    /// end-of-data settlement so the curve ends on the realised balance.
    pub fn correct_last(&mut self, balance: f64) {
        if let Some(last) = self.points.last_mut() {
            last.balance = balance;
        }
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn balances(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.balance)
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}
