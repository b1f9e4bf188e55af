//! Performance metrics and statistics.
//!
//! Computed from the finished trade ledger and equity curve. Pure: nothing
//! here touches the running simulation.

use super::equity::EquityPoint;
use super::position::{ClosedTrade, ExitReason};

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Parameters for the risk-adjusted ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub risk_free_rate: f64,
    /// Equity samples per year, used to de-annualise the risk-free rate and
    /// annualise the ratios.
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub end_of_data_exits: usize,
    pub avg_bars_held: f64,
}

impl Metrics {
    /// The fixed record reported when nothing traded.
    pub fn empty(initial_balance: f64) -> Self {
        Metrics {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            final_balance: initial_balance,
            total_return: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            stop_loss_exits: 0,
            take_profit_exits: 0,
            end_of_data_exits: 0,
            avg_bars_held: 0.0,
        }
    }

    pub fn compute(
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        initial_balance: f64,
        config: &MetricsConfig,
    ) -> Self {
        if trades.is_empty() {
            return Metrics::empty(initial_balance);
        }

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut stop_loss_exits = 0usize;
        let mut take_profit_exits = 0usize;
        let mut end_of_data_exits = 0usize;
        let mut total_bars_held = 0usize;

        for trade in trades {
            // break-even trades count as losses
            if trade.is_win() {
                winning_trades += 1;
                gross_profit += trade.profit;
                largest_win = largest_win.max(trade.profit);
            } else {
                losing_trades += 1;
                gross_loss += trade.profit;
                largest_loss = largest_loss.max(trade.profit.abs());
            }

            match trade.exit_reason {
                ExitReason::StopLoss => stop_loss_exits += 1,
                ExitReason::TakeProfit => take_profit_exits += 1,
                ExitReason::EndOfData => end_of_data_exits += 1,
            }
            total_bars_held += trade.bars_held;
        }

        let gross_loss = gross_loss.abs();
        let total_trades = trades.len();
        let win_rate = winning_trades as f64 / total_trades as f64;

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if winning_trades > 0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if winning_trades > 0 {
            gross_profit / winning_trades as f64
        } else {
            0.0
        };

        let avg_loss = if losing_trades > 0 {
            gross_loss / losing_trades as f64
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = compute_drawdown(initial_balance, trades);

        let final_balance = trades
            .last()
            .map(|t| t.balance_after)
            .unwrap_or(initial_balance);
        let total_return = (final_balance - initial_balance) / initial_balance;

        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, config);

        Metrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            max_drawdown,
            max_drawdown_pct,
            final_balance,
            total_return,
            sharpe_ratio,
            sortino_ratio,
            stop_loss_exits,
            take_profit_exits,
            end_of_data_exits,
            avg_bars_held: total_bars_held as f64 / total_trades as f64,
        }
    }
}

/// Maximum drawdown over the settlement path `[initial] + balance_after…`.
///
/// Returns `(absolute, fraction_of_peak)`. Each is the largest value seen at
/// any point of the walk; the fraction is taken against the peak in force at
/// that point.
pub fn compute_drawdown(initial_balance: f64, trades: &[ClosedTrade]) -> (f64, f64) {
    let path = std::iter::once(initial_balance).chain(trades.iter().map(|t| t.balance_after));
    drawdown_over(path)
}

fn drawdown_over(path: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;

    for balance in path {
        if balance > peak {
            peak = balance;
        }
        let dd = peak - balance;
        let dd_pct = if peak > 0.0 { dd / peak } else { 0.0 };
        max_dd = max_dd.max(dd);
        max_dd_pct = max_dd_pct.max(dd_pct);
    }

    (max_dd, max_dd_pct)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], config: &MetricsConfig) -> (f64, f64) {
    if equity_curve.len() < 2 || config.periods_per_year <= 0.0 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].balance;
            let curr = w[1].balance;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let period_rf = config.risk_free_rate / config.periods_per_year;
    let excess_return = mean - period_rf;
    let annualise = config.periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * annualise
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * annualise
    } else {
        0.0
    };

    (sharpe, sortino)
}
