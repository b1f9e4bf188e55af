//! Backtest engine: the single-position trade lifecycle loop.
//!
//! One linear pass over the bars. Per bar after the first:
//! 1. sample equity at the balance left by earlier settlements
//! 2. if in a position, check stop then target against this bar's range
//! 3. if flat (including just after an exit), act on the lagged signal at
//!    this bar's open
//!
//! A position still open after the last bar is settled at the last close and
//! the final equity sample is corrected to the settled balance.

use super::equity::{EquityCurve, EquityPoint};
use super::error::TradesimError;
use super::execution::{
    DegenerateStopPolicy, EntryOrder, EntryResult, ExecutionConfig, enter_position,
    exit_position,
};
use super::metrics::{Metrics, MetricsConfig};
use super::ohlcv::OhlcvBar;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason};
use super::signal::{Signal, lagged_signal};

pub const MIN_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Percent of balance risked per trade (0.5 = 0.5%).
    pub risk_per_trade_pct: f64,
    /// Reward-to-risk ratio used by the signal producer to place targets.
    /// Already reflected in each signal's take-profit; carried for reporting.
    pub take_profit_ratio: f64,
    pub initial_balance: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub spread_rate: f64,
    pub degenerate_stop: DegenerateStopPolicy,
    pub metrics: MetricsConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            risk_per_trade_pct: 0.5,
            take_profit_ratio: 2.0,
            initial_balance: 10_000.0,
            commission_rate: 0.0001,
            slippage_rate: 0.0001,
            spread_rate: 0.0003,
            degenerate_stop: DegenerateStopPolicy::Occupy,
            metrics: MetricsConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            risk_fraction: self.risk_per_trade_pct / 100.0,
            commission_rate: self.commission_rate,
            slippage_rate: self.slippage_rate,
            spread_rate: self.spread_rate,
            degenerate_stop: self.degenerate_stop,
        }
    }

    pub fn validate(&self) -> Result<(), TradesimError> {
        positive("risk_per_trade_pct", self.risk_per_trade_pct)?;
        positive("take_profit_ratio", self.take_profit_ratio)?;
        positive("initial_balance", self.initial_balance)?;
        non_negative("commission_rate", self.commission_rate)?;
        non_negative("slippage_rate", self.slippage_rate)?;
        non_negative("spread_rate", self.spread_rate)?;
        if !self.metrics.risk_free_rate.is_finite() {
            return Err(TradesimError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be finite",
            ));
        }
        positive("periods_per_year", self.metrics.periods_per_year)?;
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> Result<(), TradesimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TradesimError::invalid(
            "backtest",
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn non_negative(key: &str, value: f64) -> Result<(), TradesimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TradesimError::invalid(
            "backtest",
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub final_balance: f64,
}

/// Reject input the engine cannot run on. Bar ordering and price sanity are
/// the data source's job and are not rechecked here.
pub fn validate_inputs(
    bars: &[OhlcvBar],
    signals: &[Signal],
    config: &BacktestConfig,
) -> Result<(), TradesimError> {
    config.validate()?;

    if bars.is_empty() {
        return Err(TradesimError::EmptyInput);
    }
    if bars.len() < MIN_BARS {
        return Err(TradesimError::InsufficientBars {
            bars: bars.len(),
            minimum: MIN_BARS,
        });
    }
    if bars.len() != signals.len() {
        return Err(TradesimError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }

    for (index, signal) in signals.iter().enumerate() {
        if signal.direction().is_none() {
            continue;
        }
        if signal.stop_loss.is_none() {
            return Err(TradesimError::MissingSignalLevel {
                index,
                level: "stop_loss",
            });
        }
        if signal.take_profit.is_none() {
            return Err(TradesimError::MissingSignalLevel {
                index,
                level: "take_profit",
            });
        }
    }

    Ok(())
}

/// Run the simulation and summarise it.
pub fn run_backtest(
    bars: &[OhlcvBar],
    signals: &[Signal],
    config: &BacktestConfig,
) -> Result<BacktestResult, TradesimError> {
    validate_inputs(bars, signals, config)?;

    tracing::info!(
        bars = bars.len(),
        initial_balance = config.initial_balance,
        risk_per_trade_pct = config.risk_per_trade_pct,
        "starting backtest"
    );

    let exec = config.execution_config();
    let mut portfolio = Portfolio::new(config.initial_balance);
    portfolio.equity_curve = EquityCurve::with_capacity(bars.len());
    portfolio.record_equity(bars[0].timestamp);

    for (i, bar) in bars.iter().enumerate().skip(1) {
        step(&mut portfolio, signals, i, bar, &exec);
    }

    if let Some(last) = bars.last() {
        let settled = exit_position(
            &mut portfolio,
            last.close,
            ExitReason::EndOfData,
            last.timestamp,
            bars.len() - 1,
            &exec,
        );
        if settled.is_some() {
            portfolio.equity_curve.correct_last(portfolio.balance);
        }
    }

    let realized_pnl = portfolio.realized_pnl();
    let equity_curve = portfolio.equity_curve.into_points();
    let metrics = Metrics::compute(
        &portfolio.closed_trades,
        &equity_curve,
        config.initial_balance,
        &config.metrics,
    );

    tracing::info!(
        trades = portfolio.closed_trades.len(),
        realized_pnl,
        final_balance = portfolio.balance,
        total_return = metrics.total_return,
        "backtest completed"
    );

    Ok(BacktestResult {
        trades: portfolio.closed_trades,
        equity_curve,
        metrics,
        final_balance: portfolio.balance,
    })
}

fn step(
    portfolio: &mut Portfolio,
    signals: &[Signal],
    index: usize,
    bar: &OhlcvBar,
    exec: &ExecutionConfig,
) {
    portfolio.record_equity(bar.timestamp);

    let trigger = portfolio
        .position
        .as_ref()
        .and_then(|position| position.exit_trigger(bar));
    if let Some((reason, price)) = trigger {
        exit_position(portfolio, price, reason, bar.timestamp, index, exec);
    }

    if portfolio.has_position() {
        return;
    }

    let Some(signal) = lagged_signal(signals, index) else {
        return;
    };
    let (Some(direction), Some((stop_loss, take_profit))) = (signal.direction(), signal.levels())
    else {
        return;
    };

    let order = EntryOrder {
        direction,
        market_price: bar.open,
        time: bar.timestamp,
        bar_index: index,
        stop_loss,
        take_profit,
    };
    if let EntryResult::SkippedDegenerateStop = enter_position(portfolio, &order, exec) {
        tracing::debug!(time = %bar.timestamp, "signal skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Direction;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(i as i64)
    }

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: ts(i),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    fn frictionless() -> BacktestConfig {
        BacktestConfig {
            commission_rate: 0.0,
            slippage_rate: 0.0,
            spread_rate: 0.0,
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(BacktestConfig::default().validate().is_ok());
    }

    #[test]
    fn execution_config_converts_percent() {
        let exec = BacktestConfig::default().execution_config();
        assert_relative_eq!(exec.risk_fraction, 0.005);
        assert_relative_eq!(exec.spread_rate, 0.0003);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases = [
            BacktestConfig {
                risk_per_trade_pct: 0.0,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                take_profit_ratio: -1.0,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                initial_balance: 0.0,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                commission_rate: -0.1,
                ..BacktestConfig::default()
            },
            BacktestConfig {
                spread_rate: f64::NAN,
                ..BacktestConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(TradesimError::ConfigInvalid { .. })),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_input_rejected() {
        let result = run_backtest(&[], &[], &frictionless());
        assert!(matches!(result, Err(TradesimError::EmptyInput)));
    }

    #[test]
    fn single_bar_rejected() {
        let bars = vec![bar(0, 100.0, 101.0, 99.0, 100.0)];
        let result = run_backtest(&bars, &[Signal::none()], &frictionless());
        assert!(matches!(
            result,
            Err(TradesimError::InsufficientBars { bars: 1, minimum: 2 })
        ));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
        ];
        let result = run_backtest(&bars, &[Signal::none()], &frictionless());
        assert!(matches!(
            result,
            Err(TradesimError::LengthMismatch { bars: 2, signals: 1 })
        ));
    }

    #[test]
    fn directional_signal_without_levels_rejected() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
        ];
        let signals = vec![
            Signal {
                long: true,
                stop_loss: Some(95.0),
                ..Signal::none()
            },
            Signal::none(),
        ];
        let result = run_backtest(&bars, &signals, &frictionless());
        assert!(matches!(
            result,
            Err(TradesimError::MissingSignalLevel {
                index: 0,
                level: "take_profit"
            })
        ));
    }

    #[test]
    fn contradictory_signal_without_levels_is_ignored() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
        ];
        let signals = vec![
            Signal {
                long: true,
                short: true,
                ..Signal::none()
            },
            Signal::none(),
        ];
        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn take_profit_scenario() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 101.0, 121.0, 99.0, 118.0),
        ];
        let signals = vec![Signal::long(90.0, 120.0), Signal::none(), Signal::none()];
        let config = BacktestConfig {
            commission_rate: 0.0001,
            slippage_rate: 0.0001,
            ..frictionless()
        };

        let result = run_backtest(&bars, &signals, &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.direction, Direction::Long);
        assert_eq!(trade.entry_time, ts(1));
        assert_eq!(trade.exit_time, ts(2));
        assert_relative_eq!(trade.entry_price, 100.0);
        assert_relative_eq!(trade.quantity, 5.0, max_relative = 1e-12);
        assert_relative_eq!(trade.exit_price, 120.0);
        let exit_costs = 120.0 * 5.0 * 0.0002;
        assert_relative_eq!(trade.profit, 100.0 - exit_costs, max_relative = 1e-12);

        let entry_costs = 100.0 * 5.0 * 0.0002;
        assert_relative_eq!(
            result.final_balance,
            10_000.0 - entry_costs + 100.0 - exit_costs,
            max_relative = 1e-12
        );
        assert_relative_eq!(trade.balance_after, result.final_balance);
    }

    #[test]
    fn stop_loss_wins_tie() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 100.0, 125.0, 85.0, 100.0),
        ];
        let signals = vec![Signal::long(90.0, 120.0), Signal::none(), Signal::none()];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(result.trades[0].exit_price, 90.0);
        assert_relative_eq!(result.trades[0].profit, -50.0, max_relative = 1e-12);
    }

    #[test]
    fn short_stop_loss_wins_tie() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 100.0, 115.0, 75.0, 100.0),
        ];
        let signals = vec![Signal::short(110.0, 80.0), Signal::none(), Signal::none()];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert_eq!(result.trades[0].direction, Direction::Short);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(result.trades[0].exit_price, 110.0);
    }

    #[test]
    fn end_of_data_settles_and_corrects_equity() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 101.0, 104.0, 99.0, 103.0),
        ];
        let signals = vec![Signal::long(90.0, 120.0), Signal::none(), Signal::none()];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_relative_eq!(trade.exit_price, 103.0);
        assert_eq!(trade.exit_time, ts(2));
        assert_eq!(trade.bars_held, 1);
        assert_relative_eq!(trade.profit, 15.0, max_relative = 1e-12);

        assert_eq!(result.equity_curve.len(), 3);
        assert_relative_eq!(
            result.equity_curve[2].balance,
            10_015.0,
            max_relative = 1e-12
        );
        assert_relative_eq!(result.equity_curve[1].balance, 10_000.0);
    }

    #[test]
    fn same_bar_exit_then_reentry() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            // stop hit, and the signal from bar 1 re-enters at this open
            bar(2, 95.0, 96.0, 89.0, 92.0),
            bar(3, 92.0, 93.0, 91.0, 92.5),
        ];
        let signals = vec![
            Signal::long(90.0, 120.0),
            Signal::long(85.0, 110.0),
            Signal::none(),
            Signal::none(),
        ];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(result.trades[0].exit_time, ts(2));
        assert_eq!(result.trades[1].entry_time, ts(2));
        assert_relative_eq!(result.trades[1].entry_price, 95.0);
        assert_relative_eq!(result.trades[1].stop_loss, 85.0);
        assert_eq!(result.trades[1].exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn signal_ignored_while_in_position() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 100.0, 102.0, 98.0, 101.0),
            bar(3, 101.0, 102.0, 98.0, 101.0),
        ];
        let signals = vec![
            Signal::long(90.0, 120.0),
            Signal::short(110.0, 80.0),
            Signal::long(95.0, 130.0),
            Signal::none(),
        ];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_time, ts(1));
        assert_eq!(result.trades[0].direction, Direction::Long);
    }

    #[test]
    fn last_bar_signal_never_acted_on() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
        ];
        let signals = vec![Signal::none(), Signal::long(90.0, 120.0)];

        let result = run_backtest(&bars, &signals, &frictionless()).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.metrics, Metrics::empty(10_000.0));
    }

    #[test]
    fn all_none_signals_give_flat_equity() {
        let bars: Vec<_> = (0..10)
            .map(|i| bar(i, 100.0, 101.0, 99.0, 100.0))
            .collect();
        let signals = vec![Signal::none(); 10];

        let result = run_backtest(&bars, &signals, &BacktestConfig::default()).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 10);
        assert!(result.equity_curve.iter().all(|p| p.balance == 10_000.0));
        assert_eq!(result.metrics, Metrics::empty(10_000.0));
        assert_eq!(result.final_balance, 10_000.0);
    }

    fn degenerate_bars() -> Vec<OhlcvBar> {
        vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 106.0, 108.0, 106.0, 107.0),
            bar(3, 107.0, 108.0, 106.0, 107.0),
        ]
    }

    fn degenerate_signals() -> Vec<Signal> {
        // first signal's stop sits above the long entry
        vec![
            Signal::long(105.0, 120.0),
            Signal::long(90.0, 120.0),
            Signal::none(),
            Signal::none(),
        ]
    }

    #[test]
    fn degenerate_stop_occupy_blocks_following_signal() {
        let result =
            run_backtest(&degenerate_bars(), &degenerate_signals(), &frictionless()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_time, ts(1));
        assert_eq!(trade.quantity, 0.0);
        assert_eq!(trade.profit, 0.0);
        assert_eq!(trade.profit_pct, 0.0);
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(result.final_balance, 10_000.0);
    }

    #[test]
    fn degenerate_stop_skip_lets_next_signal_enter() {
        let config = BacktestConfig {
            degenerate_stop: DegenerateStopPolicy::Skip,
            ..frictionless()
        };

        let result = run_backtest(&degenerate_bars(), &degenerate_signals(), &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_time, ts(2));
        assert_relative_eq!(trade.entry_price, 106.0);
        assert_relative_eq!(trade.quantity, 50.0 / 16.0, max_relative = 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn entry_costs_hit_balance_not_trade_profit() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 100.0, 101.0, 99.0, 100.0),
        ];
        let signals = vec![Signal::long(90.0, 120.0), Signal::none(), Signal::none()];
        let config = BacktestConfig {
            commission_rate: 0.001,
            ..frictionless()
        };

        let result = run_backtest(&bars, &signals, &config).unwrap();

        let trade = &result.trades[0];
        // flat exit at 100: profit is only the exit commission
        assert_relative_eq!(trade.profit, -0.5, max_relative = 1e-9);
        // balance also lost the entry commission
        assert_relative_eq!(result.final_balance, 10_000.0 - 0.5 - 0.5, max_relative = 1e-12);
        // bar 1 is sampled before its entry; bar 2 carries the sunk entry cost
        // until the end-of-data correction replaces it
        assert_relative_eq!(result.equity_curve[1].balance, 10_000.0);
        assert_relative_eq!(result.equity_curve[2].balance, result.final_balance);
    }

    #[test]
    fn spread_shifts_entry_price() {
        let bars = vec![
            bar(0, 100.0, 101.0, 99.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
        ];
        let signals = vec![Signal::short(110.0, 80.0), Signal::none()];
        let config = BacktestConfig {
            spread_rate: 0.01,
            ..frictionless()
        };

        let result = run_backtest(&bars, &signals, &config).unwrap();

        assert_relative_eq!(result.trades[0].entry_price, 99.0, max_relative = 1e-12);
        assert_relative_eq!(result.trades[0].quantity, 50.0 / 11.0, max_relative = 1e-9);
    }
}
