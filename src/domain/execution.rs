//! Trade execution and fill simulation.
//!
//! Implements entry/exit fills with spread, risk-based quantity sizing,
//! commission and slippage, against the single position slot of a
//! [`Portfolio`].

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Direction, ExitReason, Position};
use super::sizing::{position_size, stop_distance};

/// What to do with a signal whose stop leaves no room to size a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegenerateStopPolicy {
    /// Open a zero-quantity position that holds the slot until it exits.
    #[default]
    Occupy,
    /// Ignore the signal and stay flat.
    Skip,
}

impl std::str::FromStr for DegenerateStopPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "occupy" => Ok(DegenerateStopPolicy::Occupy),
            "skip" => Ok(DegenerateStopPolicy::Skip),
            other => Err(format!("unknown degenerate stop policy '{other}'")),
        }
    }
}

/// Cost and sizing parameters for fills. Rates are fractions, not percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub risk_fraction: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub spread_rate: f64,
    pub degenerate_stop: DegenerateStopPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            risk_fraction: 0.005,
            commission_rate: 0.0,
            slippage_rate: 0.0,
            spread_rate: 0.0,
            degenerate_stop: DegenerateStopPolicy::Occupy,
        }
    }
}

/// Commission plus slippage on `price * quantity`.
pub fn transaction_costs(price: f64, quantity: f64, config: &ExecutionConfig) -> f64 {
    let notional = price * quantity;
    notional * config.commission_rate + notional * config.slippage_rate
}

/// Long entry pays the ask: market_price * (1 + spread)
pub fn apply_spread_long_entry(market_price: f64, spread_rate: f64) -> f64 {
    market_price * (1.0 + spread_rate)
}

/// Short entry hits the bid: market_price * (1 - spread)
pub fn apply_spread_short_entry(market_price: f64, spread_rate: f64) -> f64 {
    market_price * (1.0 - spread_rate)
}

pub fn entry_price(direction: Direction, market_price: f64, spread_rate: f64) -> f64 {
    match direction {
        Direction::Long => apply_spread_long_entry(market_price, spread_rate),
        Direction::Short => apply_spread_short_entry(market_price, spread_rate),
    }
}

/// An entry order derived from a lagged signal.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub direction: Direction,
    pub market_price: f64,
    pub time: NaiveDateTime,
    pub bar_index: usize,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        costs: f64,
    },
    /// The stop left no risk distance and the policy says skip.
    SkippedDegenerateStop,
    /// A position is already open.
    SlotOccupied,
}

/// Open a position.
///
/// 1. Apply spread to the market price
/// 2. Size from the risk budget and the distance to stop
/// 3. Deduct entry commission and slippage from the balance
/// 4. Place the position in the portfolio slot
///
/// Entry costs are sunk: they hit the balance now and are not part of the
/// trade's profit at exit.
pub fn enter_position(
    portfolio: &mut Portfolio,
    order: &EntryOrder,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() {
        return EntryResult::SlotOccupied;
    }

    let execution_price = entry_price(order.direction, order.market_price, config.spread_rate);
    let distance = stop_distance(order.direction, execution_price, order.stop_loss);
    let quantity = position_size(portfolio.balance, config.risk_fraction, distance);

    if quantity == 0.0 {
        tracing::warn!(
            time = %order.time,
            direction = %order.direction,
            entry = execution_price,
            stop = order.stop_loss,
            policy = ?config.degenerate_stop,
            "stop leaves no risk distance"
        );
        if config.degenerate_stop == DegenerateStopPolicy::Skip {
            return EntryResult::SkippedDegenerateStop;
        }
    }

    let costs = transaction_costs(execution_price, quantity, config);
    portfolio.balance -= costs;

    portfolio.open(Position {
        direction: order.direction,
        entry_price: execution_price,
        entry_time: order.time,
        entry_index: order.bar_index,
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        quantity,
    });

    tracing::debug!(
        time = %order.time,
        direction = %order.direction,
        price = execution_price,
        quantity,
        costs,
        "entered position"
    );

    EntryResult::Entered {
        quantity,
        execution_price,
        costs,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub exit_price: f64,
    pub costs: f64,
    pub profit: f64,
    pub reason: ExitReason,
}

/// Close the open position at `exit_price`.
///
/// 1. Gross P&L by direction
/// 2. Subtract exit commission and slippage
/// 3. Add the net profit to the balance
/// 4. Record the closed trade with the post-settlement balance
pub fn exit_position(
    portfolio: &mut Portfolio,
    exit_price: f64,
    reason: ExitReason,
    time: NaiveDateTime,
    bar_index: usize,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let position = portfolio.close()?;

    let costs = transaction_costs(exit_price, position.quantity, config);
    let profit = position.gross_pnl(exit_price) - costs;
    portfolio.balance += profit;

    let notional = position.notional();
    let profit_pct = if notional > 0.0 {
        profit / notional * 100.0
    } else {
        0.0
    };

    tracing::debug!(
        time = %time,
        direction = %position.direction,
        reason = %reason,
        price = exit_price,
        profit,
        balance = portfolio.balance,
        "closed position"
    );

    portfolio.record_trade(ClosedTrade {
        direction: position.direction,
        entry_time: position.entry_time,
        entry_price: position.entry_price,
        exit_time: time,
        exit_price,
        quantity: position.quantity,
        stop_loss: position.stop_loss,
        take_profit: position.take_profit,
        profit,
        profit_pct,
        exit_reason: reason,
        balance_after: portfolio.balance,
        bars_held: bar_index.saturating_sub(position.entry_index),
    });

    Some(ExitResult {
        exit_price,
        costs,
        profit,
        reason,
    })
}
