//! Risk-budget position sizing.
//!
//! quantity = balance * risk_fraction / distance_to_stop, so that hitting the
//! stop loses roughly `risk_fraction` of the balance before costs.

use super::position::Direction;

/// Quantity risking `risk_fraction` of `balance` over `price_distance`.
///
/// Returns 0 for a non-positive or non-finite distance.
pub fn position_size(balance: f64, risk_fraction: f64, price_distance: f64) -> f64 {
    if !price_distance.is_finite() || price_distance <= 0.0 {
        return 0.0;
    }
    balance * risk_fraction / price_distance
}

/// Signed distance from entry to stop in the adverse direction.
///
/// Positive for a correctly placed stop (below a long entry, above a short
/// entry), where it equals `|entry_price - stop_loss|`.
pub fn stop_distance(direction: Direction, entry_price: f64, stop_loss: f64) -> f64 {
    match direction {
        Direction::Long => entry_price - stop_loss,
        Direction::Short => stop_loss - entry_price,
    }
}
