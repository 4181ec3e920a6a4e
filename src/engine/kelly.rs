//! Kelly criterion stake sizing for fixed-odds bets.

use super::odds::decimal_odds;
use crate::error::{check_probability, EngineError, EngineResult};

/// Compute the fractional-Kelly bankroll share for a bet at American odds.
///
/// - `probability`: modeled win probability, strictly inside (0, 1)
/// - `odds`: American odds, nonzero
/// - `multiplier`: scaling factor (e.g. 0.25 for quarter-Kelly)
/// - `cap`: hard ceiling applied after the multiplier
///
/// Returns a fraction in `[0, cap]`; negative-edge bets size to 0.
pub fn kelly_fraction(probability: f64, odds: i32, multiplier: f64, cap: f64) -> EngineResult<f64> {
    let decimal = decimal_odds(odds)?;
    kelly_fraction_decimal(probability, decimal, multiplier, cap)
}

/// Same as [`kelly_fraction`] for a decimal payout factor (e.g. a parlay price).
pub fn kelly_fraction_decimal(
    probability: f64,
    decimal: f64,
    multiplier: f64,
    cap: f64,
) -> EngineResult<f64> {
    let p = check_probability(probability)?;
    if !decimal.is_finite() || decimal <= 1.0 {
        return Err(EngineError::InvalidOdds(decimal));
    }
    let q = 1.0 - p;
    let b = decimal - 1.0;

    // f* = (b*p - q) / b
    let f_star = (b * p - q) / b;

    Ok((f_star * multiplier).max(0.0).min(cap.max(0.0)))
}
