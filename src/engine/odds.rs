//! American / decimal / implied-probability conversions.

use crate::error::{check_probability, EngineError, EngineResult};

fn check_odds(odds: i32) -> EngineResult<f64> {
    if odds == 0 {
        return Err(EngineError::InvalidOdds(0.0));
    }
    Ok(odds as f64)
}

/// Convert American odds to implied probability.
/// Positive odds (e.g., +150): prob = 100 / (odds + 100)
/// Negative odds (e.g., -150): prob = |odds| / (|odds| + 100)
pub fn implied_probability(odds: i32) -> EngineResult<f64> {
    let odds = check_odds(odds)?;
    if odds > 0.0 {
        Ok(100.0 / (odds + 100.0))
    } else {
        let abs = odds.abs();
        Ok(abs / (abs + 100.0))
    }
}

/// Convert American odds to a decimal payout factor (stake included).
pub fn decimal_odds(odds: i32) -> EngineResult<f64> {
    let odds = check_odds(odds)?;
    if odds > 0.0 {
        Ok(odds / 100.0 + 1.0)
    } else {
        Ok(100.0 / odds.abs() + 1.0)
    }
}

/// Convert decimal odds back to (fractional) American odds.
///
/// `d >= 2.0` maps to underdog prices, `d < 2.0` to favourite prices.
pub fn decimal_to_american(decimal: f64) -> EngineResult<f64> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return Err(EngineError::InvalidOdds(decimal));
    }
    if decimal >= 2.0 {
        Ok((decimal - 1.0) * 100.0)
    } else {
        Ok(-100.0 / (decimal - 1.0))
    }
}

/// Fair American price for a probability, rounded to the nearest point.
pub fn probability_to_american(probability: f64) -> EngineResult<i32> {
    let p = check_probability(probability)?;
    let american = decimal_to_american(1.0 / p)?;
    Ok(american.round() as i32)
}

/// Devig two-way odds to get fair probabilities.
/// Returns (first_fair_prob, second_fair_prob).
pub fn devig(first_odds: i32, second_odds: i32) -> EngineResult<(f64, f64)> {
    let first = implied_probability(first_odds)?;
    let second = implied_probability(second_odds)?;
    let total = first + second;
    Ok((first / total, second / total))
}

/// Book margin of a two-way market (0.0476 for -110/-110).
pub fn overround(first_odds: i32, second_odds: i32) -> EngineResult<f64> {
    Ok(implied_probability(first_odds)? + implied_probability(second_odds)? - 1.0)
}

/// Map American odds onto a continuous scale where -100 and +100 coincide.
///
/// Moneyline movement measured on this scale counts odds points, so a move
/// from -105 to +105 is 10 points rather than 210.
pub fn line_scale(odds: i32) -> f64 {
    if odds >= 100 {
        (odds - 100) as f64
    } else if odds <= -100 {
        (odds + 100) as f64
    } else {
        odds as f64
    }
}
