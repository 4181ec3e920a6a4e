//! Single-leg expected value: edge, EV, value rating, Kelly and unit sizing.

use serde::Serialize;

use super::kelly::kelly_fraction;
use super::odds::{decimal_odds, implied_probability};
use crate::config::EvConfig;
use crate::error::{check_probability, EngineError, EngineResult};
use crate::feed::types::{Market, OddsQuote, ProbabilityEstimate, Side};

/// Derived value judgment for one priced side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvAnalysis {
    pub event_id: String,
    pub sport: String,
    pub market: Market,
    pub side: Side,
    pub american_odds: i32,
    pub decimal_odds: f64,
    pub implied_probability: f64,
    pub true_probability: f64,
    pub edge: f64,
    pub expected_value: f64,
    /// 0 (no value) to 5 (strong value).
    pub value_rating: u8,
    pub kelly_fraction: f64,
    /// 0 to 10 units.
    pub suggested_units: u8,
}

impl EvAnalysis {
    pub fn is_positive(&self) -> bool {
        self.expected_value > 0.0
    }
}

/// EV per unit staked: `p * (decimal - 1) - (1 - p)`.
pub fn expected_value(probability: f64, odds: i32) -> EngineResult<f64> {
    expected_value_decimal(probability, decimal_odds(odds)?)
}

pub fn expected_value_decimal(probability: f64, decimal: f64) -> EngineResult<f64> {
    let p = check_probability(probability)?;
    if !decimal.is_finite() || decimal <= 1.0 {
        return Err(EngineError::InvalidOdds(decimal));
    }
    Ok(p * (decimal - 1.0) - (1.0 - p))
}

/// Discrete 0-5 rating; bounds are strict and scanned from the top.
pub fn value_rating(expected_value: f64) -> u8 {
    const TIERS: [(f64, u8); 5] = [(0.15, 5), (0.10, 4), (0.05, 3), (0.02, 2), (0.0, 1)];
    TIERS
        .iter()
        .find(|(bound, _)| expected_value > *bound)
        .map_or(0, |&(_, rating)| rating)
}

/// Units to stake (0-10) from rating, edge and a caller confidence in [0, 1].
///
/// A bet with no value gets 0 units; any rated bet gets at least 1.
pub fn suggested_units(rating: u8, edge: f64, confidence: f64) -> u8 {
    if rating == 0 {
        return 0;
    }
    let base = f64::from(rating) * 2.0;
    let confidence = confidence.clamp(0.0, 1.0);
    let units = (base * confidence * (edge * 10.0).min(2.0)).round();
    units.clamp(1.0, 10.0) as u8
}

/// Analyze a quote against a modeled probability with the default confidence.
pub fn analyze(
    quote: &OddsQuote,
    estimate: &ProbabilityEstimate,
    config: &EvConfig,
) -> EngineResult<EvAnalysis> {
    analyze_with_confidence(quote, estimate, config, config.default_confidence)
}

pub fn analyze_with_confidence(
    quote: &OddsQuote,
    estimate: &ProbabilityEstimate,
    config: &EvConfig,
    confidence: f64,
) -> EngineResult<EvAnalysis> {
    let p = check_probability(estimate.probability)?;
    let implied = implied_probability(quote.american_odds)?;
    let decimal = decimal_odds(quote.american_odds)?;

    let edge = p - implied;
    let ev = expected_value_decimal(p, decimal)?;
    let rating = value_rating(ev);
    let kelly = kelly_fraction(p, quote.american_odds, config.kelly_multiplier, config.kelly_cap)?;

    Ok(EvAnalysis {
        event_id: quote.event_id.clone(),
        sport: quote.sport.clone(),
        market: quote.market,
        side: quote.side,
        american_odds: quote.american_odds,
        decimal_odds: decimal,
        implied_probability: implied,
        true_probability: p,
        edge,
        expected_value: ev,
        value_rating: rating,
        kelly_fraction: kelly,
        suggested_units: suggested_units(rating, edge, confidence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn quote(odds: i32) -> OddsQuote {
        OddsQuote {
            event_id: "evt-1".to_string(),
            sport: "nfl".to_string(),
            market: Market::Moneyline,
            side: Side::Home,
            american_odds: odds,
            line: None,
            timestamp: Utc::now(),
            commence_time: None,
        }
    }

    fn estimate(p: f64) -> ProbabilityEstimate {
        ProbabilityEstimate {
            event_id: "evt-1".to_string(),
            market: Market::Moneyline,
            side: Side::Home,
            probability: p,
        }
    }

    #[test]
    fn test_sixty_percent_at_minus_110() {
        let a = analyze(&quote(-110), &estimate(0.60), &EvConfig::default()).unwrap();
        assert!((a.implied_probability - 0.5238).abs() < 1e-4);
        assert!((a.decimal_odds - 1.909).abs() < 1e-3);
        // EV = 0.60 * 0.909 - 0.40 = 0.1455
        assert!((a.expected_value - 0.1455).abs() < 1e-3);
        assert_eq!(a.value_rating, 4);
        assert!((a.kelly_fraction - 0.04).abs() < 1e-9);
        // base 8 * 1.0 * min(0.762, 2) = 6.1 -> 6
        assert_eq!(a.suggested_units, 6);
        assert!(a.is_positive());
    }

    #[test]
    fn test_value_rating_boundaries_are_strict() {
        assert_eq!(value_rating(0.20), 5);
        assert_eq!(value_rating(0.15), 4);
        assert_eq!(value_rating(0.10), 3);
        assert_eq!(value_rating(0.05), 2);
        assert_eq!(value_rating(0.02), 1);
        assert_eq!(value_rating(0.0001), 1);
        assert_eq!(value_rating(0.0), 0);
        assert_eq!(value_rating(-0.3), 0);
    }

    #[test]
    fn test_no_value_means_no_units() {
        let a = analyze(&quote(-110), &estimate(0.45), &EvConfig::default()).unwrap();
        assert_eq!(a.value_rating, 0);
        assert_eq!(a.suggested_units, 0);
        assert_eq!(a.kelly_fraction, 0.0);
    }

    #[test]
    fn test_units_floor_and_ceiling() {
        // Tiny edge still sizes to the 1-unit floor once rated.
        assert_eq!(suggested_units(1, 0.001, 1.0), 1);
        // base 10 * 1.0 * 2.0 = 20 -> 10
        assert_eq!(suggested_units(5, 0.5, 1.0), 10);
        // Confidence scales the stake.
        assert_eq!(suggested_units(5, 0.5, 0.25), 5);
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        let config = EvConfig::default();
        assert!(matches!(
            analyze(&quote(0), &estimate(0.5), &config),
            Err(EngineError::InvalidOdds(_))
        ));
        assert!(matches!(
            analyze(&quote(-110), &estimate(0.0), &config),
            Err(EngineError::InvalidProbability(_))
        ));
        assert!(matches!(
            analyze(&quote(-110), &estimate(f64::NAN), &config),
            Err(EngineError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let config = EvConfig::default();
        let a = analyze(&quote(137), &estimate(0.4471), &config).unwrap();
        let b = analyze(&quote(137), &estimate(0.4471), &config).unwrap();
        assert_eq!(a.expected_value.to_bits(), b.expected_value.to_bits());
        assert_eq!(a.kelly_fraction.to_bits(), b.kelly_fraction.to_bits());
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_ev_increasing_in_probability(
            odds in prop_oneof![-2_000i32..=-100, 100i32..=2_000],
            p1 in 0.01f64..0.98,
            delta in 0.001f64..0.01,
        ) {
            let lo = expected_value(p1, odds).unwrap();
            let hi = expected_value(p1 + delta, odds).unwrap();
            prop_assert!(hi > lo);
        }

        #[test]
        fn prop_rating_monotonic(a in -1.0f64..1.0, b in -1.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(value_rating(lo) <= value_rating(hi));
        }
    }
}
