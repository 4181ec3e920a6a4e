//! Per-event rollup of sharp, movement, value and context signals.

use serde::Serialize;

use super::ev::EvAnalysis;
use super::line_movement::{ClosingLineProjection, LineMovementEvent};
use super::sharp::{ConfidenceTier, SharpSignal};
use crate::config::CompositeConfig;
use crate::feed::types::{EventContext, Market, Side};

/// Signals gathered for one event. Slices may be empty.
#[derive(Debug, Clone, Copy)]
pub struct CompositeInputs<'a> {
    pub event_id: &'a str,
    pub sharp_signals: &'a [SharpSignal],
    pub movements: &'a [LineMovementEvent],
    pub projections: &'a [ClosingLineProjection],
    pub ev: &'a [EvAnalysis],
    pub context: &'a EventContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RecommendationKind {
    SpreadPick { side: Side },
    /// `side` is the best positive-EV moneyline side, if one was priced.
    MoneylineValue { side: Option<Side> },
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFactor {
    SharpMoney,
    SpreadMovement,
    Injuries,
    ClosingLineValue,
    HighConfidenceSharp,
    InjuryVolume,
    TrapGame,
    Weather,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub event_id: String,
    pub kind: RecommendationKind,
    /// The score that triggered this recommendation, 0-100.
    pub confidence: f64,
    pub reasoning: String,
    pub key_factors: Vec<KeyFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeAssessment {
    pub event_id: String,
    /// -100 (sharp on away) to 100 (sharp on home).
    pub sharp_edge: f64,
    pub value_rating: f64,
    pub confidence: f64,
    pub volatility: f64,
    pub recommendations: Vec<Recommendation>,
}

pub struct CompositeScorer {
    config: CompositeConfig,
}

impl CompositeScorer {
    pub fn new(config: CompositeConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, inputs: &CompositeInputs<'_>) -> CompositeAssessment {
        let c = &self.config;
        let ctx = inputs.context;

        let mut edge_factors = Vec::new();
        let mut sharp_edge = 0.0;
        for signal in inputs.sharp_signals {
            match signal.sharp_side {
                Some(Side::Home) => sharp_edge += c.sharp_side_weight,
                Some(Side::Away) => sharp_edge -= c.sharp_side_weight,
                _ => continue,
            }
            push_unique(&mut edge_factors, KeyFactor::SharpMoney);
        }
        // Latest spread move wins; earlier ones are already priced in.
        let spread_move = inputs
            .movements
            .iter()
            .filter(|m| m.key.market == Market::Spread)
            .max_by_key(|m| m.timestamp);
        if let Some(m) = spread_move {
            match m.money_toward {
                Side::Home => sharp_edge += c.spread_move_weight,
                Side::Away => sharp_edge -= c.spread_move_weight,
                _ => {}
            }
            push_unique(&mut edge_factors, KeyFactor::SpreadMovement);
        }
        if let Some(injuries) = ctx.injuries.as_ref().filter(|i| i.total_impact != 0.0) {
            sharp_edge += injuries.total_impact * c.injury_impact_weight;
            edge_factors.push(KeyFactor::Injuries);
        }
        let sharp_edge = clamp_finite(sharp_edge, -100.0, 100.0);

        let mut value_factors = Vec::new();
        let avg_clv = if inputs.projections.is_empty() {
            0.0
        } else {
            value_factors.push(KeyFactor::ClosingLineValue);
            inputs
                .projections
                .iter()
                .map(|p| clv_in_line_points(p, c.moneyline_clv_unit))
                .sum::<f64>()
                / inputs.projections.len() as f64
        };
        let high_confidence = inputs
            .sharp_signals
            .iter()
            .filter(|s| s.confidence == ConfidenceTier::High)
            .count();
        if high_confidence > 0 {
            value_factors.push(KeyFactor::HighConfidenceSharp);
        }
        let value_rating = clamp_finite(
            50.0 + avg_clv * c.clv_weight + c.high_confidence_sharp_bonus * high_confidence as f64,
            0.0,
            100.0,
        );

        let confidence = match &ctx.data_quality {
            Some(q) => clamp_finite(
                q.completeness * 30.0 + q.recency * 30.0 + q.reliability * 40.0,
                0.0,
                100.0,
            ),
            None => 50.0,
        };

        let mut volatility_factors = Vec::new();
        let mut volatility = 0.0;
        if let Some(injuries) = ctx.injuries.as_ref().filter(|i| i.total_injuries > 0) {
            volatility += injuries.total_injuries as f64 * c.injury_count_volatility;
            volatility_factors.push(KeyFactor::InjuryVolume);
        }
        if let Some(trap) = ctx.trap_score.filter(|t| *t > 0.0) {
            volatility += trap * c.trap_volatility;
            volatility_factors.push(KeyFactor::TrapGame);
        }
        if let Some(weather) = ctx.weather.as_ref().filter(|w| w.total_impact != 0.0) {
            volatility += weather.total_impact.abs() * c.weather_volatility;
            volatility_factors.push(KeyFactor::Weather);
        }
        let volatility = clamp_finite(volatility, 0.0, 100.0);

        let event_id = inputs.event_id.to_string();
        let mut recommendations = Vec::new();
        if sharp_edge.abs() > c.sharp_edge_pick_threshold {
            let side = if sharp_edge > 0.0 { Side::Home } else { Side::Away };
            recommendations.push(Recommendation {
                event_id: event_id.clone(),
                kind: RecommendationKind::SpreadPick { side },
                confidence: sharp_edge.abs(),
                reasoning: format!("sharp edge {sharp_edge:+.0} points toward {side}"),
                key_factors: edge_factors,
            });
        }
        if value_rating > c.value_pick_threshold {
            let side = inputs
                .ev
                .iter()
                .filter(|a| a.market == Market::Moneyline && a.is_positive())
                .max_by(|a, b| a.expected_value.total_cmp(&b.expected_value))
                .map(|a| a.side);
            recommendations.push(Recommendation {
                event_id: event_id.clone(),
                kind: RecommendationKind::MoneylineValue { side },
                confidence: value_rating,
                reasoning: format!(
                    "value rating {value_rating:.0} (avg CLV {avg_clv:+.2}, {high_confidence} high-confidence sharp signals)"
                ),
                key_factors: value_factors,
            });
        }
        if volatility > c.avoid_threshold {
            recommendations.push(Recommendation {
                event_id: event_id.clone(),
                kind: RecommendationKind::Avoid,
                confidence: volatility,
                reasoning: format!("volatility {volatility:.0} too high to bet with confidence"),
                key_factors: volatility_factors,
            });
        }

        CompositeAssessment {
            event_id,
            sharp_edge,
            value_rating,
            confidence,
            volatility,
            recommendations,
        }
    }
}

/// Moneyline CLV is tracked in odds points; scale it down so one unit
/// weighs like a point on a spread or total.
fn clv_in_line_points(projection: &ClosingLineProjection, moneyline_unit: f64) -> f64 {
    match projection.key.market {
        Market::Moneyline => projection.expected_clv() / moneyline_unit,
        Market::Spread | Market::Total => projection.expected_clv(),
    }
}

/// NaN collapses to the lower bound.
fn clamp_finite(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        lo
    } else {
        x.clamp(lo, hi)
    }
}

fn push_unique(factors: &mut Vec<KeyFactor>, factor: KeyFactor) {
    if !factors.contains(&factor) {
        factors.push(factor);
    }
}

/// All recommendations across events, highest confidence first. Ties keep
/// the input order.
pub fn rank_recommendations(assessments: &[CompositeAssessment]) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = assessments
        .iter()
        .flat_map(|a| a.recommendations.iter().cloned())
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}
