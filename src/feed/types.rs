use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Normalized input types supplied by the data feeds (provider-agnostic).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Moneyline,
    Spread,
    Total,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Moneyline => "moneyline",
            Market::Spread => "spread",
            Market::Total => "total",
        };
        f.write_str(s)
    }
}

/// One side of a two-way market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
            Side::Over => Side::Under,
            Side::Under => Side::Over,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Over => "over",
            Side::Under => "under",
        };
        f.write_str(s)
    }
}

/// A priced side of a market at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub event_id: String,
    pub sport: String,
    pub market: Market,
    pub side: Side,
    pub american_odds: i32,
    /// Spread or total line; absent for moneylines.
    #[serde(default)]
    pub line: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
}

/// Modeled true win probability for one side of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEstimate {
    pub event_id: String,
    pub market: Market,
    pub side: Side,
    pub probability: f64,
}

/// Public ticket/handle split for one side of a binary market.
/// The other side holds the complement of both percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicBettingSplit {
    pub event_id: String,
    pub market: Market,
    pub side: Side,
    pub bet_pct: f64,
    pub money_pct: f64,
}

/// Injury rollup from the injury feed. Positive impact favours the home side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjuryReport {
    pub total_injuries: u32,
    pub total_impact: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub total_impact: f64,
}

/// Feed quality metadata, each component in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f64,
    pub recency: f64,
    pub reliability: f64,
}

/// Auxiliary per-event context supplied by collaborators outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default)]
    pub injuries: Option<InjuryReport>,
    #[serde(default)]
    pub weather: Option<WeatherImpact>,
    /// Trap-game likelihood in [0, 1].
    #[serde(default)]
    pub trap_score: Option<f64>,
    #[serde(default)]
    pub data_quality: Option<DataQuality>,
}

/// One poll's worth of feed data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedBatch {
    #[serde(default)]
    pub quotes: Vec<OddsQuote>,
    #[serde(default)]
    pub estimates: Vec<ProbabilityEstimate>,
    #[serde(default)]
    pub splits: Vec<PublicBettingSplit>,
    /// Auxiliary context keyed by event id.
    #[serde(default)]
    pub contexts: BTreeMap<String, EventContext>,
}
