use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::feed::types::Market;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ev: EvConfig,
    #[serde(default)]
    pub line_movement: LineMovementConfig,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub sharp: SharpConfig,
    #[serde(default)]
    pub parlay: ParlayConfig,
    #[serde(default)]
    pub composite: CompositeConfig,
    #[serde(default)]
    pub sports: SportsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EvConfig {
    /// Fraction of full Kelly to stake (0.25 = quarter-Kelly).
    pub kelly_multiplier: f64,
    /// Hard cap on the staked bankroll fraction, applied after the multiplier.
    pub kelly_cap: f64,
    /// Confidence fed into unit sizing when the caller has none.
    pub default_confidence: f64,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: 0.25,
            kelly_cap: 0.10,
            default_confidence: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LineMovementConfig {
    /// Number of most recent movements averaged into the velocity estimate.
    pub velocity_window: usize,
    /// Time constant (hours) of the exponential decay applied to projections.
    pub decay_hours: f64,
    /// Line points added per respected sharp action.
    pub sharp_action_adjustment: f64,
    /// Snapshots older than this are dropped by `prune_expired`.
    pub retention_hours: i64,
    /// Per-key snapshot cap; oldest snapshots are evicted first. 0 = unbounded.
    pub max_snapshots_per_key: usize,
    /// Public ticket share above which a move away from that side is RLM.
    pub rlm_majority_pct: f64,
    /// Public ticket share below which a move toward that side is RLM.
    pub rlm_minority_pct: f64,
}

impl Default for LineMovementConfig {
    fn default() -> Self {
        Self {
            velocity_window: 5,
            decay_hours: 24.0,
            sharp_action_adjustment: 0.5,
            retention_hours: 72,
            max_snapshots_per_key: 0,
            rlm_majority_pct: 0.6,
            rlm_minority_pct: 0.4,
        }
    }
}

/// Entry timing thresholds for one market, in that market's tracked units.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct EntryTolerance {
    /// Distance from the best historical line still counted as "bet now".
    pub best_line_tolerance: f64,
    /// Projected improvement beyond which waiting is recommended.
    pub wait_improvement: f64,
}

/// Moneylines are measured in `line_scale` odds points, spreads and totals
/// in line points.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EntryConfig {
    pub moneyline: EntryTolerance,
    pub spread: EntryTolerance,
    pub total: EntryTolerance,
}

impl EntryConfig {
    pub fn for_market(&self, market: Market) -> EntryTolerance {
        match market {
            Market::Moneyline => self.moneyline,
            Market::Spread => self.spread,
            Market::Total => self.total,
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            moneyline: EntryTolerance {
                best_line_tolerance: 5.0,
                wait_improvement: 10.0,
            },
            spread: EntryTolerance {
                best_line_tolerance: 0.5,
                wait_improvement: 1.0,
            },
            total: EntryTolerance {
                best_line_tolerance: 0.5,
                wait_improvement: 1.0,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SharpConfig {
    /// Ticket share treated as a heavy public lean (mirrored at 1 - x).
    pub public_heavy_pct: f64,
    /// Money/ticket gap that marks a sharp side on its own.
    pub discrepancy_threshold: f64,
    /// Money/ticket gap that lifts a signal to high confidence.
    pub high_confidence_discrepancy: f64,
    pub liability_high_pct: f64,
    pub liability_medium_pct: f64,
}

impl Default for SharpConfig {
    fn default() -> Self {
        Self {
            public_heavy_pct: 0.65,
            discrepancy_threshold: 0.15,
            high_confidence_discrepancy: 0.25,
            liability_high_pct: 0.75,
            liability_medium_pct: 0.65,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ParlaySearch {
    #[default]
    Random,
    Enumeration,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ParlayConfig {
    pub search: ParlaySearch,
    pub trials_per_slot: usize,
    /// Correlation bump when every leg is from one sport.
    pub same_sport_correlation: f64,
    /// Correlation bump when some, but not all, legs share a sport.
    pub shared_sport_correlation: f64,
    /// Correlation bump when two legs come from the same event.
    pub same_event_correlation: f64,
    pub correlation_cap: f64,
    pub risk_per_leg: f64,
    pub leg_risk_cap: f64,
    pub miss_probability_weight: f64,
    pub correlation_risk_weight: f64,
    pub kelly_multiplier: f64,
    pub kelly_cap: f64,
    /// Upper bound on subsets scored by the enumeration strategy.
    pub enumeration_budget: usize,
}

impl Default for ParlayConfig {
    fn default() -> Self {
        Self {
            search: ParlaySearch::Random,
            trials_per_slot: 100,
            same_sport_correlation: 0.3,
            shared_sport_correlation: 0.15,
            same_event_correlation: 0.2,
            correlation_cap: 0.5,
            risk_per_leg: 0.15,
            leg_risk_cap: 0.5,
            miss_probability_weight: 0.5,
            correlation_risk_weight: 0.3,
            kelly_multiplier: 0.25,
            kelly_cap: 0.10,
            enumeration_budget: 20_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompositeConfig {
    pub sharp_side_weight: f64,
    pub spread_move_weight: f64,
    pub injury_impact_weight: f64,
    /// Value-rating points per line point of projected CLV.
    pub clv_weight: f64,
    /// Moneyline odds points (on `line_scale`) counted as one line point of CLV.
    pub moneyline_clv_unit: f64,
    pub high_confidence_sharp_bonus: f64,
    pub injury_count_volatility: f64,
    pub trap_volatility: f64,
    pub weather_volatility: f64,
    pub sharp_edge_pick_threshold: f64,
    pub value_pick_threshold: f64,
    pub avoid_threshold: f64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            sharp_side_weight: 20.0,
            spread_move_weight: 10.0,
            injury_impact_weight: 10.0,
            clv_weight: 10.0,
            moneyline_clv_unit: 10.0,
            high_confidence_sharp_bonus: 10.0,
            injury_count_volatility: 5.0,
            trap_volatility: 30.0,
            weather_volatility: 20.0,
            sharp_edge_pick_threshold: 30.0,
            value_pick_threshold: 70.0,
            avoid_threshold: 70.0,
        }
    }
}

/// Four-tier significance thresholds for one market, in line points
/// (odds points on the continuous scale for moneylines).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub minor: f64,
    pub moderate: f64,
    pub major: f64,
    pub steam: f64,
}

impl Thresholds {
    pub const fn new(minor: f64, moderate: f64, major: f64, steam: f64) -> Self {
        Self {
            minor,
            moderate,
            major,
            steam,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SportConfig {
    /// Spread magnitudes with outsized historical frequency.
    #[serde(default)]
    pub key_numbers: Vec<f64>,
    pub moneyline: Option<Thresholds>,
    pub spread: Option<Thresholds>,
    pub total: Option<Thresholds>,
}

impl SportConfig {
    pub fn thresholds(&self, market: Market) -> Option<&Thresholds> {
        match market {
            Market::Moneyline => self.moneyline.as_ref(),
            Market::Spread => self.spread.as_ref(),
            Market::Total => self.total.as_ref(),
        }
    }
}

/// Per-sport static configuration keyed by sport (e.g. "nfl").
///
/// Sports listed in the TOML file replace the built-in entry of the same key;
/// the remaining built-ins stay available.
#[derive(Debug, Clone)]
pub struct SportsConfig {
    sports: HashMap<String, SportConfig>,
}

impl SportsConfig {
    pub fn get(&self, sport: &str) -> Option<&SportConfig> {
        self.sports.get(&sport.to_ascii_lowercase())
    }

    pub fn insert(&mut self, sport: &str, config: SportConfig) {
        self.sports.insert(sport.to_ascii_lowercase(), config);
    }

    /// Thresholds for a (sport, market), or a configuration error if missing.
    pub fn thresholds(&self, sport: &str, market: Market) -> EngineResult<Thresholds> {
        self.get(sport)
            .and_then(|s| s.thresholds(market))
            .copied()
            .ok_or_else(|| EngineError::Configuration {
                sport: sport.to_string(),
                market,
            })
    }

    /// Key numbers for a sport; empty when the sport has none configured.
    pub fn key_numbers(&self, sport: &str) -> &[f64] {
        self.get(sport).map_or(&[], |s| s.key_numbers.as_slice())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sports.keys().cloned().collect();
        keys.sort();
        keys
    }
}

const MONEYLINE_TIERS: Thresholds = Thresholds::new(10.0, 25.0, 50.0, 100.0);

impl Default for SportsConfig {
    fn default() -> Self {
        let mut sports = HashMap::new();
        sports.insert(
            "nfl".to_string(),
            SportConfig {
                key_numbers: vec![3.0, 4.0, 6.0, 7.0, 10.0, 14.0],
                moneyline: Some(MONEYLINE_TIERS),
                spread: Some(Thresholds::new(0.5, 1.0, 2.0, 3.0)),
                total: Some(Thresholds::new(0.5, 1.0, 2.0, 3.0)),
            },
        );
        sports.insert(
            "ncaaf".to_string(),
            SportConfig {
                key_numbers: vec![3.0, 7.0, 10.0, 14.0, 17.0, 21.0],
                moneyline: Some(MONEYLINE_TIERS),
                spread: Some(Thresholds::new(0.5, 1.5, 2.5, 3.5)),
                total: Some(Thresholds::new(1.0, 2.0, 3.0, 4.0)),
            },
        );
        sports.insert(
            "nba".to_string(),
            SportConfig {
                key_numbers: vec![],
                moneyline: Some(MONEYLINE_TIERS),
                spread: Some(Thresholds::new(0.5, 1.0, 2.0, 3.0)),
                total: Some(Thresholds::new(1.0, 2.0, 3.0, 5.0)),
            },
        );
        sports.insert(
            "ncaab".to_string(),
            SportConfig {
                key_numbers: vec![],
                moneyline: Some(MONEYLINE_TIERS),
                spread: Some(Thresholds::new(0.5, 1.5, 2.5, 4.0)),
                total: Some(Thresholds::new(1.0, 2.0, 3.5, 5.0)),
            },
        );
        sports.insert(
            "mlb".to_string(),
            SportConfig {
                key_numbers: vec![],
                moneyline: Some(MONEYLINE_TIERS),
                // Run line / puck line, normally +/-1.5.
                spread: Some(Thresholds::new(0.5, 1.0, 1.5, 2.0)),
                total: Some(Thresholds::new(0.5, 1.0, 1.5, 2.0)),
            },
        );
        sports.insert(
            "nhl".to_string(),
            SportConfig {
                key_numbers: vec![],
                moneyline: Some(MONEYLINE_TIERS),
                // Run line / puck line, normally +/-1.5.
                spread: Some(Thresholds::new(0.5, 1.0, 1.5, 2.0)),
                total: Some(Thresholds::new(0.5, 1.0, 1.5, 2.0)),
            },
        );
        Self { sports }
    }
}

impl<'de> Deserialize<'de> for SportsConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let overrides = HashMap::<String, SportConfig>::deserialize(deserializer)?;
        let mut config = SportsConfig::default();
        for (key, sport) in overrides {
            config.insert(&key, sport);
        }
        Ok(config)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }
}
