//! Line movement tracking: per-key snapshot history, movement significance,
//! key-number crossings, steam moves, reverse line movement, closing-line
//! projection and entry timing.
//!
//! Values are tracked from the perspective of `LineKey::side`:
//! - spreads: the side's spread (e.g. -3.5)
//! - moneylines: the side's American odds on the continuous [`line_scale`]
//! - totals: the posted total, identical for over and under
//!
//! For spreads and moneylines a falling value means the side got more
//! expensive, i.e. money came in on it. For totals a rising value means
//! money on the over.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::history::{InMemoryLineStore, LineHistoryStore, LineKey, LineSnapshot};
use super::odds::line_scale;
use crate::config::{EntryConfig, LineMovementConfig, SportsConfig, Thresholds};
use crate::error::{EngineError, EngineResult};
use crate::feed::types::{Market, OddsQuote, PublicBettingSplit, Side};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Minor,
    Moderate,
    Major,
    Steam,
}

/// Classify a movement magnitude against a sport/market tier table.
pub fn classify(magnitude: f64, thresholds: &Thresholds) -> Significance {
    let magnitude = magnitude.abs();
    if magnitude >= thresholds.steam {
        Significance::Steam
    } else if magnitude >= thresholds.major {
        Significance::Major
    } else if magnitude >= thresholds.moderate {
        Significance::Moderate
    } else {
        Significance::Minor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementTrigger {
    SteamMove,
    ReverseLineMovement,
    KeyNumber,
}

/// Delta between two consecutive snapshots of one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineMovementEvent {
    pub key: LineKey,
    pub sport: String,
    pub previous: f64,
    pub new: f64,
    pub change: f64,
    pub significance: Significance,
    /// Side the market moved toward (the side money came in on).
    pub money_toward: Side,
    pub elapsed_hours: f64,
    pub timestamp: DateTime<Utc>,
    pub trigger: Option<MovementTrigger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCrossing {
    /// The line passed over the key number.
    Through,
    /// The line landed on the key number.
    Onto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMoment {
    pub key: LineKey,
    /// Unsigned key number (3, 7, ...).
    pub key_number: f64,
    /// Signed line that was crossed (-7, +3, ...).
    pub line: f64,
    pub crossing: KeyCrossing,
    pub from: f64,
    pub to: f64,
    pub timestamp: DateTime<Utc>,
}

/// Steam-tier movement, reported as synchronized sharp action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteamMove {
    pub key: LineKey,
    pub sport: String,
    pub change: f64,
    pub money_toward: Side,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReverseLineMovement {
    /// Side the public ticket share refers to.
    pub public_side: Side,
    pub bet_pct: f64,
    pub sharp_side: Side,
    /// `|bet_pct - 0.5| * 2`, in [0, 1].
    pub severity: f64,
}

/// Everything one ingest produced. Empty for the first snapshot of a key
/// and for stale repeats of the previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineUpdate {
    pub movement: Option<LineMovementEvent>,
    pub key_moments: Vec<KeyMoment>,
    pub steam_move: Option<SteamMove>,
    pub reverse_line_movement: Option<ReverseLineMovement>,
}

/// Side money moved toward, given a value change on `side`'s line.
pub fn money_toward(market: Market, side: Side, change: f64) -> Option<Side> {
    if change.abs() < EPSILON {
        return None;
    }
    match market {
        Market::Total => Some(if change > 0.0 { Side::Over } else { Side::Under }),
        Market::Spread | Market::Moneyline => {
            Some(if change < 0.0 { side } else { side.opposite() })
        }
    }
}

/// Signed key lines crossed (or landed on) moving from `previous` to `new`,
/// in the order they were passed. Leaving a key number does not count.
pub fn key_number_crossings(previous: f64, new: f64, key_numbers: &[f64]) -> Vec<(f64, KeyCrossing)> {
    let (lo, hi) = if previous < new { (previous, new) } else { (new, previous) };
    let mut crossed: Vec<(f64, KeyCrossing)> = key_numbers
        .iter()
        .filter(|k| **k > 0.0)
        .flat_map(|&k| [-k, k])
        .filter_map(|line| {
            if (line - previous).abs() < EPSILON {
                None
            } else if (line - new).abs() < EPSILON {
                Some((line, KeyCrossing::Onto))
            } else if lo < line && line < hi {
                Some((line, KeyCrossing::Through))
            } else {
                None
            }
        })
        .collect();
    crossed.sort_by(|a, b| (a.0 - previous).abs().total_cmp(&(b.0 - previous).abs()));
    crossed
}

/// Flag reverse line movement: the line moved against the public majority.
///
/// `bet_pct` is the public ticket share on `public_side`; `money_toward` is
/// the side the line moved toward.
pub fn detect_reverse_line_movement(
    public_side: Side,
    bet_pct: f64,
    money_toward: Side,
    config: &LineMovementConfig,
) -> Option<ReverseLineMovement> {
    if !bet_pct.is_finite() {
        return None;
    }
    let sharp_side = if bet_pct > config.rlm_majority_pct && money_toward == public_side.opposite() {
        public_side.opposite()
    } else if bet_pct < config.rlm_minority_pct && money_toward == public_side {
        public_side
    } else {
        return None;
    };
    Some(ReverseLineMovement {
        public_side,
        bet_pct,
        sharp_side,
        severity: ((bet_pct - 0.5).abs() * 2.0).min(1.0),
    })
}

/// Value tracked for a quote, or None when a spread/total quote has no line.
pub fn tracked_value(quote: &OddsQuote) -> Option<f64> {
    match quote.market {
        Market::Moneyline => Some(line_scale(quote.american_odds)),
        Market::Spread | Market::Total => quote.line,
    }
}

/// Higher is better for someone betting `side` at `value`.
fn bettor_value(market: Market, side: Side, value: f64) -> f64 {
    match (market, side) {
        (Market::Total, Side::Over) => -value,
        _ => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SharpMark {
    /// +1.0 or -1.0 in value space.
    direction: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosingLineProjection {
    pub key: LineKey,
    pub current: f64,
    pub projected_close: f64,
    pub velocity_per_hour: f64,
    pub projected_movement: f64,
    pub sharp_adjustment: f64,
    pub hours_until_start: f64,
    pub movements_observed: usize,
    pub sharp_actions: usize,
    /// In [0.5, 0.9].
    pub confidence: f64,
}

impl ClosingLineProjection {
    /// Projected closing-line value of betting the key's side now, in tracked
    /// units (`line_scale` points for moneylines). Positive when the line is
    /// expected to close worse than it is now.
    pub fn expected_clv(&self) -> f64 {
        bettor_value(self.key.market, self.key.side, self.current)
            - bettor_value(self.key.market, self.key.side, self.projected_close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRecommendation {
    BetNow,
    Wait,
    MissedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryAdvice {
    pub recommendation: EntryRecommendation,
    pub current: f64,
    pub best_historical: f64,
    pub projected: f64,
    /// How much better the projected line is for the bettor than the current one.
    pub projected_improvement: f64,
}

/// Stateful tracker over an injected history store.
///
/// Writes take `&mut self`, so a tracker shared across tasks must sit behind
/// a lock to keep per-key append order.
pub struct LineTracker<S: LineHistoryStore = InMemoryLineStore> {
    store: S,
    sports: SportsConfig,
    config: LineMovementConfig,
    entry: EntryConfig,
    sharp_actions: HashMap<LineKey, Vec<SharpMark>>,
}

impl LineTracker<InMemoryLineStore> {
    pub fn new(sports: SportsConfig, config: LineMovementConfig, entry: EntryConfig) -> Self {
        let store = InMemoryLineStore::with_capacity(config.max_snapshots_per_key);
        Self::with_store(store, sports, config, entry)
    }
}

impl<S: LineHistoryStore> LineTracker<S> {
    pub fn with_store(
        store: S,
        sports: SportsConfig,
        config: LineMovementConfig,
        entry: EntryConfig,
    ) -> Self {
        Self {
            store,
            sports,
            config,
            entry,
            sharp_actions: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a quote. Returns `Ok(None)` for spread/total quotes without a line.
    pub fn record_quote(
        &mut self,
        quote: &OddsQuote,
        split: Option<&PublicBettingSplit>,
    ) -> EngineResult<Option<LineUpdate>> {
        let Some(value) = tracked_value(quote) else {
            return Ok(None);
        };
        let key = LineKey::new(quote.event_id.clone(), quote.market, quote.side);
        self.record(&key, &quote.sport, value, quote.timestamp, split)
            .map(Some)
    }

    /// Append a new value for `key` and derive movement against the most
    /// recent stored snapshot.
    ///
    /// A value identical to the previous snapshot is a stale feed repeat and
    /// is not stored.
    pub fn record(
        &mut self,
        key: &LineKey,
        sport: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        split: Option<&PublicBettingSplit>,
    ) -> EngineResult<LineUpdate> {
        if !value.is_finite() {
            return Err(EngineError::InvalidOdds(value));
        }
        let thresholds = self.sports.thresholds(sport, key.market)?;

        let previous = self.store.last(key);
        if let Some(prev) = previous {
            if (prev.value - value).abs() < EPSILON {
                return Ok(LineUpdate::default());
            }
        }
        self.store.append(key, LineSnapshot { value, timestamp });

        let Some(prev) = previous else {
            return Ok(LineUpdate::default());
        };

        let change = value - prev.value;
        let significance = classify(change, &thresholds);
        // Non-zero change is guaranteed by the stale check above.
        let toward = money_toward(key.market, key.side, change).unwrap_or(key.side);
        let elapsed_hours = (timestamp - prev.timestamp).num_milliseconds() as f64 / 3_600_000.0;

        let key_moments: Vec<KeyMoment> = if key.market == Market::Spread {
            key_number_crossings(prev.value, value, self.sports.key_numbers(sport))
                .into_iter()
                .map(|(line, crossing)| KeyMoment {
                    key: key.clone(),
                    key_number: line.abs(),
                    line,
                    crossing,
                    from: prev.value,
                    to: value,
                    timestamp,
                })
                .collect()
        } else {
            Vec::new()
        };

        let steam_move = (significance == Significance::Steam).then(|| SteamMove {
            key: key.clone(),
            sport: sport.to_string(),
            change,
            money_toward: toward,
            timestamp,
        });

        let reverse_line_movement = split
            .filter(|s| s.side == key.side || s.side == key.side.opposite())
            .and_then(|s| detect_reverse_line_movement(s.side, s.bet_pct, toward, &self.config));

        if steam_move.is_some() || reverse_line_movement.is_some() {
            self.sharp_actions
                .entry(key.clone())
                .or_default()
                .push(SharpMark {
                    direction: change.signum(),
                    timestamp,
                });
        }

        if let Some(steam) = &steam_move {
            tracing::info!(
                event = %key.event_id,
                market = %key.market,
                sport,
                change = steam.change,
                toward = %steam.money_toward,
                "steam move detected"
            );
        }

        let trigger = if steam_move.is_some() {
            Some(MovementTrigger::SteamMove)
        } else if reverse_line_movement.is_some() {
            Some(MovementTrigger::ReverseLineMovement)
        } else if !key_moments.is_empty() {
            Some(MovementTrigger::KeyNumber)
        } else {
            None
        };

        Ok(LineUpdate {
            movement: Some(LineMovementEvent {
                key: key.clone(),
                sport: sport.to_string(),
                previous: prev.value,
                new: value,
                change,
                significance,
                money_toward: toward,
                elapsed_hours,
                timestamp,
                trigger,
            }),
            key_moments,
            steam_move,
            reverse_line_movement,
        })
    }

    pub fn history(&self, key: &LineKey) -> Vec<LineSnapshot> {
        self.store.get(key)
    }

    pub fn opening(&self, key: &LineKey) -> Option<LineSnapshot> {
        self.store.get(key).first().copied()
    }

    pub fn latest(&self, key: &LineKey) -> Option<LineSnapshot> {
        self.store.last(key)
    }

    /// Net change from the opening snapshot to the latest one.
    pub fn movement_from_open(&self, key: &LineKey) -> Option<f64> {
        let history = self.store.get(key);
        match (history.first(), history.last()) {
            (Some(open), Some(last)) => Some(last.value - open.value),
            _ => None,
        }
    }

    pub fn sharp_action_count(&self, key: &LineKey) -> usize {
        self.sharp_actions.get(key).map_or(0, Vec::len)
    }

    /// Project where the line closes from recent velocity, decayed toward
    /// game time, plus a flat nudge per sharp action on this key.
    pub fn project_closing_line(
        &self,
        key: &LineKey,
        now: DateTime<Utc>,
        commence_time: DateTime<Utc>,
    ) -> Option<ClosingLineProjection> {
        let history = self.store.get(key);
        let current = history.last()?.value;
        let movements_observed = history.len().saturating_sub(1);

        let rates: Vec<f64> = history
            .windows(2)
            .rev()
            .take(self.config.velocity_window)
            .filter_map(|pair| {
                let hours = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64
                    / 3_600_000.0;
                (hours > 0.0).then(|| (pair[1].value - pair[0].value) / hours)
            })
            .collect();
        let velocity_per_hour = if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        };

        let hours_until_start =
            ((commence_time - now).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
        let decay = (-hours_until_start / self.config.decay_hours).exp();
        let projected_movement = velocity_per_hour * hours_until_start * decay;

        let actions = self.sharp_actions.get(key).map_or(&[][..], Vec::as_slice);
        let sharp_adjustment: f64 = actions
            .iter()
            .map(|a| a.direction * self.config.sharp_action_adjustment)
            .sum();

        let mut confidence: f64 = 0.5;
        if movements_observed > 5 {
            confidence += 0.2;
        }
        if !actions.is_empty() {
            confidence += 0.2;
        }
        if hours_until_start < 6.0 {
            confidence += 0.1;
        }

        Some(ClosingLineProjection {
            key: key.clone(),
            current,
            projected_close: current + projected_movement + sharp_adjustment,
            velocity_per_hour,
            projected_movement,
            sharp_adjustment,
            hours_until_start,
            movements_observed,
            sharp_actions: actions.len(),
            confidence: confidence.min(0.9),
        })
    }

    /// Compare the current line with the best line this key has shown
    /// (opening line included) and with the projected close.
    pub fn best_entry(
        &self,
        key: &LineKey,
        projection: &ClosingLineProjection,
    ) -> Option<EntryAdvice> {
        let history = self.store.get(key);
        let current = history.last()?.value;
        let score = |v: f64| bettor_value(key.market, key.side, v);

        let best_historical = history
            .iter()
            .map(|s| s.value)
            .max_by(|a, b| score(*a).total_cmp(&score(*b)))?;

        let gap_to_best = score(best_historical) - score(current);
        let projected_improvement = score(projection.projected_close) - score(current);
        let tolerance = self.entry.for_market(key.market);

        let recommendation = if gap_to_best <= tolerance.best_line_tolerance
            || projected_improvement <= 0.0
        {
            EntryRecommendation::BetNow
        } else if projected_improvement > tolerance.wait_improvement {
            EntryRecommendation::Wait
        } else {
            EntryRecommendation::MissedValue
        };

        Some(EntryAdvice {
            recommendation,
            current,
            best_historical,
            projected: projection.projected_close,
            projected_improvement,
        })
    }

    /// Drop snapshots and sharp actions recorded before `cutoff`.
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let removed = self.store.prune_older_than(cutoff);
        for actions in self.sharp_actions.values_mut() {
            actions.retain(|a| a.timestamp >= cutoff);
        }
        self.sharp_actions.retain(|_, a| !a.is_empty());
        if removed > 0 {
            tracing::debug!(removed, %cutoff, "pruned line history");
        }
        removed
    }

    /// Apply the configured retention window relative to `now`. A window
    /// reaching past the representable calendar keeps everything.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = chrono::Duration::try_hours(self.config.retention_hours)
            .and_then(|window| now.checked_sub_signed(window));
        match cutoff {
            Some(cutoff) => self.prune_older_than(cutoff),
            None => {
                tracing::debug!(
                    retention_hours = self.config.retention_hours,
                    "retention window out of range, nothing pruned"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tracker() -> LineTracker {
        LineTracker::new(
            SportsConfig::default(),
            LineMovementConfig::default(),
            EntryConfig::default(),
        )
    }

    fn spread_key() -> LineKey {
        LineKey::new("nfl-1", Market::Spread, Side::Home)
    }

    #[test]
    fn test_first_snapshot_has_no_movement() {
        let mut t = tracker();
        let update = t.record(&spread_key(), "nfl", -3.0, Utc::now(), None).unwrap();
        assert!(update.movement.is_none());
        assert_eq!(t.history(&spread_key()).len(), 1);
    }

    #[test]
    fn test_nfl_steam_through_key_numbers() {
        let mut t = tracker();
        let t0 = Utc::now();
        t.record(&spread_key(), "nfl", -3.0, t0, None).unwrap();
        let update = t
            .record(&spread_key(), "nfl", -7.5, t0 + Duration::minutes(10), None)
            .unwrap();

        let movement = update.movement.unwrap();
        assert!((movement.change + 4.5).abs() < 1e-9);
        assert_eq!(movement.significance, Significance::Steam);
        assert_eq!(movement.money_toward, Side::Home);
        assert_eq!(movement.trigger, Some(MovementTrigger::SteamMove));

        let keys: Vec<f64> = update.key_moments.iter().map(|k| k.key_number).collect();
        assert_eq!(keys, vec![4.0, 6.0, 7.0]);
        assert!(update
            .key_moments
            .iter()
            .all(|k| k.crossing == KeyCrossing::Through));
        assert!(update.steam_move.is_some());
        assert_eq!(t.sharp_action_count(&spread_key()), 1);
    }

    #[test]
    fn test_movement_is_against_previous_not_opening() {
        let mut t = tracker();
        let t0 = Utc::now();
        t.record(&spread_key(), "nfl", -3.0, t0, None).unwrap();
        t.record(&spread_key(), "nfl", -3.5, t0 + Duration::minutes(5), None).unwrap();
        let update = t
            .record(&spread_key(), "nfl", -4.0, t0 + Duration::minutes(10), None)
            .unwrap();
        let movement = update.movement.unwrap();
        assert_eq!(movement.previous, -3.5);
        assert_eq!(movement.significance, Significance::Minor);
        assert_eq!(t.movement_from_open(&spread_key()), Some(-1.0));
    }

    #[test]
    fn test_stale_repeat_not_stored() {
        let mut t = tracker();
        let t0 = Utc::now();
        t.record(&spread_key(), "nfl", -3.0, t0, None).unwrap();
        let update = t
            .record(&spread_key(), "nfl", -3.0, t0 + Duration::minutes(1), None)
            .unwrap();
        assert_eq!(update, LineUpdate::default());
        assert_eq!(t.history(&spread_key()).len(), 1);
    }

    #[test]
    fn test_missing_threshold_table_is_configuration_error() {
        let mut t = tracker();
        let key = LineKey::new("mlb-1", Market::Spread, Side::Home);
        let err = t.record(&key, "mlb", -1.5, Utc::now(), None).unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
        assert!(t.history(&key).is_empty());
    }

    #[test]
    fn test_landing_on_key_number() {
        let crossings = key_number_crossings(-2.5, -3.0, &[3.0, 7.0]);
        assert_eq!(crossings, vec![(-3.0, KeyCrossing::Onto)]);
        // Leaving a key number is not a crossing.
        assert!(key_number_crossings(-3.0, -3.5, &[3.0, 7.0]).is_empty());
        // Flipping from dog to favourite passes the key on both signs.
        let crossings = key_number_crossings(3.5, -3.5, &[3.0]);
        assert_eq!(
            crossings,
            vec![(3.0, KeyCrossing::Through), (-3.0, KeyCrossing::Through)]
        );
    }

    #[test]
    fn test_classify_tiers() {
        let tiers = Thresholds::new(10.0, 25.0, 50.0, 100.0);
        assert_eq!(classify(5.0, &tiers), Significance::Minor);
        assert_eq!(classify(-25.0, &tiers), Significance::Moderate);
        assert_eq!(classify(60.0, &tiers), Significance::Major);
        assert_eq!(classify(-100.0, &tiers), Significance::Steam);
    }

    #[test]
    fn test_reverse_line_movement_on_moneyline() {
        let mut t = tracker();
        let key = LineKey::new("nfl-2", Market::Moneyline, Side::Home);
        let split = PublicBettingSplit {
            event_id: "nfl-2".to_string(),
            market: Market::Moneyline,
            side: Side::Home,
            bet_pct: 0.70,
            money_pct: 0.55,
        };
        let t0 = Utc::now();
        t.record(&key, "nfl", line_scale(-150), t0, None).unwrap();
        // Home lengthens from -150 to -135 despite 70 % of tickets on home.
        let update = t
            .record(&key, "nfl", line_scale(-135), t0 + Duration::minutes(30), Some(&split))
            .unwrap();

        let rlm = update.reverse_line_movement.unwrap();
        assert_eq!(rlm.sharp_side, Side::Away);
        assert!((rlm.severity - 0.40).abs() < 1e-9);
        let movement = update.movement.unwrap();
        assert_eq!(movement.money_toward, Side::Away);
        // 15 odds points is below the 25-point moderate tier.
        assert_eq!(movement.significance, Significance::Minor);
        assert_eq!(movement.trigger, Some(MovementTrigger::ReverseLineMovement));
    }

    #[test]
    fn test_rlm_minority_side() {
        let config = LineMovementConfig::default();
        let rlm = detect_reverse_line_movement(Side::Home, 0.30, Side::Home, &config).unwrap();
        assert_eq!(rlm.sharp_side, Side::Home);
        assert!((rlm.severity - 0.40).abs() < 1e-9);
        // Line following the public is not RLM.
        assert!(detect_reverse_line_movement(Side::Home, 0.70, Side::Home, &config).is_none());
        assert!(detect_reverse_line_movement(Side::Home, 0.50, Side::Away, &config).is_none());
    }

    #[test]
    fn test_total_direction() {
        assert_eq!(money_toward(Market::Total, Side::Under, 1.0), Some(Side::Over));
        assert_eq!(money_toward(Market::Total, Side::Over, -0.5), Some(Side::Under));
        assert_eq!(money_toward(Market::Spread, Side::Away, 0.5), Some(Side::Home));
        assert_eq!(money_toward(Market::Spread, Side::Away, 0.0), None);
    }

    #[test]
    fn test_projection_with_steady_drift() {
        let mut t = tracker();
        let key = LineKey::new("nba-1", Market::Total, Side::Over);
        let t0 = Utc::now();
        // +0.5 per hour, three movements.
        for (i, v) in [220.0, 220.5, 221.0, 221.5].into_iter().enumerate() {
            t.record(&key, "nba", v, t0 + Duration::hours(i as i64), None).unwrap();
        }
        let now = t0 + Duration::hours(3);
        let projection = t
            .project_closing_line(&key, now, now + Duration::hours(4))
            .unwrap();
        assert!((projection.velocity_per_hour - 0.5).abs() < 1e-9);
        let expected = 0.5 * 4.0 * (-4.0f64 / 24.0).exp();
        assert!((projection.projected_movement - expected).abs() < 1e-9);
        assert_eq!(projection.sharp_adjustment, 0.0);
        // 0.5 base + 0.1 for < 6h to start
        assert!((projection.confidence - 0.6).abs() < 1e-9);
        // Total rising favours the over bettor.
        assert!(projection.expected_clv() > 0.0);
    }

    #[test]
    fn test_velocity_uses_only_recent_window() {
        let mut t = tracker();
        let key = LineKey::new("nba-2", Market::Total, Side::Over);
        let t0 = Utc::now();
        // Two early 10-point jumps, then five 0.5-point steps.
        let values = [200.0, 210.0, 220.0, 220.5, 221.0, 221.5, 222.0, 222.5];
        for (i, v) in values.into_iter().enumerate() {
            t.record(&key, "nba", v, t0 + Duration::hours(i as i64), None).unwrap();
        }
        let now = t0 + Duration::hours(7);
        let projection = t
            .project_closing_line(&key, now, now + Duration::hours(4))
            .unwrap();
        assert_eq!(projection.movements_observed, 7);
        // Last 5 movements only: the early jumps would pull the mean to ~3.2.
        assert!((projection.velocity_per_hour - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_projection_confidence_caps() {
        let mut t = tracker();
        let t0 = Utc::now();
        let values = [-3.0, -3.5, -4.0, -4.5, -5.0, -5.5, -6.0, -10.0];
        for (i, v) in values.into_iter().enumerate() {
            t.record(&spread_key(), "nfl", v, t0 + Duration::minutes(30 * i as i64), None)
                .unwrap();
        }
        let now = t0 + Duration::hours(4);
        let projection = t
            .project_closing_line(&spread_key(), now, now + Duration::hours(2))
            .unwrap();
        assert_eq!(projection.movements_observed, 7);
        assert_eq!(projection.sharp_actions, 1);
        // Steam toward home nudges the projection further negative.
        assert_eq!(projection.sharp_adjustment, -0.5);
        assert!((projection.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_projection_unknown_key() {
        let t = tracker();
        let now = Utc::now();
        assert!(t.project_closing_line(&spread_key(), now, now).is_none());
    }

    fn moneyline_tracker_with(values: &[i32]) -> (LineTracker, LineKey, DateTime<Utc>) {
        let mut t = tracker();
        let key = LineKey::new("nfl-3", Market::Moneyline, Side::Away);
        let t0 = Utc::now();
        for (i, odds) in values.iter().enumerate() {
            t.record(&key, "nfl", line_scale(*odds), t0 + Duration::hours(i as i64), None)
                .unwrap();
        }
        (t, key, t0 + Duration::hours(values.len() as i64))
    }

    fn projection_at(key: &LineKey, current: f64, projected_close: f64) -> ClosingLineProjection {
        ClosingLineProjection {
            key: key.clone(),
            current,
            projected_close,
            velocity_per_hour: 0.0,
            projected_movement: projected_close - current,
            sharp_adjustment: 0.0,
            hours_until_start: 10.0,
            movements_observed: 0,
            sharp_actions: 0,
            confidence: 0.5,
        }
    }

    #[test]
    fn test_best_entry_bet_now_near_best() {
        let (t, key, _) = moneyline_tracker_with(&[150, 148]);
        let current = line_scale(148);
        let advice = t
            .best_entry(&key, &projection_at(&key, current, current + 20.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::BetNow);
        assert_eq!(advice.best_historical, line_scale(150));
    }

    #[test]
    fn test_best_entry_wait_for_projected_drift() {
        let (t, key, _) = moneyline_tracker_with(&[160, 130]);
        let current = line_scale(130);
        let advice = t
            .best_entry(&key, &projection_at(&key, current, current + 15.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::Wait);
    }

    #[test]
    fn test_best_entry_missed_value() {
        let (t, key, _) = moneyline_tracker_with(&[160, 130]);
        let current = line_scale(130);
        let advice = t
            .best_entry(&key, &projection_at(&key, current, current + 6.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::MissedValue);
        // A projection that worsens the line means take it now.
        let advice = t
            .best_entry(&key, &projection_at(&key, current, current - 6.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::BetNow);
    }

    fn spread_tracker_with(values: &[f64]) -> LineTracker {
        let mut t = tracker();
        let t0 = Utc::now();
        for (i, v) in values.iter().enumerate() {
            t.record(&spread_key(), "nfl", *v, t0 + Duration::hours(i as i64), None)
                .unwrap();
        }
        t
    }

    #[test]
    fn test_best_entry_spread_wait_for_projected_return() {
        let t = spread_tracker_with(&[-3.0, -7.5]);
        // 4.5 points off the best line, projected back to -3.
        let advice = t
            .best_entry(&spread_key(), &projection_at(&spread_key(), -7.5, -3.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::Wait);
        assert_eq!(advice.projected_improvement, 4.5);
    }

    #[test]
    fn test_best_entry_spread_missed_value_and_bet_now() {
        let t = spread_tracker_with(&[-3.0, -4.0]);
        // A point off the best line, only half a point projected to come back.
        let advice = t
            .best_entry(&spread_key(), &projection_at(&spread_key(), -4.0, -3.5))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::MissedValue);

        // Within half a point of the best line.
        let t = spread_tracker_with(&[-3.0, -3.5]);
        let advice = t
            .best_entry(&spread_key(), &projection_at(&spread_key(), -3.5, -2.0))
            .unwrap();
        assert_eq!(advice.recommendation, EntryRecommendation::BetNow);
    }

    #[test]
    fn test_prune_expired_with_huge_window_keeps_everything() {
        for retention_hours in [i64::MAX, 2_000_000_000] {
            let mut t = LineTracker::new(
                SportsConfig::default(),
                LineMovementConfig {
                    retention_hours,
                    ..LineMovementConfig::default()
                },
                EntryConfig::default(),
            );
            let t0 = Utc::now();
            t.record(&spread_key(), "nfl", -3.0, t0, None).unwrap();
            assert_eq!(t.prune_expired(t0 + Duration::hours(1)), 0);
            assert_eq!(t.history(&spread_key()).len(), 1);
        }
    }

    #[test]
    fn test_prune_expired_drops_history_and_sharp_actions() {
        let mut t = tracker();
        let t0 = Utc::now();
        t.record(&spread_key(), "nfl", -3.0, t0, None).unwrap();
        t.record(&spread_key(), "nfl", -7.0, t0 + Duration::minutes(1), None).unwrap();
        assert_eq!(t.sharp_action_count(&spread_key()), 1);

        let removed = t.prune_expired(t0 + Duration::hours(100));
        assert_eq!(removed, 2);
        assert!(t.latest(&spread_key()).is_none());
        assert_eq!(t.sharp_action_count(&spread_key()), 0);
    }

    #[test]
    fn test_record_quote_skips_lineless_spread() {
        let mut t = tracker();
        let quote = OddsQuote {
            event_id: "nfl-9".to_string(),
            sport: "nfl".to_string(),
            market: Market::Spread,
            side: Side::Home,
            american_odds: -110,
            line: None,
            timestamp: Utc::now(),
            commence_time: None,
        };
        assert_eq!(t.record_quote(&quote, None).unwrap(), None);
    }
}
