//! Multi-leg parlay construction under correlation and EV constraints.
//!
//! The search is pluggable: [`RandomSearch`] is the trial-and-reject sampler,
//! [`SubsetEnumeration`] a deterministic bounded alternative. Both score
//! candidates through the same [`ParlayEvaluator`].
//!
//! Joint probability assumes independent legs; the correlation score is a
//! coarse sport/event overlap proxy, not a statistical estimate.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::ev::expected_value_decimal;
use super::kelly::kelly_fraction_decimal;
use super::odds::{decimal_odds, decimal_to_american, implied_probability};
use crate::config::{ParlayConfig, ParlaySearch};
use crate::error::{check_probability, EngineError, EngineResult};
use crate::feed::types::{Market, Side};

/// One candidate leg from the pre-filtered opportunity pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayLeg {
    pub event_id: String,
    pub sport: String,
    pub market: Market,
    pub side: Side,
    pub odds: i32,
    pub probability: f64,
}

impl ParlayLeg {
    fn market_key(&self) -> String {
        format!("{}:{}", self.event_id, self.market)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParlayConstraints {
    pub max_parlays: usize,
    pub min_legs: usize,
    pub max_legs: usize,
    pub min_ev: f64,
    pub max_correlation: f64,
}

impl Default for ParlayConstraints {
    fn default() -> Self {
        Self {
            max_parlays: 5,
            min_legs: 2,
            max_legs: 4,
            min_ev: 0.0,
            max_correlation: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedParlay {
    pub legs: Vec<ParlayLeg>,
    /// Sorted `event:market` keys, unique within one optimizer run.
    pub key: String,
    pub decimal_odds: f64,
    pub combined_odds: i32,
    pub joint_probability: f64,
    pub implied_probability: f64,
    pub correlation_score: f64,
    pub risk_score: f64,
    pub expected_value: f64,
    pub kelly_stake: f64,
    /// 0-100 heuristic.
    pub confidence: f64,
}

/// Scores a candidate leg set; shared by every search strategy.
pub struct ParlayEvaluator<'a> {
    config: &'a ParlayConfig,
}

impl<'a> ParlayEvaluator<'a> {
    pub fn new(config: &'a ParlayConfig) -> Self {
        Self { config }
    }

    pub fn dedup_key(legs: &[ParlayLeg]) -> String {
        let mut keys: Vec<String> = legs.iter().map(ParlayLeg::market_key).collect();
        keys.sort();
        keys.join("|")
    }

    /// Sport/event overlap proxy in `[0, correlation_cap]`.
    pub fn correlation(&self, legs: &[ParlayLeg]) -> f64 {
        if legs.len() < 2 {
            return 0.0;
        }
        let mut sports: HashMap<&str, usize> = HashMap::new();
        let mut events: HashMap<&str, usize> = HashMap::new();
        for leg in legs {
            *sports.entry(leg.sport.as_str()).or_default() += 1;
            *events.entry(leg.event_id.as_str()).or_default() += 1;
        }

        let mut score = if sports.len() == 1 {
            self.config.same_sport_correlation
        } else if sports.values().any(|&n| n > 1) {
            self.config.shared_sport_correlation
        } else {
            0.0
        };
        if events.values().any(|&n| n > 1) {
            score += self.config.same_event_correlation;
        }
        score.min(self.config.correlation_cap)
    }

    /// Build a parlay from `legs`, or None when it violates the constraints.
    /// Two legs on the same event and market are never combined.
    pub fn evaluate(
        &self,
        legs: Vec<ParlayLeg>,
        constraints: &ParlayConstraints,
    ) -> Option<OptimizedParlay> {
        let n = legs.len();
        if n == 0 {
            return None;
        }
        let distinct: HashSet<String> = legs.iter().map(ParlayLeg::market_key).collect();
        if distinct.len() != n {
            return None;
        }

        let mut decimal = 1.0;
        let mut joint_probability = 1.0;
        for leg in &legs {
            decimal *= decimal_odds(leg.odds).ok()?;
            joint_probability *= leg.probability;
        }
        let combined_odds = decimal_to_american(decimal).ok()?.round() as i32;

        let correlation_score = self.correlation(&legs);
        if correlation_score > constraints.max_correlation {
            return None;
        }

        let expected_value = expected_value_decimal(joint_probability, decimal).ok()?;
        if expected_value < constraints.min_ev {
            return None;
        }

        let c = self.config;
        let risk_score = ((n as f64 * c.risk_per_leg).min(c.leg_risk_cap)
            + (1.0 - joint_probability) * c.miss_probability_weight
            + correlation_score * c.correlation_risk_weight)
            .min(1.0);

        let kelly_stake =
            kelly_fraction_decimal(joint_probability, decimal, c.kelly_multiplier, c.kelly_cap)
                .ok()?;

        let mean_probability = legs.iter().map(|l| l.probability).sum::<f64>() / n as f64;
        let confidence = (mean_probability * 100.0 * (1.0 - correlation_score)
            - 5.0 * n.saturating_sub(2) as f64)
            .clamp(0.0, 100.0);

        Some(OptimizedParlay {
            key: Self::dedup_key(&legs),
            legs,
            decimal_odds: decimal,
            combined_odds,
            joint_probability,
            implied_probability: 1.0 / decimal,
            correlation_score,
            risk_score,
            expected_value,
            kelly_stake,
            confidence,
        })
    }
}

/// A candidate-generation strategy. Implementations return at most
/// `constraints.max_parlays` parlays with pairwise distinct keys.
pub trait ParlayStrategy {
    fn name(&self) -> &'static str;

    fn search(
        &mut self,
        pool: &[ParlayLeg],
        constraints: &ParlayConstraints,
        evaluator: &ParlayEvaluator<'_>,
    ) -> Vec<OptimizedParlay>;
}

/// Best-effort stochastic search: per output slot, a fixed number of random
/// trials, keeping the highest-EV trial that satisfies the constraints.
pub struct RandomSearch<R: Rng = StdRng> {
    rng: R,
    trials_per_slot: usize,
}

impl RandomSearch<StdRng> {
    pub fn seeded(seed: u64, trials_per_slot: usize) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), trials_per_slot)
    }

    pub fn from_entropy(trials_per_slot: usize) -> Self {
        Self::with_rng(StdRng::from_entropy(), trials_per_slot)
    }
}

impl<R: Rng> RandomSearch<R> {
    pub fn with_rng(rng: R, trials_per_slot: usize) -> Self {
        Self {
            rng,
            trials_per_slot,
        }
    }
}

impl<R: Rng> ParlayStrategy for RandomSearch<R> {
    fn name(&self) -> &'static str {
        "random"
    }

    fn search(
        &mut self,
        pool: &[ParlayLeg],
        constraints: &ParlayConstraints,
        evaluator: &ParlayEvaluator<'_>,
    ) -> Vec<OptimizedParlay> {
        let upper = constraints.max_legs.min(pool.len());
        if upper < constraints.min_legs {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..pool.len()).collect();
        let mut used: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for slot in 0..constraints.max_parlays {
            let mut best: Option<OptimizedParlay> = None;
            for _ in 0..self.trials_per_slot {
                let count = self.rng.gen_range(constraints.min_legs..=upper);
                order.shuffle(&mut self.rng);
                let legs: Vec<ParlayLeg> = order[..count].iter().map(|&i| pool[i].clone()).collect();
                if used.contains(&ParlayEvaluator::dedup_key(&legs)) {
                    continue;
                }
                let Some(candidate) = evaluator.evaluate(legs, constraints) else {
                    continue;
                };
                if best
                    .as_ref()
                    .map_or(true, |b| candidate.expected_value > b.expected_value)
                {
                    best = Some(candidate);
                }
            }
            match best {
                Some(parlay) => {
                    used.insert(parlay.key.clone());
                    out.push(parlay);
                }
                None => tracing::debug!(slot, "no parlay satisfied constraints"),
            }
        }
        out
    }
}

/// Deterministic alternative: score every subset of the allowed sizes (up to
/// a budget) and keep the top-EV parlays.
pub struct SubsetEnumeration {
    budget: usize,
}

impl SubsetEnumeration {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }
}

/// Advance `idx` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(idx: &mut [usize], n: usize) -> bool {
    let k = idx.len();
    for i in (0..k).rev() {
        if idx[i] < n - k + i {
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

impl ParlayStrategy for SubsetEnumeration {
    fn name(&self) -> &'static str {
        "enumeration"
    }

    fn search(
        &mut self,
        pool: &[ParlayLeg],
        constraints: &ParlayConstraints,
        evaluator: &ParlayEvaluator<'_>,
    ) -> Vec<OptimizedParlay> {
        let n = pool.len();
        let upper = constraints.max_legs.min(n);
        let mut scored = 0usize;
        let mut accepted = Vec::new();

        'sizes: for size in constraints.min_legs..=upper {
            let mut idx: Vec<usize> = (0..size).collect();
            loop {
                if scored >= self.budget {
                    tracing::debug!(budget = self.budget, "subset enumeration budget exhausted");
                    break 'sizes;
                }
                scored += 1;
                let legs: Vec<ParlayLeg> = idx.iter().map(|&i| pool[i].clone()).collect();
                if let Some(parlay) = evaluator.evaluate(legs, constraints) {
                    accepted.push(parlay);
                }
                if !next_combination(&mut idx, n) {
                    break;
                }
            }
        }

        sort_by_ev(&mut accepted);
        let mut used = HashSet::new();
        accepted
            .into_iter()
            .filter(|p| used.insert(p.key.clone()))
            .take(constraints.max_parlays)
            .collect()
    }
}

fn sort_by_ev(parlays: &mut [OptimizedParlay]) {
    parlays.sort_by(|a, b| {
        b.expected_value
            .total_cmp(&a.expected_value)
            .then_with(|| a.key.cmp(&b.key))
    });
}

fn validate(pool: &[ParlayLeg], constraints: &ParlayConstraints) -> EngineResult<()> {
    if constraints.min_legs == 0 || constraints.min_legs > constraints.max_legs {
        return Err(EngineError::InvalidConstraints(format!(
            "leg range {}..={} is empty",
            constraints.min_legs, constraints.max_legs
        )));
    }
    if !constraints.min_ev.is_finite() || !constraints.max_correlation.is_finite() {
        return Err(EngineError::InvalidConstraints(
            "min_ev and max_correlation must be finite".to_string(),
        ));
    }
    for leg in pool {
        implied_probability(leg.odds)?;
        check_probability(leg.probability)?;
    }
    if pool.len() < constraints.min_legs {
        return Err(EngineError::InsufficientLegs {
            available: pool.len(),
            required: constraints.min_legs,
        });
    }
    Ok(())
}

/// Run one optimization over `pool`. Returns parlays sorted by EV, highest
/// first; fewer than `max_parlays` is a normal partial result.
pub fn optimize<S: ParlayStrategy + ?Sized>(
    strategy: &mut S,
    pool: &[ParlayLeg],
    constraints: &ParlayConstraints,
    config: &ParlayConfig,
) -> EngineResult<Vec<OptimizedParlay>> {
    validate(pool, constraints)?;
    let evaluator = ParlayEvaluator::new(config);
    let mut parlays = strategy.search(pool, constraints, &evaluator);
    sort_by_ev(&mut parlays);
    tracing::debug!(
        strategy = strategy.name(),
        pool = pool.len(),
        requested = constraints.max_parlays,
        produced = parlays.len(),
        "parlay optimization finished"
    );
    Ok(parlays)
}

/// Optimize each sport's legs independently and in parallel with the
/// configured search. Sport `i` (in sorted order) is searched with seed
/// `seed + i`, so results are reproducible. Sports with fewer legs than
/// `min_legs` are skipped.
pub async fn optimize_per_sport(
    pool: Vec<ParlayLeg>,
    constraints: ParlayConstraints,
    config: ParlayConfig,
    seed: u64,
) -> anyhow::Result<BTreeMap<String, Vec<OptimizedParlay>>> {
    let mut by_sport: BTreeMap<String, Vec<ParlayLeg>> = BTreeMap::new();
    for leg in pool {
        by_sport.entry(leg.sport.clone()).or_default().push(leg);
    }

    let mut handles = Vec::new();
    for (i, (sport, legs)) in by_sport.into_iter().enumerate() {
        if legs.len() < constraints.min_legs {
            tracing::debug!(sport = %sport, legs = legs.len(), "skipping sport with too few legs");
            continue;
        }
        let constraints = constraints.clone();
        let config = config.clone();
        let sport_seed = seed.wrapping_add(i as u64);
        handles.push(tokio::task::spawn_blocking(move || {
            let mut search: Box<dyn ParlayStrategy> = match config.search {
                ParlaySearch::Random => {
                    Box::new(RandomSearch::seeded(sport_seed, config.trials_per_slot))
                }
                ParlaySearch::Enumeration => {
                    Box::new(SubsetEnumeration::new(config.enumeration_budget))
                }
            };
            let result = optimize(search.as_mut(), &legs, &constraints, &config);
            (sport, result)
        }));
    }

    let mut out = BTreeMap::new();
    for handle in handles {
        let (sport, result) = handle.await?;
        out.insert(sport, result?);
    }
    Ok(out)
}
