use crate::config::Config;
use crate::engine::composite::{
    rank_recommendations, CompositeAssessment, CompositeInputs, CompositeScorer, Recommendation,
};
use crate::engine::ev::{self, EvAnalysis};
use crate::engine::history::LineKey;
use crate::engine::line_movement::{
    ClosingLineProjection, EntryAdvice, KeyMoment, LineMovementEvent, LineTracker, LineUpdate,
    ReverseLineMovement, SteamMove,
};
use crate::engine::parlay::ParlayLeg;
use crate::engine::sharp::{SharpAnalyzer, SharpSignal};
use crate::feed::types::{
    EventContext, FeedBatch, Market, ProbabilityEstimate, PublicBettingSplit, Side,
};
use crate::feed::QuoteFeed;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Entry timing advice for one tracked line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryTiming {
    pub key: LineKey,
    pub advice: EntryAdvice,
}

/// Everything one feed batch produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub analyses: Vec<EvAnalysis>,
    pub movements: Vec<LineMovementEvent>,
    pub key_moments: Vec<KeyMoment>,
    pub steam_moves: Vec<SteamMove>,
    pub reverse_line_movements: Vec<ReverseLineMovement>,
    pub projections: Vec<ClosingLineProjection>,
    pub entries: Vec<EntryTiming>,
    pub sharp_signals: Vec<SharpSignal>,
    pub assessments: Vec<CompositeAssessment>,
    /// Inputs dropped because they failed validation.
    pub rejected: usize,
}

impl BatchReport {
    fn absorb(&mut self, update: LineUpdate) {
        self.movements.extend(update.movement);
        self.key_moments.extend(update.key_moments);
        self.steam_moves.extend(update.steam_move);
        self.reverse_line_movements
            .extend(update.reverse_line_movement);
    }

    /// All recommendations in this batch, highest confidence first.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        rank_recommendations(&self.assessments)
    }
}

/// Recommendations from every report ranked together, highest confidence
/// first.
pub fn ranked_recommendations(reports: &[BatchReport]) -> Vec<Recommendation> {
    let assessments: Vec<CompositeAssessment> = reports
        .iter()
        .flat_map(|r| r.assessments.iter().cloned())
        .collect();
    rank_recommendations(&assessments)
}

/// Latest positive-EV analysis per (event, market, side), as parlay legs.
pub fn parlay_pool<'a>(analyses: impl IntoIterator<Item = &'a EvAnalysis>) -> Vec<ParlayLeg> {
    let mut latest: HashMap<(&str, Market, Side), &EvAnalysis> = HashMap::new();
    let mut order = Vec::new();
    for a in analyses {
        let key = (a.event_id.as_str(), a.market, a.side);
        if latest.insert(key, a).is_none() {
            order.push(key);
        }
    }
    order
        .into_iter()
        .filter_map(|key| latest.get(&key).copied())
        .filter(|a| a.is_positive())
        .map(|a| ParlayLeg {
            event_id: a.event_id.clone(),
            sport: a.sport.clone(),
            market: a.market,
            side: a.side,
            odds: a.american_odds,
            probability: a.true_probability,
        })
        .collect()
}

fn for_event<T: Clone>(items: &[T], event: &str, id: impl Fn(&T) -> &str) -> Vec<T> {
    items.iter().filter(|i| id(i) == event).cloned().collect()
}

/// Drives feed batches through the tracker, EV calculator, sharp analyzer
/// and composite scorer.
pub struct EnginePipeline {
    config: Config,
    tracker: LineTracker,
    sharp: SharpAnalyzer,
    scorer: CompositeScorer,
    /// Latest context per event; batches only carry changes.
    contexts: HashMap<String, EventContext>,
}

impl EnginePipeline {
    pub fn new(config: Config) -> Self {
        let tracker = LineTracker::new(
            config.sports.clone(),
            config.line_movement.clone(),
            config.entry.clone(),
        );
        let sharp = SharpAnalyzer::new(config.sharp.clone(), config.line_movement.clone());
        let scorer = CompositeScorer::new(config.composite.clone());
        Self {
            config,
            tracker,
            sharp,
            scorer,
            contexts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &LineTracker {
        &self.tracker
    }

    /// Process one batch. Invalid quotes and estimates are logged and
    /// counted in `rejected`; they never abort the batch.
    pub fn process(&mut self, batch: &FeedBatch) -> BatchReport {
        for (event, context) in &batch.contexts {
            self.contexts.insert(event.clone(), context.clone());
        }

        let estimates: HashMap<(&str, Market, Side), &ProbabilityEstimate> = batch
            .estimates
            .iter()
            .map(|e| ((e.event_id.as_str(), e.market, e.side), e))
            .collect();
        let splits: HashMap<(&str, Market), &PublicBettingSplit> = batch
            .splits
            .iter()
            .map(|s| ((s.event_id.as_str(), s.market), s))
            .collect();

        let mut report = BatchReport::default();
        let mut events: BTreeSet<String> = batch.contexts.keys().cloned().collect();

        for quote in &batch.quotes {
            events.insert(quote.event_id.clone());
            let split = splits.get(&(quote.event_id.as_str(), quote.market)).copied();

            // An untrackable line still gets priced below.
            let tracked = match self.tracker.record_quote(quote, split) {
                Ok(update) => {
                    if let Some(update) = update {
                        report.absorb(update);
                    }
                    true
                }
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(
                        event = %quote.event_id,
                        sport = %quote.sport,
                        market = %quote.market,
                        error = %e,
                        "quote rejected by line tracker"
                    );
                    false
                }
            };

            if let Some(commence) = quote.commence_time.filter(|_| tracked) {
                let key = LineKey::new(quote.event_id.clone(), quote.market, quote.side);
                if let Some(projection) =
                    self.tracker
                        .project_closing_line(&key, quote.timestamp, commence)
                {
                    if let Some(advice) = self.tracker.best_entry(&key, &projection) {
                        report.entries.push(EntryTiming {
                            key: key.clone(),
                            advice,
                        });
                    }
                    report.projections.push(projection);
                }
            }

            let Some(estimate) = estimates.get(&(quote.event_id.as_str(), quote.market, quote.side))
            else {
                continue;
            };
            match ev::analyze(quote, estimate, &self.config.ev) {
                Ok(analysis) => report.analyses.push(analysis),
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(
                        event = %quote.event_id,
                        side = %quote.side,
                        error = %e,
                        "ev analysis skipped"
                    );
                }
            }
        }

        for split in &batch.splits {
            events.insert(split.event_id.clone());
            let same_market = |m: &&LineMovementEvent| {
                m.key.event_id == split.event_id && m.key.market == split.market
            };
            let movement = report
                .movements
                .iter()
                .rev()
                .filter(same_market)
                .find(|m| m.key.side == split.side)
                .or_else(|| report.movements.iter().rev().find(same_market));
            let signal = self
                .sharp
                .analyze(&split.event_id, split.market, Some(split), movement);
            report.sharp_signals.push(signal);
        }

        let no_context = EventContext::default();
        for event in &events {
            let signals = for_event(&report.sharp_signals, event, |s| s.event_id.as_str());
            let movements = for_event(&report.movements, event, |m| m.key.event_id.as_str());
            let projections = for_event(&report.projections, event, |p| p.key.event_id.as_str());
            let analyses = for_event(&report.analyses, event, |a| a.event_id.as_str());
            let assessment = self.scorer.assess(&CompositeInputs {
                event_id: event,
                sharp_signals: &signals,
                movements: &movements,
                projections: &projections,
                ev: &analyses,
                context: self.contexts.get(event).unwrap_or(&no_context),
            });
            report.assessments.push(assessment);
        }

        if let Some(latest) = batch.quotes.iter().map(|q| q.timestamp).max() {
            self.tracker.prune_expired(latest);
        }

        report
    }

    /// Drain `feed`, processing each batch in arrival order.
    pub async fn run<F: QuoteFeed + ?Sized>(&mut self, feed: &mut F) -> Result<Vec<BatchReport>> {
        let mut reports = Vec::new();
        while let Some(batch) = feed.next_batch().await.context("feed failed")? {
            let report = self.process(&batch);
            tracing::debug!(
                batch = reports.len(),
                analyses = report.analyses.len(),
                movements = report.movements.len(),
                signals = report.sharp_signals.len(),
                rejected = report.rejected,
                "batch processed"
            );
            reports.push(report);
        }
        Ok(reports)
    }
}
