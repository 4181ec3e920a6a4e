//! Sharp vs. public divergence from ticket and handle percentages.

use serde::Serialize;

use super::line_movement::{detect_reverse_line_movement, LineMovementEvent, Significance};
use crate::config::{LineMovementConfig, SharpConfig};
use crate::feed::types::{Market, PublicBettingSplit, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    FollowSharp,
    FadePublic,
    NoSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharpSignal {
    pub event_id: String,
    pub market: Market,
    pub sharp_side: Option<Side>,
    pub public_side: Option<Side>,
    pub discrepancy: f64,
    pub confidence: ConfidenceTier,
    pub liability: LiabilityRisk,
    pub reverse_line_movement: bool,
    pub steam_move: bool,
    pub action: SignalAction,
    /// Side the action points at, if any.
    pub target_side: Option<Side>,
}

impl SharpSignal {
    fn no_signal(event_id: &str, market: Market, steam_move: bool) -> Self {
        Self {
            event_id: event_id.to_string(),
            market,
            sharp_side: None,
            public_side: None,
            discrepancy: 0.0,
            confidence: ConfidenceTier::Low,
            liability: LiabilityRisk::Low,
            reverse_line_movement: false,
            steam_move,
            action: SignalAction::NoSignal,
            target_side: None,
        }
    }
}

/// Classifies betting splits; caller-owned, holds only thresholds.
#[derive(Debug, Clone, Default)]
pub struct SharpAnalyzer {
    config: SharpConfig,
    movement: LineMovementConfig,
}

impl SharpAnalyzer {
    pub fn new(config: SharpConfig, movement: LineMovementConfig) -> Self {
        Self { config, movement }
    }

    /// Classify one binary market. Absent or malformed split data degrades
    /// to `NoSignal` rather than failing.
    pub fn analyze(
        &self,
        event_id: &str,
        market: Market,
        split: Option<&PublicBettingSplit>,
        movement: Option<&LineMovementEvent>,
    ) -> SharpSignal {
        let steam_move = movement.is_some_and(|m| m.significance == Significance::Steam);

        let Some(split) = split else {
            return SharpSignal::no_signal(event_id, market, steam_move);
        };
        let valid = |x: f64| x.is_finite() && (0.0..=1.0).contains(&x);
        if !valid(split.bet_pct) || !valid(split.money_pct) {
            tracing::warn!(
                event = event_id,
                bet_pct = split.bet_pct,
                money_pct = split.money_pct,
                "malformed betting split, no signal"
            );
            return SharpSignal::no_signal(event_id, market, steam_move);
        }

        let side = split.side;
        let other = side.opposite();
        let bet = split.bet_pct;
        let money = split.money_pct;
        let discrepancy = (money - bet).abs();
        let heavy = self.config.public_heavy_pct;

        let mut sharp_side = if bet > heavy && money < 0.5 {
            Some(other)
        } else if bet < 1.0 - heavy && money > 0.5 {
            Some(side)
        } else if discrepancy > self.config.discrepancy_threshold {
            Some(if money > bet { side } else { other })
        } else {
            None
        };

        let public_side = if bet > 0.5 {
            Some(side)
        } else if bet < 0.5 {
            Some(other)
        } else {
            None
        };

        let lean = bet.max(1.0 - bet);
        let liability = if lean > self.config.liability_high_pct {
            LiabilityRisk::High
        } else if lean > self.config.liability_medium_pct {
            LiabilityRisk::Medium
        } else {
            LiabilityRisk::Low
        };

        let toward = movement
            .map(|m| m.money_toward)
            .filter(|t| *t == side || *t == other);
        let rlm = toward.and_then(|t| detect_reverse_line_movement(side, bet, t, &self.movement));
        if sharp_side.is_none() {
            sharp_side = rlm.as_ref().map(|r| r.sharp_side);
        }

        let mut points = 0u8;
        if discrepancy > self.config.high_confidence_discrepancy {
            points += 2;
        } else if discrepancy > self.config.discrepancy_threshold {
            points += 1;
        }
        if let Some(sharp) = sharp_side {
            if rlm.as_ref().is_some_and(|r| r.sharp_side == sharp) {
                points += 1;
            }
            if steam_move && toward == Some(sharp) {
                points += 1;
            }
        }
        let confidence = match points {
            0 => ConfidenceTier::Low,
            1 => ConfidenceTier::Medium,
            _ => ConfidenceTier::High,
        };

        let (action, target_side) = match sharp_side {
            Some(sharp) => (SignalAction::FollowSharp, Some(sharp)),
            None if liability == LiabilityRisk::High => {
                (SignalAction::FadePublic, public_side.map(Side::opposite))
            }
            None => (SignalAction::NoSignal, None),
        };

        SharpSignal {
            event_id: event_id.to_string(),
            market,
            sharp_side,
            public_side,
            discrepancy,
            confidence,
            liability,
            reverse_line_movement: rlm.is_some(),
            steam_move,
            action,
            target_side,
        }
    }
}
