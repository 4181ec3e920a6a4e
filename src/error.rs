use thiserror::Error;

use crate::feed::types::Market;

/// Errors raised by the engine's computations.
///
/// Every variant is scoped to a single analysis or optimization call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid odds: {0}")]
    InvalidOdds(f64),

    #[error("invalid probability: {0} (must be strictly between 0 and 1)")]
    InvalidProbability(f64),

    #[error("insufficient legs: pool has {available}, need at least {required}")]
    InsufficientLegs { available: usize, required: usize },

    #[error("no {market} thresholds configured for sport '{sport}'")]
    Configuration { sport: String, market: Market },

    #[error("invalid parlay constraints: {0}")]
    InvalidConstraints(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Reject probabilities outside the open interval (0, 1).
pub fn check_probability(p: f64) -> EngineResult<f64> {
    if p.is_finite() && p > 0.0 && p < 1.0 {
        Ok(p)
    } else {
        Err(EngineError::InvalidProbability(p))
    }
}
