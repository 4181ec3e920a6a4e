//! Betting value engine: EV and Kelly sizing, line movement tracking,
//! sharp/public divergence, parlay optimization and composite scoring.
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod pipeline;

pub use error::{EngineError, EngineResult};
