pub mod composite;
pub mod ev;
pub mod history;
pub mod kelly;
pub mod line_movement;
pub mod odds;
pub mod parlay;
pub mod sharp;

pub use composite::{rank_recommendations, CompositeAssessment, CompositeScorer, Recommendation};
pub use ev::EvAnalysis;
pub use history::{InMemoryLineStore, LineHistoryStore, LineKey, LineSnapshot};
pub use line_movement::{LineTracker, LineUpdate};
pub use parlay::{optimize, OptimizedParlay, ParlayConstraints, ParlayLeg};
pub use sharp::{SharpAnalyzer, SharpSignal};
