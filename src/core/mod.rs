pub mod entity;
pub mod observation;
pub mod score;
pub mod score_types;

pub use entity::{Entity, EntityKind};
pub use observation::{MetricCategory, MetricObservation, PEER_ESTIMATE_PROVIDER};
pub use score::{
    CompositeScore, LegacyEsgScores, ModelUsed, Momentum, Pillar, PillarScore, ScoreResult,
};
pub use score_types::{Score0To1, Score0To100};

/// Collection holding entity documents
pub const ENTITIES: &str = "entities";
/// Collection holding metric observations
pub const OBSERVATIONS: &str = "observations";
/// Collection holding the latest `ScoreResult` per entity
pub const SCORES: &str = "scores";
/// Collection holding propagated aggregates per entity
pub const AGGREGATES: &str = "aggregates";
/// Collection holding raw provider bundles used for quality checks
pub const PROVIDER_DATA: &str = "provider_data";
/// Collection holding trained model artifacts
pub const MODELS: &str = "models";
/// Collection holding one pillar-score point per scoring run
pub const SCORE_HISTORY: &str = "score_history";
