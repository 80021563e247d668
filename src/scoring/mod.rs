//! Composite ESG scoring

pub mod composite;
pub mod engine;
pub mod momentum;

pub use composite::{composite, composite_from, confidence_interval, confidence_weighted_mean};
pub use engine::ScoringEngine;
pub use momentum::{momentum, slope, ScoreHistory, ScorePoint};
