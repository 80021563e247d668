//! Confidence-weighted ESG scoring.
//!
//! The crate covers three stages of one pipeline:
//! - data quality validation and cross-provider reconciliation (`quality`)
//! - pillar scoring models and the composite engine (`models`, `scoring`)
//! - Fund → Company → Project propagation with peer estimation (`propagation`)
//!
//! Storage is abstracted behind [`store::DocumentStore`]; [`pipeline::Pipeline`]
//! wires everything together for a caller-supplied store and configuration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod errors;
pub mod features;
pub mod io;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod propagation;
pub mod quality;
pub mod scoring;
pub mod store;

// Re-export commonly used types
pub use crate::core::{
    CompositeScore, Entity, EntityKind, LegacyEsgScores, MetricCategory, MetricObservation,
    ModelUsed, Momentum, Pillar, PillarScore, ScoreResult,
};

pub use crate::config::{EsgConfig, PropagationConfig, QualityConfig, ScoringConfig};

pub use crate::errors::{Error, Result};

pub use crate::features::{FeatureExtractor, FeatureMap};

pub use crate::io::output::{create_writer, OutputFormat, OutputWriter};

pub use crate::models::{ComponentModel, ModelRegistry, TrainingResult};

pub use crate::pipeline::{EntityReport, Pipeline};

pub use crate::propagation::{
    CancellationToken, EntityState, FailureKind, MetricsPropagator, PropagationSummary,
};

pub use crate::quality::{
    DataQualityValidator, QualityReport, ReconciliationOutcome, ReconciliationReport, Reconciler,
};

pub use crate::scoring::{ScoreHistory, ScoringEngine};

pub use crate::store::{DocumentStore, Filter, MemoryStore};
