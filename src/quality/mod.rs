//! Data quality validation and cross-provider reconciliation

pub mod reconciliation;
pub mod report;
pub mod validator;

pub use reconciliation::{
    Discrepancy, ProviderScores, ReconciliationOutcome, ReconciliationReport, Reconciler,
    ReliabilityLevel, ScoreType, VariationStats,
};
pub use report::{
    DimensionScores, IssueSeverity, QualityDimension, QualityIssue, QualityLevel, QualityReport,
};
pub use validator::{parse_timestamp, DataQualityValidator, REQUIRED_FIELDS, SUB_SCORE_FIELDS};
