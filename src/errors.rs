//! Shared error types for the scoring pipeline.
//!
//! Most degraded outcomes (missing features, untrained models, low data
//! quality, a single provider) are reported as data on the returned report
//! objects. The variants here cover the cases where an operation could not
//! produce an answer at all.

use thiserror::Error;

/// Main error type for esgmap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Document store failures
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dangling or cyclic parent/child reference
    #[error("Hierarchy integrity error at {entity_id}: {message}")]
    HierarchyIntegrity { entity_id: String, message: String },

    /// No same-kind, same-sector peers were available for imputation
    #[error("No sector peers available to estimate {entity_id}")]
    PeerEstimationImpossible { entity_id: String },

    /// A bounded lookup did not finish in time
    #[error("Timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    /// Model artifact could not be decoded or encoded
    #[error("Model artifact error: {0}")]
    ModelArtifact(String),

    /// A component model failed while predicting
    #[error("Model error: {0}")]
    Model(String),

    /// Input document did not match the expected shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic errors with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a hierarchy integrity error for an entity
    pub fn hierarchy(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HierarchyIntegrity {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error for a named operation
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: self.to_string(),
        }
    }

    /// Timeouts degrade the affected step instead of failing the run
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_wraps_message() {
        let err = Error::Store("connection reset".to_string()).with_context("loading entities");
        assert_eq!(
            err.to_string(),
            "loading entities: Store error: connection reset"
        );
    }

    #[test]
    fn test_timeout_classification() {
        assert!(Error::timeout("peer lookup", 250).is_timeout());
        assert!(!Error::Model("boom".into()).is_timeout());
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(Error::InvalidInput("bad".into()));
        let err = result.context("parsing bundle").unwrap_err();
        assert!(err.to_string().starts_with("parsing bundle"));
    }
}
