use serde::{Deserialize, Serialize};

use super::propagation::PropagationConfig;
use super::quality::{QualityConfig, ReconciliationConfig};
use super::scoring::ScoringConfig;

/// Root configuration structure for esgmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EsgConfig {
    /// Data quality dimension weights, thresholds and freshness window
    #[serde(default)]
    pub quality: QualityConfig,

    /// Cross-provider reconciliation limits
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Component model and composite scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Hierarchy propagation settings
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl EsgConfig {
    /// Check every section, returning all problems found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.quality.weights.validate() {
            errors.push(e);
        }
        if let Err(e) = self.scoring.validate() {
            errors.push(e);
        }
        if self.reconciliation.range_threshold < 0.0 || self.reconciliation.cov_threshold < 0.0 {
            errors.push("reconciliation thresholds must be non-negative".to_string());
        }
        if self.quality.freshness_days < 0 || self.quality.decay_days <= 0 {
            errors.push("freshness_days must be >= 0 and decay_days > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
