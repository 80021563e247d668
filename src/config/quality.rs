use serde::{Deserialize, Serialize};

/// Weights of the five quality dimensions in the overall quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    #[serde(default = "default_completeness_weight")]
    pub completeness: f64,

    #[serde(default = "default_accuracy_weight")]
    pub accuracy: f64,

    #[serde(default = "default_consistency_weight")]
    pub consistency: f64,

    #[serde(default = "default_timeliness_weight")]
    pub timeliness: f64,

    #[serde(default = "default_validity_weight")]
    pub validity: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: default_completeness_weight(),
            accuracy: default_accuracy_weight(),
            consistency: default_consistency_weight(),
            timeliness: default_timeliness_weight(),
            validity: default_validity_weight(),
        }
    }
}

impl DimensionWeights {
    // Pure function: Check if a weight is in valid range
    pub fn is_valid_weight(weight: f64) -> bool {
        (0.0..=1.0).contains(&weight)
    }

    // Pure function: Validate a single weight with name
    pub fn validate_weight(weight: f64, name: &str) -> Result<(), String> {
        if Self::is_valid_weight(weight) {
            Ok(())
        } else {
            Err(format!("{} weight must be between 0.0 and 1.0", name))
        }
    }

    pub fn sum(&self) -> f64 {
        self.completeness + self.accuracy + self.consistency + self.timeliness + self.validity
    }

    /// Validate that weights are in range and sum to 1.0 (with small tolerance)
    pub fn validate(&self) -> Result<(), String> {
        for (weight, name) in [
            (self.completeness, "Completeness"),
            (self.accuracy, "Accuracy"),
            (self.consistency, "Consistency"),
            (self.timeliness, "Timeliness"),
            (self.validity, "Validity"),
        ] {
            Self::validate_weight(weight, name)?;
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > 0.001 {
            return Err(format!(
                "Quality dimension weights must sum to 1.0, but sum to {:.3}",
                sum
            ));
        }
        Ok(())
    }

    /// Normalize weights to ensure they sum to exactly 1.0
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.completeness /= sum;
            self.accuracy /= sum;
            self.consistency /= sum;
            self.timeliness /= sum;
            self.validity /= sum;
        }
    }
}

/// Minimum dimension scores (0-1) for a report to count as valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionThresholds {
    #[serde(default = "default_completeness_threshold")]
    pub completeness: f64,

    #[serde(default = "default_accuracy_threshold")]
    pub accuracy: f64,

    #[serde(default = "default_consistency_threshold")]
    pub consistency: f64,

    #[serde(default = "default_timeliness_threshold")]
    pub timeliness: f64,

    #[serde(default = "default_validity_threshold")]
    pub validity: f64,
}

impl Default for DimensionThresholds {
    fn default() -> Self {
        Self {
            completeness: default_completeness_threshold(),
            accuracy: default_accuracy_threshold(),
            consistency: default_consistency_threshold(),
            timeliness: default_timeliness_threshold(),
            validity: default_validity_threshold(),
        }
    }
}

/// Overall-score cut-offs (0-100) for the qualitative quality level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityLevelThresholds {
    #[serde(default = "default_excellent")]
    pub excellent: f64,
    #[serde(default = "default_good")]
    pub good: f64,
    #[serde(default = "default_acceptable")]
    pub acceptable: f64,
    #[serde(default = "default_poor")]
    pub poor: f64,
}

impl Default for QualityLevelThresholds {
    fn default() -> Self {
        Self {
            excellent: default_excellent(),
            good: default_good(),
            acceptable: default_acceptable(),
            poor: default_poor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub weights: DimensionWeights,

    #[serde(default)]
    pub thresholds: DimensionThresholds,

    #[serde(default)]
    pub levels: QualityLevelThresholds,

    /// Observations older than this many days lose timeliness
    #[serde(default = "default_freshness_days")]
    pub freshness_days: i64,

    /// Days past the freshness window over which the full penalty accrues
    #[serde(default = "default_decay_days")]
    pub decay_days: i64,

    /// Cap on the age penalty applied by each timeliness check
    #[serde(default = "default_max_timeliness_penalty")]
    pub max_timeliness_penalty: f64,

    /// Allowed gap between `combined` and the mean of the pillar scores
    #[serde(default = "default_combined_tolerance")]
    pub combined_tolerance: f64,

    /// Provider-reported confidence below this is penalized
    #[serde(default = "default_min_provider_confidence")]
    pub min_provider_confidence: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            thresholds: DimensionThresholds::default(),
            levels: QualityLevelThresholds::default(),
            freshness_days: default_freshness_days(),
            decay_days: default_decay_days(),
            max_timeliness_penalty: default_max_timeliness_penalty(),
            combined_tolerance: default_combined_tolerance(),
            min_provider_confidence: default_min_provider_confidence(),
        }
    }
}

/// Cross-provider disagreement limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Max-min spread in points above which a discrepancy is flagged
    #[serde(default = "default_range_threshold")]
    pub range_threshold: f64,

    /// Coefficient of variation above which a discrepancy is flagged
    #[serde(default = "default_cov_threshold")]
    pub cov_threshold: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            range_threshold: default_range_threshold(),
            cov_threshold: default_cov_threshold(),
        }
    }
}

pub fn default_completeness_weight() -> f64 {
    0.25
}
pub fn default_accuracy_weight() -> f64 {
    0.30
}
pub fn default_consistency_weight() -> f64 {
    0.20
}
pub fn default_timeliness_weight() -> f64 {
    0.15
}
pub fn default_validity_weight() -> f64 {
    0.10
}

fn default_completeness_threshold() -> f64 {
    0.8
}
fn default_accuracy_threshold() -> f64 {
    0.9
}
fn default_consistency_threshold() -> f64 {
    0.85
}
fn default_timeliness_threshold() -> f64 {
    0.9
}
fn default_validity_threshold() -> f64 {
    0.95
}

fn default_excellent() -> f64 {
    90.0
}
fn default_good() -> f64 {
    80.0
}
fn default_acceptable() -> f64 {
    70.0
}
fn default_poor() -> f64 {
    60.0
}

fn default_freshness_days() -> i64 {
    90
}
fn default_decay_days() -> i64 {
    365
}
fn default_max_timeliness_penalty() -> f64 {
    0.5
}
fn default_combined_tolerance() -> f64 {
    5.0
}
fn default_min_provider_confidence() -> f64 {
    70.0
}

fn default_range_threshold() -> f64 {
    30.0
}
fn default_cov_threshold() -> f64 {
    0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        let weights = DimensionWeights::default();
        assert!(weights.validate().is_ok());
        assert!((weights.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_sum() {
        let weights = DimensionWeights {
            completeness: 0.5,
            ..Default::default()
        };
        let err = weights.validate().unwrap_err();
        assert!(err.contains("sum to 1.0"));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let weights = DimensionWeights {
            accuracy: 1.5,
            ..Default::default()
        };
        assert!(weights.validate().unwrap_err().contains("Accuracy"));
    }

    #[test]
    fn test_normalize_rescales() {
        let mut weights = DimensionWeights {
            completeness: 1.0,
            accuracy: 1.0,
            consistency: 1.0,
            timeliness: 1.0,
            validity: 1.0,
        };
        weights.normalize();
        assert!((weights.completeness - 0.2).abs() < 1e-12);
        assert!(weights.validate().is_ok());
    }
}
