use serde::{Deserialize, Serialize};

/// Component model and composite scoring settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score substituted when a pillar model fails (0-100)
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,

    /// Confidence attached to the neutral substitute (0-100)
    #[serde(default = "default_neutral_confidence")]
    pub neutral_confidence: f64,

    /// Confidence attached to pre-computed upstream scores (0-100)
    #[serde(default = "default_legacy_confidence")]
    pub legacy_confidence: f64,

    /// Trailing periods considered for momentum
    #[serde(default = "default_momentum_window")]
    pub momentum_window: usize,

    /// Minimum distinct periods required before a trend is fitted
    #[serde(default = "default_min_momentum_points")]
    pub min_momentum_points: usize,

    /// Confidence interval half-width at zero confidence
    #[serde(default = "default_max_margin")]
    pub max_margin: f64,

    /// Below this many available features the trained path is skipped
    #[serde(default = "default_min_trained_features")]
    pub min_trained_features: usize,

    /// Trained vs weighted-average gap that triggers a warning
    #[serde(default = "default_cross_check_tolerance")]
    pub cross_check_tolerance: f64,

    /// Ridge penalty used when fitting pillar regressions
    #[serde(default = "default_ridge_lambda")]
    pub ridge_lambda: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            neutral_score: default_neutral_score(),
            neutral_confidence: default_neutral_confidence(),
            legacy_confidence: default_legacy_confidence(),
            momentum_window: default_momentum_window(),
            min_momentum_points: default_min_momentum_points(),
            max_margin: default_max_margin(),
            min_trained_features: default_min_trained_features(),
            cross_check_tolerance: default_cross_check_tolerance(),
            ridge_lambda: default_ridge_lambda(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.neutral_score) {
            return Err("neutral_score must be between 0 and 100".to_string());
        }
        if !(0.0..=100.0).contains(&self.neutral_confidence)
            || !(0.0..=100.0).contains(&self.legacy_confidence)
        {
            return Err("confidences must be between 0 and 100".to_string());
        }
        if self.min_momentum_points < 2 {
            return Err("min_momentum_points must be at least 2".to_string());
        }
        if self.momentum_window < self.min_momentum_points {
            return Err("momentum_window must be >= min_momentum_points".to_string());
        }
        if self.max_margin < 0.0 || self.ridge_lambda < 0.0 {
            return Err("max_margin and ridge_lambda must be non-negative".to_string());
        }
        Ok(())
    }
}

fn default_neutral_score() -> f64 {
    50.0
}
fn default_neutral_confidence() -> f64 {
    50.0
}
fn default_legacy_confidence() -> f64 {
    40.0
}
fn default_momentum_window() -> usize {
    6
}
fn default_min_momentum_points() -> usize {
    3
}
fn default_max_margin() -> f64 {
    10.0
}
fn default_min_trained_features() -> usize {
    3
}
fn default_cross_check_tolerance() -> f64 {
    20.0
}
fn default_ridge_lambda() -> f64 {
    1e-3
}
