//! Ordered scoring strategies for a single pillar.
//!
//! Each strategy either scores the features or reports why it could not.
//! The chain is tried in order and the first `Scored` outcome wins:
//! trained regression, then weighted average, then the neutral default.

use super::normalization::FeatureSpec;
use super::regression::RidgeRegression;
use crate::core::ModelUsed;
use crate::features::FeatureMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Scored {
        score: f64,
        confidence: f64,
        features_used: Vec<String>,
    },
    Unavailable(String),
}

/// Result of running the strategy chain for one pillar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub confidence: f64,
    pub features_used: Vec<String>,
    pub model_used: ModelUsed,
    /// Weighted-average score computed alongside a trained prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_check: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub enum Strategy<'a> {
    Trained {
        regression: &'a RidgeRegression,
        min_features: usize,
    },
    WeightedAverage,
    NeutralDefault {
        score: f64,
    },
}

impl Strategy<'_> {
    pub fn model_used(&self) -> ModelUsed {
        match self {
            Self::Trained { .. } => ModelUsed::Trained,
            Self::WeightedAverage => ModelUsed::WeightedAverage,
            Self::NeutralDefault { .. } => ModelUsed::Default,
        }
    }

    pub fn evaluate(&self, specs: &[FeatureSpec], features: &FeatureMap) -> StrategyOutcome {
        match self {
            Self::Trained {
                regression,
                min_features,
            } => trained(regression, *min_features, specs, features),
            Self::WeightedAverage => weighted_average(specs, features),
            Self::NeutralDefault { score } => StrategyOutcome::Scored {
                score: *score,
                confidence: 0.0,
                features_used: Vec::new(),
            },
        }
    }
}

/// Try each strategy in order; `None` only if every strategy was unavailable
pub fn run_chain(
    chain: &[Strategy<'_>],
    specs: &[FeatureSpec],
    features: &FeatureMap,
) -> Option<Prediction> {
    for strategy in chain {
        match strategy.evaluate(specs, features) {
            StrategyOutcome::Scored {
                score,
                confidence,
                features_used,
            } => {
                return Some(Prediction {
                    score,
                    confidence,
                    features_used,
                    model_used: strategy.model_used(),
                    cross_check: None,
                })
            }
            StrategyOutcome::Unavailable(reason) => {
                tracing::debug!("{} strategy unavailable: {}", strategy.model_used(), reason);
            }
        }
    }
    None
}

fn available<'s>(specs: &'s [FeatureSpec], features: &FeatureMap) -> Vec<(&'s FeatureSpec, f64)> {
    specs
        .iter()
        .filter_map(|spec| features.get(spec.name).map(|raw| (spec, raw)))
        .collect()
}

/// Weighted mean over present features only; absent ones leave both sums
pub fn weighted_average(specs: &[FeatureSpec], features: &FeatureMap) -> StrategyOutcome {
    let present = available(specs, features);
    let present_weight: f64 = present.iter().map(|(s, _)| s.weight).sum();
    if present.is_empty() || present_weight <= 0.0 {
        return StrategyOutcome::Unavailable("no features available".to_string());
    }

    let total_weight: f64 = specs.iter().map(|s| s.weight).sum();
    let weighted: f64 = present
        .iter()
        .map(|(spec, raw)| spec.normalize(*raw) * spec.weight)
        .sum();

    StrategyOutcome::Scored {
        score: (weighted / present_weight).clamp(0.0, 100.0),
        confidence: (present_weight / total_weight * 100.0).clamp(0.0, 100.0),
        features_used: present.iter().map(|(s, _)| s.name.to_string()).collect(),
    }
}

fn trained(
    regression: &RidgeRegression,
    min_features: usize,
    specs: &[FeatureSpec],
    features: &FeatureMap,
) -> StrategyOutcome {
    if regression.width() != specs.len() {
        return StrategyOutcome::Unavailable(format!(
            "regression expects {} features, model defines {}",
            regression.width(),
            specs.len()
        ));
    }

    let present = available(specs, features);
    if present.len() < min_features.max(1) {
        return StrategyOutcome::Unavailable(format!(
            "{} of {} features available, {} required",
            present.len(),
            specs.len(),
            min_features
        ));
    }

    let row: Vec<Option<f64>> = specs
        .iter()
        .map(|spec| features.get(spec.name).map(|raw| spec.normalize(raw)))
        .collect();

    StrategyOutcome::Scored {
        score: regression.predict(&row),
        confidence: present.len() as f64 / specs.len() as f64 * 100.0,
        features_used: present.iter().map(|(s, _)| s.name.to_string()).collect(),
    }
}
