//! Cross-provider reconciliation of pillar scores.
//!
//! When two or more providers report scores for the same entity, each score
//! type is summarized with mean, sample standard deviation, range and
//! coefficient of variation. Reliability is `1 - mean(CoV)` across the score
//! types that more than one provider reported.

use super::validator::parse_timestamp;
use crate::config::ReconciliationConfig;
use crate::core::Pillar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    Environmental,
    Social,
    Governance,
    Combined,
}

impl ScoreType {
    pub const ALL: [ScoreType; 4] = [
        ScoreType::Environmental,
        ScoreType::Social,
        ScoreType::Governance,
        ScoreType::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environmental => "environmental",
            Self::Social => "social",
            Self::Governance => "governance",
            Self::Combined => "combined",
        }
    }

    pub fn pillar(&self) -> Option<Pillar> {
        match self {
            Self::Environmental => Some(Pillar::Environmental),
            Self::Social => Some(Pillar::Social),
            Self::Governance => Some(Pillar::Governance),
            Self::Combined => None,
        }
    }
}

impl std::fmt::Display for ScoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scores one provider reported for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderScores {
    pub provider: String,
    pub scores: BTreeMap<ScoreType, f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProviderScores {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            scores: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn with_score(mut self, score_type: ScoreType, value: f64) -> Self {
        if value.is_finite() {
            self.scores.insert(score_type, value);
        }
        self
    }

    /// Read the provider tag and numeric `esg_scores` entries of a bundle.
    ///
    /// Returns `None` when the bundle has no provider tag.
    pub fn from_bundle(bundle: &Value) -> Option<Self> {
        let provider = bundle
            .get("provider")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())?;

        let mut scores = Self::new(provider);
        scores.timestamp = bundle.get("timestamp").and_then(parse_timestamp);

        if let Some(esg) = bundle.get("esg_scores").and_then(Value::as_object) {
            for score_type in ScoreType::ALL {
                if let Some(v) = esg.get(score_type.as_str()).and_then(Value::as_f64) {
                    scores = scores.with_score(score_type, v);
                }
            }
        }
        Some(scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariationStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub coefficient_of_variation: f64,
    pub sample_count: usize,
}

impl VariationStats {
    /// Summary statistics; `None` for fewer than two values
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let coefficient_of_variation = if mean.abs() > EPSILON {
            std_dev / mean.abs()
        } else if std_dev > EPSILON {
            // Disagreement around a zero mean has no relative scale
            1.0
        } else {
            0.0
        };

        Some(Self {
            mean,
            std_dev,
            min,
            max,
            range: max - min,
            coefficient_of_variation,
            sample_count: values.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReliabilityLevel {
    Poor,
    Low,
    Moderate,
    Good,
    High,
}

impl ReliabilityLevel {
    pub fn from_score(reliability: f64) -> Self {
        match reliability {
            r if r >= 0.9 => Self::High,
            r if r >= 0.8 => Self::Good,
            r if r >= 0.7 => Self::Moderate,
            r if r >= 0.6 => Self::Low,
            _ => Self::Poor,
        }
    }
}

impl std::fmt::Display for ReliabilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub score_type: ScoreType,
    pub range: f64,
    pub coefficient_of_variation: f64,
    /// Reported value per provider
    pub values: BTreeMap<String, f64>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub entity_id: Option<String>,
    pub providers: Vec<String>,
    pub per_score_variation: BTreeMap<ScoreType, VariationStats>,
    pub consensus_scores: BTreeMap<ScoreType, f64>,
    pub reliability_score: f64,
    pub reliability_level: ReliabilityLevel,
    pub discrepancies: Vec<Discrepancy>,
    pub cross_validation_possible: bool,
}

impl ReconciliationReport {
    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }
}

/// Result of a reconciliation attempt.
///
/// Serializes as either the full report or
/// `{"cross_validation_possible": false, "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReconciliationOutcome {
    Reconciled(ReconciliationReport),
    Impossible {
        cross_validation_possible: bool,
        reason: String,
    },
}

impl ReconciliationOutcome {
    pub fn impossible(reason: impl Into<String>) -> Self {
        Self::Impossible {
            cross_validation_possible: false,
            reason: reason.into(),
        }
    }

    pub fn report(&self) -> Option<&ReconciliationReport> {
        match self {
            Self::Reconciled(report) => Some(report),
            Self::Impossible { .. } => None,
        }
    }

    pub fn is_possible(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconciliationConfig,
}

impl Reconciler {
    pub fn new(config: ReconciliationConfig) -> Self {
        Self { config }
    }

    /// Reconcile raw provider bundles for a single entity
    pub fn reconcile(&self, bundles: &[Value]) -> ReconciliationOutcome {
        let entity_id = bundles
            .iter()
            .find_map(|b| b.get("entity_id").and_then(Value::as_str))
            .map(str::to_string);

        let sources: Vec<ProviderScores> = bundles
            .iter()
            .filter_map(|b| {
                let parsed = ProviderScores::from_bundle(b);
                if parsed.is_none() {
                    tracing::debug!("Ignoring provider bundle without a provider tag");
                }
                parsed
            })
            .collect();

        self.reconcile_scores(entity_id, sources)
    }

    pub fn reconcile_scores(
        &self,
        entity_id: Option<String>,
        sources: Vec<ProviderScores>,
    ) -> ReconciliationOutcome {
        let sources = latest_per_provider(sources);
        if sources.len() < 2 {
            return ReconciliationOutcome::impossible(format!(
                "{} provider source(s); at least 2 required",
                sources.len()
            ));
        }

        let mut per_score_variation = BTreeMap::new();
        let mut discrepancies = Vec::new();

        for score_type in ScoreType::ALL {
            let reported: BTreeMap<String, f64> = sources
                .values()
                .filter_map(|s| s.scores.get(&score_type).map(|v| (s.provider.clone(), *v)))
                .collect();
            let values: Vec<f64> = reported.values().copied().collect();

            let Some(stats) = VariationStats::from_values(&values) else {
                continue;
            };

            if let Some(reason) = self.discrepancy_reason(&stats) {
                discrepancies.push(Discrepancy {
                    score_type,
                    range: stats.range,
                    coefficient_of_variation: stats.coefficient_of_variation,
                    values: reported,
                    reason,
                });
            }
            per_score_variation.insert(score_type, stats);
        }

        if per_score_variation.is_empty() {
            return ReconciliationOutcome::impossible(
                "no score type was reported by more than one provider",
            );
        }

        let mean_cov = per_score_variation
            .values()
            .map(|s| s.coefficient_of_variation)
            .sum::<f64>()
            / per_score_variation.len() as f64;
        let reliability_score = (1.0 - mean_cov).clamp(0.0, 1.0);
        let consensus_scores = per_score_variation
            .iter()
            .map(|(t, s)| (*t, s.mean))
            .collect();

        if !discrepancies.is_empty() {
            tracing::warn!(
                entity = entity_id.as_deref().unwrap_or("<unknown>"),
                "Providers disagree on {} score type(s)",
                discrepancies.len()
            );
        }

        ReconciliationOutcome::Reconciled(ReconciliationReport {
            entity_id,
            providers: sources.keys().cloned().collect(),
            per_score_variation,
            consensus_scores,
            reliability_score,
            reliability_level: ReliabilityLevel::from_score(reliability_score),
            discrepancies,
            cross_validation_possible: true,
        })
    }

    fn discrepancy_reason(&self, stats: &VariationStats) -> Option<String> {
        let wide = stats.range > self.config.range_threshold;
        let dispersed = stats.coefficient_of_variation > self.config.cov_threshold;
        match (wide, dispersed) {
            (true, true) => Some(format!(
                "range {:.1} exceeds {} and CoV {:.3} exceeds {}",
                stats.range,
                self.config.range_threshold,
                stats.coefficient_of_variation,
                self.config.cov_threshold
            )),
            (true, false) => Some(format!(
                "range {:.1} exceeds {}",
                stats.range, self.config.range_threshold
            )),
            (false, true) => Some(format!(
                "CoV {:.3} exceeds {}",
                stats.coefficient_of_variation, self.config.cov_threshold
            )),
            (false, false) => None,
        }
    }
}

/// Keep the most recent submission of each provider
fn latest_per_provider(sources: Vec<ProviderScores>) -> BTreeMap<String, ProviderScores> {
    let mut latest: BTreeMap<String, ProviderScores> = BTreeMap::new();
    for source in sources {
        match latest.get(&source.provider) {
            Some(current) if current.timestamp >= source.timestamp => {}
            _ => {
                latest.insert(source.provider.clone(), source);
            }
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(provider: &str, combined: f64) -> Value {
        json!({
            "entity_id": "company-7",
            "provider": provider,
            "timestamp": "2026-09-01T00:00:00Z",
            "esg_scores": {"combined": combined}
        })
    }

    #[test]
    fn test_two_providers_agreeing_within_bounds() {
        let bundles = [bundle("alpha", 70.0), bundle("beta", 90.0)];
        let outcome = Reconciler::default().reconcile(&bundles);
        let report = outcome.report().expect("two providers reconcile");

        let stats = report.per_score_variation[&ScoreType::Combined];
        assert!((stats.mean - 80.0).abs() < 1e-9);
        assert!((stats.std_dev - 14.142_135).abs() < 1e-5);
        assert!((stats.coefficient_of_variation - 0.176_776_7).abs() < 1e-6);
        assert_eq!(stats.range, 20.0);
        assert!(report.discrepancies.is_empty());
        assert_eq!(report.reliability_level, ReliabilityLevel::Good);
        assert_eq!(report.consensus_scores[&ScoreType::Combined], 80.0);
    }

    #[test]
    fn test_wide_range_is_flagged() {
        let bundles = [bundle("alpha", 40.0), bundle("beta", 75.0)];
        let outcome = Reconciler::default().reconcile(&bundles);
        let report = outcome.report().unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].score_type, ScoreType::Combined);
        assert_eq!(report.discrepancies[0].values["alpha"], 40.0);
    }

    #[test]
    fn test_single_provider_is_impossible() {
        let bundles = [bundle("alpha", 70.0), bundle("alpha", 72.0)];
        let outcome = Reconciler::default().reconcile(&bundles);
        assert!(!outcome.is_possible());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["cross_validation_possible"], json!(false));
    }

    #[test]
    fn test_no_overlapping_score_types_is_impossible() {
        let a = json!({"provider": "alpha", "esg_scores": {"environmental": 60}});
        let b = json!({"provider": "beta", "esg_scores": {"social": 60}});
        assert!(!Reconciler::default().reconcile(&[a, b]).is_possible());
    }

    #[test]
    fn test_latest_submission_per_provider_is_used() {
        let old = json!({
            "provider": "alpha", "timestamp": "2025-01-01",
            "esg_scores": {"combined": 10}
        });
        let outcome = Reconciler::default().reconcile(&[
            old,
            bundle("alpha", 70.0),
            bundle("beta", 90.0),
        ]);
        let report = outcome.report().unwrap();
        assert_eq!(report.providers, vec!["alpha".to_string(), "beta".to_string()]);
        assert!((report.consensus_scores[&ScoreType::Combined] - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_reliability_levels() {
        assert_eq!(ReliabilityLevel::from_score(0.95), ReliabilityLevel::High);
        assert_eq!(ReliabilityLevel::from_score(0.82), ReliabilityLevel::Good);
        assert_eq!(ReliabilityLevel::from_score(0.7), ReliabilityLevel::Moderate);
        assert_eq!(ReliabilityLevel::from_score(0.6), ReliabilityLevel::Low);
        assert_eq!(ReliabilityLevel::from_score(0.1), ReliabilityLevel::Poor);
    }

    #[test]
    fn test_zero_mean_variation() {
        let stats = VariationStats::from_values(&[0.0, 0.0]).unwrap();
        assert_eq!(stats.coefficient_of_variation, 0.0);
        assert!(VariationStats::from_values(&[5.0]).is_none());
    }
}
