use super::composite::composite;
use super::momentum::{momentum, ScoreHistory};
use crate::config::ScoringConfig;
use crate::core::{ModelUsed, Pillar, PillarScore, ScoreResult};
use crate::features::FeatureMap;
use crate::models::ModelRegistry;
use crate::observability::{set_phase, PipelinePhase};
use chrono::{DateTime, Utc};

/// Composes pillar model outputs into a `ScoreResult`.
///
/// A pillar never fails the whole computation. When its model errors, or
/// finds no features at all, pre-computed `esg_scores` on the feature map
/// are used at reduced confidence before falling back to a neutral score.
pub struct ScoringEngine {
    registry: ModelRegistry,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(registry: ModelRegistry, config: ScoringConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(
        &self,
        entity_id: &str,
        features: &FeatureMap,
        history: Option<&ScoreHistory>,
    ) -> ScoreResult {
        self.score_at(entity_id, features, history, Utc::now())
    }

    pub fn score_at(
        &self,
        entity_id: &str,
        features: &FeatureMap,
        history: Option<&ScoreHistory>,
        timestamp: DateTime<Utc>,
    ) -> ScoreResult {
        let _span = tracing::debug_span!("score", entity = entity_id).entered();

        let (environmental, social, governance) = {
            let _phase = set_phase(PipelinePhase::ComponentScoring);
            (
                self.pillar_score(Pillar::Environmental, features),
                self.pillar_score(Pillar::Social, features),
                self.pillar_score(Pillar::Governance, features),
            )
        };

        let _phase = set_phase(PipelinePhase::CompositeScoring);
        let composite = composite(&[environmental, social, governance], self.config.max_margin);

        let momentum = history
            .map(|h| {
                momentum(
                    h,
                    self.config.momentum_window,
                    self.config.min_momentum_points,
                )
            })
            .unwrap_or_default();

        ScoreResult {
            entity_id: entity_id.to_string(),
            environmental,
            social,
            governance,
            composite,
            momentum,
            timestamp,
        }
    }

    /// Score one pillar, substituting legacy or neutral values on failure
    pub fn pillar_score(&self, pillar: Pillar, features: &FeatureMap) -> PillarScore {
        let legacy = features.esg_scores.and_then(|s| s.pillar(pillar));

        match self.registry.predict(pillar, features) {
            Ok(prediction) if prediction.model_used != ModelUsed::Default => PillarScore::new(
                prediction.score,
                prediction.confidence,
                prediction.model_used,
            ),
            Ok(prediction) => match legacy {
                Some(score) => self.legacy(score),
                None => PillarScore::new(
                    prediction.score,
                    prediction.confidence,
                    prediction.model_used,
                ),
            },
            Err(e) => {
                tracing::warn!("{} model failed: {}", pillar, e);
                match legacy {
                    Some(score) => self.legacy(score),
                    None => PillarScore::new(
                        self.config.neutral_score,
                        self.config.neutral_confidence,
                        ModelUsed::NeutralFallback,
                    ),
                }
            }
        }
    }

    fn legacy(&self, score: f64) -> PillarScore {
        PillarScore::new(score, self.config.legacy_confidence, ModelUsed::Legacy)
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        let config = ScoringConfig::default();
        Self::new(ModelRegistry::new(config), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LegacyEsgScores;

    #[test]
    fn test_partial_environmental_features() {
        let features = FeatureMap::new()
            .with("carbon_intensity", 50.0)
            .with("energy_efficiency", 80.0)
            .with("renewable_energy_pct", 60.0);
        let result = ScoringEngine::default().score("c-1", &features, None);

        assert_eq!(result.environmental.model_used, ModelUsed::WeightedAverage);
        assert!((result.environmental.confidence.value() - 60.0).abs() < 1e-9);
        assert!((result.environmental.score.value() - 79.166_666).abs() < 1e-4);

        // Other pillars have nothing to go on
        assert_eq!(result.social.model_used, ModelUsed::Default);
        assert_eq!(result.social.confidence.value(), 0.0);

        // Only the environmental pillar carries weight in the composite
        assert!((result.composite.score.value() - result.environmental.score.value()).abs() < 1e-9);
        assert!((result.composite.confidence.value() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_scores_beat_neutral_default() {
        let mut features = FeatureMap::new().with("board_independence", 70.0);
        features.esg_scores = Some(LegacyEsgScores {
            environmental: Some(62.0),
            social: None,
            governance: Some(10.0),
            combined: None,
        });
        let engine = ScoringEngine::default();

        let env = engine.pillar_score(Pillar::Environmental, &features);
        assert_eq!(env.model_used, ModelUsed::Legacy);
        assert_eq!(env.score.value(), 62.0);
        assert_eq!(env.confidence.value(), 40.0);

        // Measured features win over legacy
        let gov = engine.pillar_score(Pillar::Governance, &features);
        assert_eq!(gov.model_used, ModelUsed::WeightedAverage);

        let social = engine.pillar_score(Pillar::Social, &features);
        assert_eq!(social.model_used, ModelUsed::Default);
    }

    #[test]
    fn test_missing_model_uses_neutral_fallback() {
        let engine = ScoringEngine::new(ModelRegistry::empty(), ScoringConfig::default());
        let result = engine.score("c-2", &FeatureMap::new(), None);
        for (_, pillar) in result.pillars() {
            assert_eq!(pillar.model_used, ModelUsed::NeutralFallback);
            assert_eq!(pillar.score.value(), 50.0);
            assert_eq!(pillar.confidence.value(), 50.0);
        }
        assert_eq!(result.composite.score.value(), 50.0);
        assert_eq!(result.composite.confidence_interval, [45.0, 55.0]);
    }

    #[test]
    fn test_momentum_from_history() {
        use crate::scoring::momentum::ScorePoint;
        use chrono::{Duration, TimeZone};

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let history = ScoreHistory::new(
            [70.0, 71.0, 72.0, 80.0, 79.0, 78.0]
                .iter()
                .enumerate()
                .map(|(i, v)| ScorePoint {
                    timestamp: start + Duration::days(90 * i as i64),
                    environmental: Some(*v),
                    social: Some(50.0),
                    governance: None,
                })
                .collect(),
        );
        let result = ScoringEngine::default().score("c-3", &FeatureMap::new(), Some(&history));
        assert!(result.momentum.environmental > 0.0);
        assert_eq!(result.momentum.social, 0.0);
        assert!(result.momentum.overall > 0.0);
    }

    #[test]
    fn test_pillars_scored_under_component_phase() {
        use crate::models::{ComponentModel, EnvironmentalModel, FeatureSpec, ModelState};
        use crate::models::Prediction;
        use crate::observability::get_current_context;
        use parking_lot::Mutex;
        use std::sync::Arc;

        /// Records the pipeline phase active when it is asked to predict
        struct PhaseRecorder {
            inner: EnvironmentalModel,
            seen: Arc<Mutex<Vec<Option<PipelinePhase>>>>,
        }

        impl ComponentModel for PhaseRecorder {
            fn pillar(&self) -> Pillar {
                self.inner.pillar()
            }
            fn feature_specs(&self) -> &'static [FeatureSpec] {
                self.inner.feature_specs()
            }
            fn state(&self) -> &ModelState {
                self.inner.state()
            }
            fn state_mut(&mut self) -> &mut ModelState {
                self.inner.state_mut()
            }
            fn predict(&self, features: &FeatureMap) -> crate::errors::Result<Prediction> {
                self.seen.lock().push(get_current_context().phase);
                self.inner.predict(features)
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = ScoringConfig::default();
        let mut registry = ModelRegistry::new(config);
        registry.register(Box::new(PhaseRecorder {
            inner: EnvironmentalModel::new(config),
            seen: seen.clone(),
        }));
        let engine = ScoringEngine::new(registry, config);

        let _outer = set_phase(PipelinePhase::Propagation);
        engine.score("c-4", &FeatureMap::new().with("water_usage", 200.0), None);

        assert_eq!(*seen.lock(), vec![Some(PipelinePhase::ComponentScoring)]);
        assert_eq!(get_current_context().phase, Some(PipelinePhase::Propagation));
    }
}
