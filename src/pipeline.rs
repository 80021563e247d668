//! Entry point wiring the store, configuration and scoring components.
//!
//! The caller owns the store and hands it in; nothing here holds global
//! state. One `Pipeline` can serve many scoring and propagation runs, and
//! concurrent propagation runs against it serialize per tree.

use crate::config::EsgConfig;
use crate::core::{
    Entity, Pillar, ScoreResult, ENTITIES, OBSERVATIONS, PROVIDER_DATA, SCORES, SCORE_HISTORY,
};
use crate::errors::{Error, Result, ResultExt};
use crate::features::{FeatureExtractor, FeatureMap};
use crate::models::{ModelRegistry, TrainingResult};
use crate::observability::context::{self, PipelinePhase};
use crate::propagation::{CancellationToken, MetricsPropagator, PropagationSummary, TreeLocks};
use crate::quality::{DataQualityValidator, QualityReport, ReconciliationOutcome, Reconciler};
use crate::scoring::{momentum, ScoreHistory, ScorePoint, ScoringEngine};
use crate::store::{bounded_lookup, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Everything produced by scoring one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity_id: String,
    pub score: ScoreResult,
    /// One report per provider bundle on file
    pub quality: Vec<QualityReport>,
    pub reconciliation: ReconciliationOutcome,
}

impl EntityReport {
    /// True when every provider bundle passed its quality thresholds
    pub fn quality_ok(&self) -> bool {
        self.quality.iter().all(|r| r.is_valid)
    }
}

pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    config: EsgConfig,
    engine: ScoringEngine,
    validator: DataQualityValidator,
    reconciler: Reconciler,
    locks: TreeLocks,
}

impl Pipeline {
    /// Build a pipeline over `store`, loading any model artifacts it holds
    pub fn new(store: Arc<dyn DocumentStore>, config: EsgConfig) -> Self {
        let mut registry = ModelRegistry::new(config.scoring.clone());
        let loaded = registry.load_from_store(store.as_ref());
        tracing::debug!("Loaded {} trained model artifact(s)", loaded);
        Self::with_registry(store, config, registry)
    }

    pub fn with_registry(
        store: Arc<dyn DocumentStore>,
        config: EsgConfig,
        registry: ModelRegistry,
    ) -> Self {
        Self {
            engine: ScoringEngine::new(registry, config.scoring.clone()),
            validator: DataQualityValidator::new(config.quality.clone()),
            reconciler: Reconciler::new(config.reconciliation.clone()),
            locks: TreeLocks::new(),
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &EsgConfig {
        &self.config
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn entity(&self, entity_id: &str) -> Result<Entity> {
        let document = self
            .store
            .find_one(ENTITIES, &Filter::new().eq("id", entity_id))?
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity '{}'", entity_id)))?;
        serde_json::from_value(document)
            .map_err(Error::from)
            .context(format!("parsing entity '{}'", entity_id))
    }

    /// Measured features plus the entity's legacy score block
    pub fn features(&self, entity: &Entity) -> Result<FeatureMap> {
        let _phase = context::set_phase(PipelinePhase::FeatureExtraction);
        let documents = self
            .store
            .find(OBSERVATIONS, &Filter::new().eq("entity_id", entity.id.as_str()))?;
        let mut features = FeatureExtractor::measured_only().extract_documents(&documents);
        features.esg_scores = entity.esg_scores;
        Ok(features)
    }

    /// Quality report for every provider bundle stored for the entity
    pub fn validate_entity(&self, entity_id: &str) -> Result<Vec<QualityReport>> {
        self.validate_entity_at(entity_id, Utc::now())
    }

    pub fn validate_entity_at(
        &self,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QualityReport>> {
        let _phase = context::set_phase(PipelinePhase::QualityValidation);
        let bundles = self
            .store
            .find(PROVIDER_DATA, &Filter::new().eq("entity_id", entity_id))?;
        Ok(bundles
            .iter()
            .map(|bundle| self.validator.validate_at(bundle, now))
            .collect())
    }

    /// Cross-provider reconciliation with a bounded provider lookup.
    ///
    /// A lookup that times out or fails yields an impossible outcome rather
    /// than an error.
    pub fn reconcile_entity(&self, entity_id: &str) -> ReconciliationOutcome {
        let _phase = context::set_phase(PipelinePhase::Reconciliation);
        let store = self.store.clone();
        let filter = Filter::new().eq("entity_id", entity_id);
        let timeout = Duration::from_millis(self.config.propagation.provider_query_timeout_ms);

        match bounded_lookup("provider bundle query", timeout, move || {
            store.find(PROVIDER_DATA, &filter)
        }) {
            Ok(bundles) => self.reconciler.reconcile(&bundles),
            Err(e) => {
                tracing::warn!("Provider data for {} unavailable: {}", entity_id, e);
                ReconciliationOutcome::impossible(format!("provider data unavailable: {}", e))
            }
        }
    }

    /// Extract, validate, reconcile, score and commit one entity
    pub fn score_entity(&self, entity_id: &str) -> Result<EntityReport> {
        self.score_entity_at(entity_id, Utc::now())
    }

    pub fn score_entity_at(&self, entity_id: &str, now: DateTime<Utc>) -> Result<EntityReport> {
        let _span = tracing::info_span!("score_entity", entity = entity_id).entered();
        let _entity = context::set_current_entity(entity_id);

        let entity = self.entity(entity_id)?;
        let features = self.features(&entity)?;
        let quality = self.validate_entity_at(entity_id, now)?;
        for report in quality.iter().filter(|r| !r.is_valid) {
            tracing::warn!(
                "{} data from {} below quality thresholds ({:.1})",
                entity_id,
                report.provider.as_deref().unwrap_or("unknown provider"),
                report.overall_score.value()
            );
        }
        let reconciliation = self.reconcile_entity(entity_id);

        let mut score = {
            let _phase = context::set_phase(PipelinePhase::ComponentScoring);
            self.engine.score_at(entity_id, &features, None, now)
        };

        let mut history = self.history(entity_id)?;
        history.push(ScorePoint::from(&score));
        score.momentum = momentum(
            &history,
            self.config.scoring.momentum_window,
            self.config.scoring.min_momentum_points,
        );

        self.commit_score(&score)?;

        Ok(EntityReport {
            entity_id: entity_id.to_string(),
            score,
            quality,
            reconciliation,
        })
    }

    /// Score every stored entity that carries its own data.
    ///
    /// Failures are logged and skipped so one bad entity does not stop the
    /// batch.
    pub fn score_all(&self) -> Result<Vec<EntityReport>> {
        let documents = self.store.find(ENTITIES, &Filter::new())?;
        let ids: Vec<String> = documents
            .iter()
            .filter_map(|d| d.get("id").and_then(Value::as_str).map(str::to_string))
            .collect();
        context::set_progress(0, ids.len());

        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            match self.score_entity(&id) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("Skipping {}: {}", id, e),
            }
            context::increment_processed();
        }
        Ok(reports)
    }

    /// Propagate one tree, or all trees when `root` is `None`
    pub fn propagate(
        &self,
        root: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PropagationSummary> {
        MetricsPropagator::new(
            self.store.clone(),
            &self.engine,
            &self.config.propagation,
            &self.locks,
        )
        .with_cancellation(cancel)
        .propagate(root)
    }

    /// Train one pillar model and persist its artifact on success
    pub fn train(
        &mut self,
        pillar: Pillar,
        dataset: &[FeatureMap],
        target_column: &str,
    ) -> Result<TrainingResult> {
        let result = self
            .engine
            .registry_mut()
            .train(pillar, dataset, target_column)?;
        if result.success {
            self.engine.registry().save_to_store(self.store.as_ref())?;
        }
        Ok(result)
    }

    fn history(&self, entity_id: &str) -> Result<ScoreHistory> {
        let mut points: Vec<ScorePoint> = self
            .store
            .find(SCORE_HISTORY, &Filter::new().eq("entity_id", entity_id))?
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(ScoreHistory::new(points))
    }

    fn commit_score(&self, score: &ScoreResult) -> Result<()> {
        let _phase = context::set_phase(PipelinePhase::Commit);
        let filter = Filter::new().eq("entity_id", score.entity_id.as_str());
        self.store
            .update_one(SCORES, &filter, serde_json::to_value(score)?, true)
            .context(format!("writing score for '{}'", score.entity_id))?;

        let mut point = serde_json::to_value(ScorePoint::from(score))?;
        if let Value::Object(fields) = &mut point {
            fields.insert("entity_id".to_string(), Value::from(score.entity_id.as_str()));
        }
        let point_filter = filter.eq("timestamp", serde_json::to_value(score.timestamp)?);
        self.store.update_one(SCORE_HISTORY, &point_filter, point, true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityKind, LegacyEsgScores, ModelUsed};
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::json;

    fn store_with_company() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut entity = Entity::new("c-1", EntityKind::Company).with_sector("energy");
        entity.esg_scores = Some(LegacyEsgScores {
            environmental: Some(60.0),
            social: Some(70.0),
            governance: Some(80.0),
            combined: None,
        });
        store
            .insert_one(ENTITIES, serde_json::to_value(entity).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn test_score_entity_commits_result() {
        let store = store_with_company();
        let pipeline = Pipeline::new(store.clone(), EsgConfig::default());
        let report = pipeline.score_entity("c-1").unwrap();

        assert_eq!(report.score.environmental.model_used, ModelUsed::Legacy);
        assert!(!report.reconciliation.is_possible());

        let stored = store
            .find_one(SCORES, &Filter::new().eq("entity_id", "c-1"))
            .unwrap()
            .unwrap();
        let stored: ScoreResult = serde_json::from_value(stored).unwrap();
        assert_eq!(stored, report.score);
    }

    #[test]
    fn test_rescoring_replaces_and_builds_momentum() {
        let store = store_with_company();
        let pipeline = Pipeline::new(store.clone(), EsgConfig::default());
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for month in 0..4 {
            pipeline
                .score_entity_at("c-1", start + ChronoDuration::days(30 * month))
                .unwrap();
        }
        assert_eq!(store.len(SCORES), 1);
        assert_eq!(store.len(SCORE_HISTORY), 4);
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()), EsgConfig::default());
        assert!(matches!(
            pipeline.score_entity("missing"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_provider_bundles_validated_and_reconciled() {
        let store = store_with_company();
        for (provider, env) in [("msci", 60.0), ("sustainalytics", 64.0)] {
            store
                .insert_one(
                    PROVIDER_DATA,
                    json!({
                        "entity_id": "c-1",
                        "provider": provider,
                        "timestamp": Utc::now().to_rfc3339(),
                        "esg_scores": {"environmental": env, "social": 70.0, "governance": 80.0}
                    }),
                )
                .unwrap();
        }
        let pipeline = Pipeline::new(store, EsgConfig::default());
        let report = pipeline.score_entity("c-1").unwrap();
        assert_eq!(report.quality.len(), 2);
        assert!(report.reconciliation.is_possible());
    }
}
