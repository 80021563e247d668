//! Two-phase hierarchical propagation.
//!
//! Phase one resolves every entity's own measured data into a direct
//! aggregate and indexes those by kind and sector. Phase two walks each tree
//! bottom-up under that tree's lock: a node takes the aggregate of its
//! children, else its direct aggregate, else an estimate from sector peers.
//! Writes are staged per tree and committed only when the run has not been
//! cancelled.

use super::aggregation::{
    aggregate_children, estimate_from_peers, AggregationSettings, NodeAggregate,
};
use super::cancel::{CancellationToken, TreeLocks};
use super::hierarchy::{Hierarchy, HierarchyIssue, TreePlan};
use super::peer::{estimated_observations, lookup_peers, PeerIndex};
use crate::config::PropagationConfig;
use crate::core::{
    Entity, MetricObservation, Pillar, ScoreResult, AGGREGATES, ENTITIES, OBSERVATIONS, SCORES,
};
use crate::errors::{Error, Result, ResultExt};
use crate::features::{FeatureExtractor, FeatureMap};
use crate::observability::context::{self, PipelinePhase};
use crate::scoring::ScoringEngine;
use crate::store::{DocumentStore, Filter};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Where an entity ended up after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Unscored,
    /// Own measured data
    Scored,
    /// Imputed from sector peers
    Estimated,
    /// Aggregated from children
    Propagated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    HierarchyIntegrity,
    PeerEstimationImpossible,
    PeerLookupTimeout,
    Store,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationFailure {
    pub entity_id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl PropagationFailure {
    fn new(entity_id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind,
            message: message.into(),
        }
    }

    fn from_issue(issue: HierarchyIssue) -> Self {
        Self::new(issue.entity_id, FailureKind::HierarchyIntegrity, issue.message)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropagationSummary {
    pub entities_processed: usize,
    pub failures: Vec<PropagationFailure>,
    pub states: BTreeMap<String, EntityState>,
    /// Entities whose values were imputed during this run
    pub estimated: Vec<String>,
    pub aggregates: BTreeMap<String, NodeAggregate>,
    pub trees_processed: usize,
    /// Trees whose staged writes were discarded on cancellation
    pub trees_abandoned: usize,
    pub cancelled: bool,
}

impl PropagationSummary {
    pub fn state(&self, entity_id: &str) -> EntityState {
        self.states
            .get(entity_id)
            .copied()
            .unwrap_or(EntityState::Unscored)
    }

    pub fn failures_for(&self, entity_id: &str) -> impl Iterator<Item = &PropagationFailure> {
        let entity_id = entity_id.to_string();
        self.failures.iter().filter(move |f| f.entity_id == entity_id)
    }

    fn absorb(&mut self, outcome: TreeOutcome) {
        self.failures.extend(outcome.failures);
        if outcome.abandoned {
            self.trees_abandoned += 1;
            return;
        }
        self.trees_processed += 1;
        self.entities_processed += outcome.states.len();
        self.estimated.extend(outcome.estimated);
        self.states.extend(outcome.states);
        self.aggregates.extend(outcome.aggregates);
    }
}

/// An entity's own data as read from the store
#[derive(Debug, Clone, Default)]
struct LeafData {
    score: Option<ScoreResult>,
    features: FeatureMap,
    additive: BTreeMap<String, f64>,
    measured_names: BTreeSet<String>,
}

enum StagedWrite {
    Aggregate(NodeAggregate),
    Observation(MetricObservation),
}

#[derive(Default)]
struct TreeOutcome {
    states: BTreeMap<String, EntityState>,
    aggregates: BTreeMap<String, NodeAggregate>,
    failures: Vec<PropagationFailure>,
    estimated: Vec<String>,
    abandoned: bool,
}

impl TreeOutcome {
    fn abandoned() -> Self {
        Self {
            abandoned: true,
            ..Self::default()
        }
    }
}

pub struct MetricsPropagator<'a> {
    store: Arc<dyn DocumentStore>,
    engine: &'a ScoringEngine,
    config: &'a PropagationConfig,
    locks: &'a TreeLocks,
    cancel: CancellationToken,
}

impl<'a> MetricsPropagator<'a> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: &'a ScoringEngine,
        config: &'a PropagationConfig,
        locks: &'a TreeLocks,
    ) -> Self {
        Self {
            store,
            engine,
            config,
            locks,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Propagate one tree (`Some(root)`) or every tree in the store.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for an unknown root and `Error::Store` when the
    /// entity collection cannot be read. Per-entity problems are reported in
    /// the summary instead.
    pub fn propagate(&self, root: Option<&str>) -> Result<PropagationSummary> {
        self.propagate_at(root, Utc::now())
    }

    pub fn propagate_at(
        &self,
        root: Option<&str>,
        computed_at: DateTime<Utc>,
    ) -> Result<PropagationSummary> {
        let _span = tracing::info_span!("propagate", root = root.unwrap_or("all")).entered();
        let mut summary = PropagationSummary::default();

        let (hierarchy, load_issues) = self.load_hierarchy()?;
        let (all_roots, root_issues) = hierarchy.roots();

        let settings = AggregationSettings {
            mode: self.config.aggregation,
            max_margin: self.engine.config().max_margin,
            additive_metrics: &self.config.additive_metrics,
            computed_at,
        };

        let all_plans: Vec<TreePlan> = all_roots.iter().map(|r| hierarchy.plan(r)).collect();

        let plans: Vec<TreePlan> = match root {
            Some(id) => {
                if hierarchy.get(id).is_none() {
                    return Err(Error::InvalidInput(format!("unknown entity '{}'", id)));
                }
                vec![hierarchy.plan(id)]
            }
            None => {
                let reported: BTreeSet<String> = load_issues
                    .iter()
                    .chain(&root_issues)
                    .chain(all_plans.iter().flat_map(|p| &p.issues))
                    .map(|i| i.entity_id.clone())
                    .collect();
                let stranded = hierarchy.unreachable(&all_plans, &reported);
                if !stranded.is_empty() {
                    tracing::warn!("{} entities are not reachable from any root", stranded.len());
                }
                for issue in &stranded {
                    summary
                        .states
                        .insert(issue.entity_id.clone(), EntityState::Unscored);
                }
                summary.failures.extend(
                    load_issues
                        .into_iter()
                        .chain(root_issues)
                        .chain(stranded)
                        .map(PropagationFailure::from_issue),
                );
                all_plans.clone()
            }
        };
        for plan in &plans {
            summary
                .failures
                .extend(plan.issues.iter().cloned().map(PropagationFailure::from_issue));
        }

        let index = {
            let _phase = context::set_phase(PipelinePhase::LeafResolution);
            Arc::new(self.build_peer_index(&hierarchy, &all_plans, &settings))
        };
        tracing::debug!("Indexed {} peer aggregates", index.len());

        let total: usize = plans.iter().map(|p| p.order.len()).sum();
        context::set_progress(0, total);

        let outcomes: Vec<TreeOutcome> = if self.config.parallel {
            plans
                .par_iter()
                .map(|plan| self.run_tree(plan, &hierarchy, &index, &settings))
                .collect()
        } else {
            plans
                .iter()
                .map(|plan| self.run_tree(plan, &hierarchy, &index, &settings))
                .collect()
        };

        for outcome in outcomes {
            summary.absorb(outcome);
        }
        summary.cancelled = self.cancel.is_cancelled();

        tracing::info!(
            "Propagation finished: {} entities in {} trees, {} failures, {} abandoned",
            summary.entities_processed,
            summary.trees_processed,
            summary.failures.len(),
            summary.trees_abandoned
        );
        Ok(summary)
    }

    fn load_hierarchy(&self) -> Result<(Hierarchy, Vec<HierarchyIssue>)> {
        let documents = self
            .store
            .find(ENTITIES, &Filter::new())
            .context("loading entities")?;

        let mut entities = Vec::with_capacity(documents.len());
        let mut issues = Vec::new();
        for doc in documents {
            match serde_json::from_value::<Entity>(doc.clone()) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!("Skipping malformed entity document: {}", e);
                    if let Some(id) = doc.get("id").and_then(Value::as_str) {
                        issues.push(HierarchyIssue {
                            entity_id: id.to_string(),
                            message: format!("malformed entity document: {}", e),
                        });
                    }
                }
            }
        }

        let (hierarchy, duplicate_issues) = Hierarchy::new(entities);
        issues.extend(duplicate_issues);
        Ok((hierarchy, issues))
    }

    /// Direct aggregates of every planned entity, with no estimation
    fn build_peer_index(
        &self,
        hierarchy: &Hierarchy,
        plans: &[TreePlan],
        settings: &AggregationSettings<'_>,
    ) -> PeerIndex {
        let leaves: BTreeMap<String, LeafData> = hierarchy
            .entities()
            .par_iter()
            .filter_map(|entity| match self.load_leaf(entity) {
                Ok(leaf) => Some((entity.id.clone(), leaf)),
                Err(e) => {
                    tracing::warn!("Could not read data for {}: {}", entity.id, e);
                    None
                }
            })
            .collect();

        let mut index = PeerIndex::new();
        for plan in plans {
            let mut resolved: BTreeMap<String, NodeAggregate> = BTreeMap::new();
            for id in &plan.order {
                let Some(entity) = hierarchy.get(id) else {
                    continue;
                };
                let children: Vec<&NodeAggregate> = plan
                    .children_of(id)
                    .iter()
                    .filter_map(|c| resolved.get(c))
                    .collect();
                let aggregate = aggregate_children(id, entity.kind, &children, settings).or_else(
                    || {
                        leaves
                            .get(id)
                            .and_then(|leaf| self.direct_aggregate(entity, leaf, settings))
                    },
                );
                if let Some(aggregate) = aggregate {
                    resolved.insert(id.clone(), aggregate);
                }
            }
            for (id, aggregate) in resolved {
                if let Some(sector) = hierarchy.get(&id).and_then(|e| e.sector.as_deref()) {
                    index.insert(sector, aggregate);
                }
            }
        }
        index
    }

    fn run_tree(
        &self,
        plan: &TreePlan,
        hierarchy: &Hierarchy,
        index: &Arc<PeerIndex>,
        settings: &AggregationSettings<'_>,
    ) -> TreeOutcome {
        if self.cancel.is_cancelled() {
            return TreeOutcome::abandoned();
        }

        // A subtree run shares the lock of the tree it belongs to
        let lock = self.locks.lock_for(&hierarchy.top_ancestor(&plan.root));
        let _guard = lock.lock();
        let _span = tracing::debug_span!("tree", root = %plan.root).entered();
        let _tree = context::set_current_tree(plan.root.as_str());
        let _phase = context::set_phase(PipelinePhase::Propagation);

        let mut outcome = TreeOutcome::default();
        let mut staged = Vec::new();

        for id in &plan.order {
            if self.cancel.is_cancelled() {
                tracing::info!("Cancelled; discarding staged writes for tree {}", plan.root);
                return TreeOutcome::abandoned();
            }
            let Some(entity) = hierarchy.get(id) else {
                continue;
            };
            let _entity = context::set_current_entity(id.as_str());

            let children: Vec<&NodeAggregate> = plan
                .children_of(id)
                .iter()
                .filter_map(|c| outcome.aggregates.get(c))
                .collect();

            let resolved = match aggregate_children(id, entity.kind, &children, settings) {
                Some(aggregate) => Some((aggregate, EntityState::Propagated)),
                None => self.resolve_without_children(
                    entity,
                    index,
                    settings,
                    &mut outcome,
                    &mut staged,
                ),
            };

            match resolved {
                Some((aggregate, state)) => {
                    staged.push(StagedWrite::Aggregate(aggregate.clone()));
                    outcome.states.insert(id.clone(), state);
                    outcome.aggregates.insert(id.clone(), aggregate);
                }
                None => {
                    outcome.states.insert(id.clone(), EntityState::Unscored);
                }
            }
            context::increment_processed();
        }

        if self.cancel.is_cancelled() {
            tracing::info!("Cancelled; discarding staged writes for tree {}", plan.root);
            return TreeOutcome::abandoned();
        }

        let _commit = context::set_phase(PipelinePhase::Commit);
        for write in staged {
            if let Err((entity_id, e)) = self.commit(write) {
                tracing::warn!("Failed to write results for {}: {}", entity_id, e);
                outcome
                    .failures
                    .push(PropagationFailure::new(entity_id, FailureKind::Store, e.to_string()));
            }
        }
        outcome
    }

    /// Direct data first, then sector peers
    fn resolve_without_children(
        &self,
        entity: &Entity,
        index: &Arc<PeerIndex>,
        settings: &AggregationSettings<'_>,
        outcome: &mut TreeOutcome,
        staged: &mut Vec<StagedWrite>,
    ) -> Option<(NodeAggregate, EntityState)> {
        let leaf = match self.load_leaf(entity) {
            Ok(leaf) => leaf,
            Err(e) => {
                outcome
                    .failures
                    .push(PropagationFailure::new(&entity.id, FailureKind::Store, e.to_string()));
                return None;
            }
        };

        if let Some(direct) = self.direct_aggregate(entity, &leaf, settings) {
            return Some((direct, EntityState::Scored));
        }

        let _phase = context::set_phase(PipelinePhase::PeerEstimation);
        let Some(sector) = entity.sector.as_deref() else {
            outcome.failures.push(PropagationFailure::new(
                &entity.id,
                FailureKind::PeerEstimationImpossible,
                "no data and no sector to find peers",
            ));
            return None;
        };

        let timeout = Duration::from_millis(self.config.peer_query_timeout_ms);
        match lookup_peers(self.store.clone(), index.clone(), entity, sector, timeout) {
            Ok(peers) => {
                let refs: Vec<&NodeAggregate> = peers.iter().collect();
                match estimate_from_peers(&entity.id, entity.kind, &refs, settings) {
                    Some(mut estimate) => {
                        // Measured totals stay authoritative
                        estimate.additive_metrics.extend(leaf.additive.clone());
                        tracing::debug!(
                            "Estimated {} from {} {} peers",
                            entity.id,
                            refs.len(),
                            sector
                        );
                        let observations = estimated_observations(
                            &estimate,
                            &leaf.measured_names,
                            settings.computed_at,
                        );
                        staged.extend(observations.into_iter().map(StagedWrite::Observation));
                        outcome.estimated.push(entity.id.clone());
                        Some((estimate, EntityState::Estimated))
                    }
                    None => {
                        outcome.failures.push(PropagationFailure::new(
                            &entity.id,
                            FailureKind::PeerEstimationImpossible,
                            Error::PeerEstimationImpossible {
                                entity_id: entity.id.clone(),
                            }
                            .to_string(),
                        ));
                        None
                    }
                }
            }
            Err(e) => {
                let kind = if e.is_timeout() {
                    FailureKind::PeerLookupTimeout
                } else {
                    FailureKind::Store
                };
                tracing::warn!("Peer lookup for {} failed: {}", entity.id, e);
                outcome
                    .failures
                    .push(PropagationFailure::new(&entity.id, kind, e.to_string()));
                None
            }
        }
    }

    fn load_leaf(&self, entity: &Entity) -> Result<LeafData> {
        let by_entity = Filter::new().eq("entity_id", entity.id.as_str());

        let score = self
            .store
            .find(SCORES, &by_entity)?
            .into_iter()
            .filter_map(|doc| serde_json::from_value::<ScoreResult>(doc).ok())
            .max_by_key(|s| s.timestamp);

        let observations: Vec<MetricObservation> = self
            .store
            .find(OBSERVATIONS, &by_entity)?
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc) {
                Ok(obs) => Some(obs),
                Err(e) => {
                    tracing::debug!("Skipping malformed observation for {}: {}", entity.id, e);
                    None
                }
            })
            .collect();

        let extractor = FeatureExtractor::measured_only();
        let mut features = extractor.extract(&observations);
        features.esg_scores = entity.esg_scores;

        Ok(LeafData {
            score,
            features,
            additive: extractor.extract_additive(&observations, &self.config.additive_metrics),
            measured_names: observations
                .iter()
                .filter(|o| !o.is_estimated)
                .map(|o| o.name.clone())
                .collect(),
        })
    }

    /// Aggregate from the entity's own stored score or measured features
    fn direct_aggregate(
        &self,
        entity: &Entity,
        leaf: &LeafData,
        settings: &AggregationSettings<'_>,
    ) -> Option<NodeAggregate> {
        if let Some(score) = &leaf.score {
            return Some(NodeAggregate::from_score(
                entity.kind,
                score,
                leaf.additive.clone(),
                settings.computed_at,
            ));
        }

        let has_features = Pillar::ALL
            .iter()
            .any(|&p| leaf.features.available_count(p) > 0);
        if !has_features && leaf.features.esg_scores.is_none() {
            return None;
        }

        let result = self
            .engine
            .score_at(&entity.id, &leaf.features, None, settings.computed_at);
        Some(NodeAggregate::from_score(
            entity.kind,
            &result,
            leaf.additive.clone(),
            settings.computed_at,
        ))
    }

    fn commit(&self, write: StagedWrite) -> std::result::Result<(), (String, Error)> {
        match write {
            StagedWrite::Aggregate(aggregate) => {
                let filter = Filter::new().eq("entity_id", aggregate.entity_id.as_str());
                let document = serde_json::to_value(&aggregate)
                    .map_err(|e| (aggregate.entity_id.clone(), Error::from(e)))?;
                self.store
                    .update_one(AGGREGATES, &filter, document, true)
                    .map(|_| ())
                    .map_err(|e| (aggregate.entity_id, e))
            }
            StagedWrite::Observation(observation) => {
                let filter = Filter::new()
                    .eq("entity_id", observation.entity_id.as_str())
                    .eq("name", observation.name.as_str())
                    .eq("provider", observation.provider.as_str());
                let document = serde_json::to_value(&observation)
                    .map_err(|e| (observation.entity_id.clone(), Error::from(e)))?;
                self.store
                    .update_one(OBSERVATIONS, &filter, document, true)
                    .map(|_| ())
                    .map_err(|e| (observation.entity_id, e))
            }
        }
    }
}
