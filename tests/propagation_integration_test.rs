mod common;

use common::*;
use esgmap::config::PropagationConfig;
use esgmap::core::{
    Entity, EntityKind, MetricObservation, ModelUsed, Pillar, AGGREGATES, ENTITIES, OBSERVATIONS,
};
use esgmap::errors::Result;
use esgmap::propagation::{
    AggregateSource, CancellationToken, EntityState, FailureKind, MetricsPropagator, TreeLocks,
};
use esgmap::scoring::ScoringEngine;
use esgmap::store::{DocumentStore, Filter, MemoryStore, UpdateResult};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn sequential() -> PropagationConfig {
    PropagationConfig {
        parallel: false,
        ..PropagationConfig::default()
    }
}

/// Energy sector companies with environmental scores 60, 65, 70, 75
fn energy_peers(store: &MemoryStore) {
    for (i, score) in [60.0, 65.0, 70.0, 75.0].into_iter().enumerate() {
        let id = format!("peer-{}", i);
        add_entity(store, company(&id, "energy"));
        add_score(store, &uniform_score(&id, score, 80.0));
    }
}

fn estimated_observations(store: &MemoryStore, entity_id: &str) -> Vec<MetricObservation> {
    store
        .find(OBSERVATIONS, &Filter::new().eq("entity_id", entity_id))
        .unwrap()
        .into_iter()
        .map(|doc| serde_json::from_value(doc).unwrap())
        .filter(|o: &MetricObservation| o.is_estimated)
        .collect()
}

#[test]
fn test_company_without_projects_estimated_from_sector_peers() {
    let store = new_store();
    energy_peers(&store);
    add_entity(&store, company("target", "energy"));

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store.clone(), &engine, &config, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    assert_eq!(summary.state("target"), EntityState::Estimated);
    assert_eq!(summary.estimated, vec!["target".to_string()]);

    let estimate = &summary.aggregates["target"];
    assert!(estimate.is_estimated);
    assert_eq!(estimate.source, AggregateSource::PeerEstimate);
    assert_eq!(estimate.environmental.model_used, ModelUsed::PeerEstimate);
    assert!(approx_eq(estimate.environmental.score.value(), 67.5, 1e-9));

    let observations = estimated_observations(&store, "target");
    let environmental = observations
        .iter()
        .find(|o| o.name == Pillar::Environmental.score_metric_name())
        .unwrap();
    assert!(approx_eq(environmental.value, 67.5, 1e-9));
    assert!(observations.iter().all(|o| o.provider == "peer_estimate"));
}

#[test]
fn test_fund_composite_is_confidence_weighted() {
    let store = new_store();
    add_entity(
        &store,
        Entity::new("fund", EntityKind::Fund).with_children(["c-high", "c-low"]),
    );
    add_entity(&store, company("c-high", "energy").with_parent("fund"));
    add_entity(&store, company("c-low", "retail").with_parent("fund"));
    add_score(&store, &uniform_score("c-high", 80.0, 90.0));
    add_score(&store, &uniform_score("c-low", 60.0, 30.0));

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store.clone(), &engine, &config, &locks)
        .propagate_at(Some("fund"), fixed_time())
        .unwrap();

    let fund = &summary.aggregates["fund"];
    assert_eq!(summary.state("fund"), EntityState::Propagated);
    assert!(approx_eq(fund.composite.score.value(), 75.0, 1e-9));
    assert!(approx_eq(fund.environmental.score.value(), 70.0, 1e-9));
    assert!(fund.composite.confidence_interval[0] <= fund.composite.score.value());
    assert!(fund.composite.score.value() <= fund.composite.confidence_interval[1]);

    let stored = store
        .find_one(AGGREGATES, &Filter::new().eq("entity_id", "fund"))
        .unwrap()
        .unwrap();
    assert_eq!(stored["source"], "children");
}

#[test]
fn test_additive_metrics_summed_up_the_tree() {
    let store = new_store();
    add_entity(
        &store,
        company("c-1", "energy").with_children(["p-1", "p-2"]),
    );
    for (id, emissions) in [("p-1", 120.0), ("p-2", 80.0)] {
        let mut project = Entity::new(id, EntityKind::Project).with_parent("c-1");
        project.esg_scores = Some(legacy(50.0, 50.0, 50.0));
        add_entity(&store, project);
        add_observation(&store, id, "carbon_emissions", emissions);
    }

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store, &engine, &config, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    let company = &summary.aggregates["c-1"];
    assert!(approx_eq(company.additive_metrics["carbon_emissions"], 200.0, 1e-9));
    assert_eq!(company.contributors, vec!["p-1", "p-2"]);
}

#[test]
fn test_propagation_is_idempotent() {
    let store = new_store();
    energy_peers(&store);
    add_entity(
        &store,
        Entity::new("fund", EntityKind::Fund).with_children(["c-1", "c-2"]),
    );
    add_entity(&store, company("c-1", "energy").with_parent("fund"));
    add_entity(&store, company("c-2", "energy").with_parent("fund"));
    add_score(&store, &uniform_score("c-1", 55.0, 70.0));

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let propagator = MetricsPropagator::new(store.clone(), &engine, &config, &locks);

    let first = propagator.propagate_at(None, fixed_time()).unwrap();
    let second = propagator.propagate_at(None, fixed_time()).unwrap();

    assert_eq!(first.states, second.states);
    for (id, a) in &first.aggregates {
        let b = &second.aggregates[id];
        for pillar in Pillar::ALL {
            assert!(approx_eq(
                a.pillar(pillar).score.value(),
                b.pillar(pillar).score.value(),
                1e-6
            ));
        }
        assert!(approx_eq(a.composite.score.value(), b.composite.score.value(), 1e-6));
    }
    // Estimates are upserted, not duplicated
    assert_eq!(
        estimated_observations(&store, "c-2").len(),
        first.estimated.iter().filter(|id| *id == "c-2").count() * 3
    );
}

#[test]
fn test_estimate_never_overwrites_measured_observation() {
    let store = new_store();
    energy_peers(&store);
    add_entity(&store, company("target", "energy"));
    add_observation(&store, "target", "carbon_emissions", 42.0);
    for i in 0..4 {
        add_observation(&store, &format!("peer-{}", i), "carbon_emissions", 100.0);
    }

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store.clone(), &engine, &config, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    assert_eq!(summary.state("target"), EntityState::Estimated);
    assert!(approx_eq(
        summary.aggregates["target"].additive_metrics["carbon_emissions"],
        42.0,
        1e-9
    ));

    let carbon: Vec<Value> = store
        .find(
            OBSERVATIONS,
            &Filter::new()
                .eq("entity_id", "target")
                .eq("name", "carbon_emissions"),
        )
        .unwrap();
    assert_eq!(carbon.len(), 1);
    assert_eq!(carbon[0]["is_estimated"], false);
    assert_eq!(carbon[0]["value"], 42.0);
}

#[test]
fn test_broken_subtree_does_not_stop_siblings() {
    let store = new_store();
    add_entity(
        &store,
        Entity::new("fund", EntityKind::Fund).with_children(["c-ok", "c-ghost", "c-empty"]),
    );
    add_entity(&store, company("c-ok", "energy").with_parent("fund"));
    add_score(&store, &uniform_score("c-ok", 70.0, 60.0));
    // No data and no sector: cannot be estimated
    add_entity(
        &store,
        Entity::new("c-empty", EntityKind::Company).with_parent("fund"),
    );

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store, &engine, &config, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    let kinds: Vec<FailureKind> = summary.failures.iter().map(|f| f.kind).collect();
    assert!(kinds.contains(&FailureKind::HierarchyIntegrity));
    assert!(kinds.contains(&FailureKind::PeerEstimationImpossible));
    assert_eq!(summary.state("c-empty"), EntityState::Unscored);
    assert_eq!(summary.state("fund"), EntityState::Propagated);
    assert!(approx_eq(
        summary.aggregates["fund"].composite.score.value(),
        70.0,
        1e-9
    ));
}

/// Delegates to a memory store, stalling sector peer queries
struct SlowPeerStore {
    inner: MemoryStore,
    delay: Duration,
    on_peer_query: Option<CancellationToken>,
}

impl DocumentStore for SlowPeerStore {
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        self.inner.find_one(collection, filter)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        if collection == ENTITIES && filter.fields().any(|(k, _)| k == "sector") {
            if let Some(token) = &self.on_peer_query {
                token.cancel();
            }
            thread::sleep(self.delay);
        }
        self.inner.find(collection, filter)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Value,
        upsert: bool,
    ) -> Result<UpdateResult> {
        self.inner.update_one(collection, filter, set, upsert)
    }

    fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.inner.insert_one(collection, document)
    }
}

#[test]
fn test_slow_peer_lookup_times_out_without_failing_run() {
    let inner = MemoryStore::new();
    energy_peers(&inner);
    add_entity(&inner, company("target", "energy"));
    let store = Arc::new(SlowPeerStore {
        inner,
        delay: Duration::from_millis(500),
        on_peer_query: None,
    });

    let engine = ScoringEngine::default();
    let config = PropagationConfig {
        peer_query_timeout_ms: 20,
        ..sequential()
    };
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store, &engine, &config, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    let failure = summary.failures_for("target").next().unwrap();
    assert_eq!(failure.kind, FailureKind::PeerLookupTimeout);
    assert_eq!(summary.state("target"), EntityState::Unscored);
    assert_eq!(summary.state("peer-0"), EntityState::Scored);
}

#[test]
fn test_cancellation_discards_unfinished_tree() {
    let inner = MemoryStore::new();
    // First tree: scored directly, no peer query
    add_entity(&inner, company("c-scored", "retail"));
    add_score(&inner, &uniform_score("c-scored", 50.0, 50.0));
    // Second tree: needs a peer query, which triggers cancellation
    add_entity(&inner, company("c-estimated", "retail"));

    let token = CancellationToken::new();
    let store = Arc::new(SlowPeerStore {
        inner,
        delay: Duration::from_millis(0),
        on_peer_query: Some(token.clone()),
    });

    let engine = ScoringEngine::default();
    let config = sequential();
    let locks = TreeLocks::new();
    let summary = MetricsPropagator::new(store.clone(), &engine, &config, &locks)
        .with_cancellation(token)
        .propagate_at(None, fixed_time())
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.trees_processed, 1);
    assert_eq!(summary.trees_abandoned, 1);
    assert!(store
        .find_one(AGGREGATES, &Filter::new().eq("entity_id", "c-scored"))
        .unwrap()
        .is_some());
    assert!(store
        .find_one(AGGREGATES, &Filter::new().eq("entity_id", "c-estimated"))
        .unwrap()
        .is_none());
    assert!(store
        .find(OBSERVATIONS, &Filter::new().eq("entity_id", "c-estimated"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let build = || {
        let store = new_store();
        energy_peers(&store);
        for f in 0..4 {
            let fund = format!("fund-{}", f);
            let child = format!("c-{}", f);
            add_entity(
                &store,
                Entity::new(&fund, EntityKind::Fund).with_children([child.as_str()]),
            );
            add_entity(&store, company(&child, "energy").with_parent(&fund));
            if f % 2 == 0 {
                add_score(&store, &uniform_score(&child, 40.0 + f as f64, 60.0));
            }
        }
        store
    };

    let engine = ScoringEngine::default();
    let locks = TreeLocks::new();
    let parallel = PropagationConfig::default();
    let sequential = sequential();

    let a = MetricsPropagator::new(build(), &engine, &parallel, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();
    let b = MetricsPropagator::new(build(), &engine, &sequential, &locks)
        .propagate_at(None, fixed_time())
        .unwrap();

    assert_eq!(a.states, b.states);
    assert_eq!(a.aggregates, b.aggregates);
}
