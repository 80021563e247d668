// Shared fixtures for esgmap integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use esgmap::core::{
    Entity, EntityKind, LegacyEsgScores, MetricCategory, MetricObservation, ModelUsed,
    PillarScore, ScoreResult, ENTITIES, OBSERVATIONS, SCORES,
};
use esgmap::scoring::composite_from;
use esgmap::store::{DocumentStore, MemoryStore};
use std::sync::Arc;

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 30, 12, 0, 0).unwrap()
}

pub fn new_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn add_entity(store: &MemoryStore, entity: Entity) {
    store
        .insert_one(ENTITIES, serde_json::to_value(entity).unwrap())
        .unwrap();
}

pub fn company(id: &str, sector: &str) -> Entity {
    Entity::new(id, EntityKind::Company).with_sector(sector)
}

pub fn legacy(environmental: f64, social: f64, governance: f64) -> LegacyEsgScores {
    LegacyEsgScores {
        environmental: Some(environmental),
        social: Some(social),
        governance: Some(governance),
        combined: None,
    }
}

/// Stored score with the same score and confidence on every pillar
pub fn uniform_score(entity_id: &str, score: f64, confidence: f64) -> ScoreResult {
    let pillar = PillarScore::new(score, confidence, ModelUsed::WeightedAverage);
    ScoreResult {
        entity_id: entity_id.to_string(),
        environmental: pillar,
        social: pillar,
        governance: pillar,
        composite: composite_from(score, confidence, 10.0),
        momentum: Default::default(),
        timestamp: fixed_time(),
    }
}

pub fn add_score(store: &MemoryStore, result: &ScoreResult) {
    store
        .insert_one(SCORES, serde_json::to_value(result).unwrap())
        .unwrap();
}

pub fn add_observation(store: &MemoryStore, entity_id: &str, name: &str, value: f64) {
    let observation = MetricObservation::measured(
        entity_id,
        name,
        MetricCategory::Impact,
        value,
        "provider-a",
        fixed_time(),
    );
    store
        .insert_one(OBSERVATIONS, serde_json::to_value(observation).unwrap())
        .unwrap();
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}
