use super::aggregation::NodeAggregate;
use crate::core::{Entity, EntityKind, MetricCategory, MetricObservation, Pillar, ENTITIES};
use crate::errors::Result;
use crate::store::{bounded_lookup, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Aggregates derived from measured data, grouped by kind and sector.
///
/// Built before any estimation happens so estimates never feed other
/// estimates, and re-runs see the same peers.
#[derive(Debug, Clone, Default)]
pub struct PeerIndex {
    groups: BTreeMap<(EntityKind, String), BTreeMap<String, NodeAggregate>>,
}

impl PeerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sector: &str, aggregate: NodeAggregate) {
        self.groups
            .entry((aggregate.kind, sector.to_string()))
            .or_default()
            .insert(aggregate.entity_id.clone(), aggregate);
    }

    pub fn get(&self, kind: EntityKind, sector: &str, entity_id: &str) -> Option<&NodeAggregate> {
        self.groups
            .get(&(kind, sector.to_string()))
            .and_then(|g| g.get(entity_id))
    }

    /// All indexed peers of a group, excluding `exclude`
    pub fn peers(&self, kind: EntityKind, sector: &str, exclude: &str) -> Vec<NodeAggregate> {
        self.groups
            .get(&(kind, sector.to_string()))
            .map(|group| {
                group
                    .values()
                    .filter(|a| a.entity_id != exclude)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Query the store for same-kind, same-sector entities and return the
/// indexed aggregates of those peers, bounded by `timeout`.
pub fn lookup_peers(
    store: Arc<dyn DocumentStore>,
    index: Arc<PeerIndex>,
    entity: &Entity,
    sector: &str,
    timeout: Duration,
) -> Result<Vec<NodeAggregate>> {
    let kind = entity.kind;
    let entity_id = entity.id.clone();
    let sector = sector.to_string();

    bounded_lookup("sector peer query", timeout, move || {
        let filter = Filter::new()
            .eq("kind", kind.as_str())
            .eq("sector", sector.as_str());
        let candidates = store.find(ENTITIES, &filter)?;

        let mut peers: Vec<NodeAggregate> = candidates
            .iter()
            .filter_map(|doc| doc.get("id").and_then(Value::as_str))
            .filter(|id| *id != entity_id)
            .filter_map(|id| index.get(kind, &sector, id).cloned())
            .collect();
        peers.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        peers.dedup_by(|a, b| a.entity_id == b.entity_id);
        Ok(peers)
    })
}

/// Observations recording a peer estimate.
///
/// One per pillar score plus one per additive metric, all flagged
/// `is_estimated`. Names in `measured` are skipped so an estimate never
/// shadows a measured value.
pub fn estimated_observations(
    estimate: &NodeAggregate,
    measured: &BTreeSet<String>,
    timestamp: DateTime<Utc>,
) -> Vec<MetricObservation> {
    let pillars = Pillar::ALL.into_iter().map(|p| {
        let category = match p {
            Pillar::Environmental => MetricCategory::Environmental,
            Pillar::Social => MetricCategory::Social,
            Pillar::Governance => MetricCategory::Governance,
        };
        (
            p.score_metric_name().to_string(),
            category,
            estimate.pillar(p).score.value(),
        )
    });
    let additive = estimate
        .additive_metrics
        .iter()
        .map(|(name, v)| (name.clone(), MetricCategory::Impact, *v));

    pillars
        .chain(additive)
        .filter(|(name, _, _)| !measured.contains(name))
        .map(|(name, category, value)| {
            MetricObservation::estimated(&estimate.entity_id, name, category, value, timestamp)
        })
        .collect()
}
