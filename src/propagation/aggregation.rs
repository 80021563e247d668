use crate::config::AggregationMode;
use crate::core::{
    CompositeScore, EntityKind, ModelUsed, Momentum, Pillar, PillarScore, ScoreResult,
};
use crate::scoring::{composite_from, confidence_weighted_mean};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a node's aggregate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateSource {
    /// Read or scored directly from the entity's own data
    Direct,
    /// Combined from child aggregates
    Children,
    /// Imputed from same-kind, same-sector peers
    PeerEstimate,
}

/// Scores and additive totals for one node of the hierarchy.
///
/// Stored in the aggregates collection as a full replacement on each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAggregate {
    pub entity_id: String,
    pub kind: EntityKind,
    pub environmental: PillarScore,
    pub social: PillarScore,
    pub governance: PillarScore,
    pub composite: CompositeScore,
    #[serde(default)]
    pub momentum: Momentum,
    /// Summed impact metrics such as emissions
    #[serde(default)]
    pub additive_metrics: BTreeMap<String, f64>,
    pub source: AggregateSource,
    /// Children or peers that contributed
    pub contributors: Vec<String>,
    pub is_estimated: bool,
    pub computed_at: DateTime<Utc>,
}

impl NodeAggregate {
    pub fn from_score(
        kind: EntityKind,
        result: &ScoreResult,
        additive_metrics: BTreeMap<String, f64>,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: result.entity_id.clone(),
            kind,
            environmental: result.environmental,
            social: result.social,
            governance: result.governance,
            composite: result.composite,
            momentum: result.momentum,
            additive_metrics,
            source: AggregateSource::Direct,
            contributors: Vec::new(),
            is_estimated: false,
            computed_at,
        }
    }

    pub fn pillar(&self, pillar: Pillar) -> &PillarScore {
        match pillar {
            Pillar::Environmental => &self.environmental,
            Pillar::Social => &self.social,
            Pillar::Governance => &self.governance,
        }
    }
}

/// Inputs shared by child aggregation and peer estimation
#[derive(Debug, Clone, Copy)]
pub struct AggregationSettings<'a> {
    pub mode: AggregationMode,
    pub max_margin: f64,
    pub additive_metrics: &'a [String],
    pub computed_at: DateTime<Utc>,
}

/// Combine child aggregates into the parent's. `None` without children.
///
/// Each pillar is the arithmetic mean of the child pillars, with the mean
/// child confidence. The composite is the confidence-weighted mean of child
/// composites, or in arithmetic mode the mean of the aggregated pillars.
/// Additive metrics are summed over the children reporting them.
pub fn aggregate_children(
    entity_id: &str,
    kind: EntityKind,
    children: &[&NodeAggregate],
    settings: &AggregationSettings<'_>,
) -> Option<NodeAggregate> {
    if children.is_empty() {
        return None;
    }

    let pillar = |p: Pillar| -> PillarScore {
        let score = mean(children.iter().map(|c| c.pillar(p).score.value())).unwrap_or(0.0);
        let confidence =
            mean(children.iter().map(|c| c.pillar(p).confidence.value())).unwrap_or(0.0);
        PillarScore::new(score, confidence, ModelUsed::Aggregated)
    };

    let environmental = pillar(Pillar::Environmental);
    let social = pillar(Pillar::Social);
    let governance = pillar(Pillar::Governance);

    let composite_score = match settings.mode {
        AggregationMode::ConfidenceWeighted => confidence_weighted_mean(
            &children
                .iter()
                .map(|c| (c.composite.score.value(), c.composite.confidence.value()))
                .collect::<Vec<_>>(),
        ),
        AggregationMode::Arithmetic => mean(
            [environmental, social, governance]
                .iter()
                .map(|p| p.score.value()),
        ),
    }
    .unwrap_or(0.0);
    let composite_confidence =
        mean(children.iter().map(|c| c.composite.confidence.value())).unwrap_or(0.0);

    let mut additive_metrics = BTreeMap::new();
    for child in children {
        for name in settings.additive_metrics {
            if let Some(v) = child.additive_metrics.get(name) {
                *additive_metrics.entry(name.clone()).or_insert(0.0) += v;
            }
        }
    }

    Some(NodeAggregate {
        entity_id: entity_id.to_string(),
        kind,
        environmental,
        social,
        governance,
        composite: composite_from(composite_score, composite_confidence, settings.max_margin),
        momentum: mean_momentum(children),
        additive_metrics,
        source: AggregateSource::Children,
        contributors: children.iter().map(|c| c.entity_id.clone()).collect(),
        is_estimated: false,
        computed_at: settings.computed_at,
    })
}

/// Plain average of peer pillars and additive metrics. `None` without peers.
pub fn estimate_from_peers(
    entity_id: &str,
    kind: EntityKind,
    peers: &[&NodeAggregate],
    settings: &AggregationSettings<'_>,
) -> Option<NodeAggregate> {
    if peers.is_empty() {
        return None;
    }

    let pillar = |p: Pillar| -> PillarScore {
        let score = mean(peers.iter().map(|c| c.pillar(p).score.value())).unwrap_or(0.0);
        let confidence = mean(peers.iter().map(|c| c.pillar(p).confidence.value())).unwrap_or(0.0);
        PillarScore::new(score, confidence, ModelUsed::PeerEstimate)
    };
    let environmental = pillar(Pillar::Environmental);
    let social = pillar(Pillar::Social);
    let governance = pillar(Pillar::Governance);

    let composite_score = mean(peers.iter().map(|c| c.composite.score.value())).unwrap_or(0.0);
    let composite_confidence =
        mean(peers.iter().map(|c| c.composite.confidence.value())).unwrap_or(0.0);

    let mut additive_metrics = BTreeMap::new();
    for name in settings.additive_metrics {
        if let Some(avg) = mean(peers.iter().filter_map(|p| p.additive_metrics.get(name).copied()))
        {
            additive_metrics.insert(name.clone(), avg);
        }
    }

    Some(NodeAggregate {
        entity_id: entity_id.to_string(),
        kind,
        environmental,
        social,
        governance,
        composite: composite_from(composite_score, composite_confidence, settings.max_margin),
        momentum: Momentum::default(),
        additive_metrics,
        source: AggregateSource::PeerEstimate,
        contributors: peers.iter().map(|p| p.entity_id.clone()).collect(),
        is_estimated: true,
        computed_at: settings.computed_at,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_momentum(children: &[&NodeAggregate]) -> Momentum {
    let n = children.len().max(1) as f64;
    let sum = children.iter().fold(Momentum::default(), |acc, c| Momentum {
        environmental: acc.environmental + c.momentum.environmental,
        social: acc.social + c.momentum.social,
        governance: acc.governance + c.momentum.governance,
        overall: acc.overall + c.momentum.overall,
    });
    Momentum {
        environmental: sum.environmental / n,
        social: sum.social / n,
        governance: sum.governance / n,
        overall: sum.overall / n,
    }
}
