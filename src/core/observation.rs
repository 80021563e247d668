use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider tag written on observations imputed from sector peers.
pub const PEER_ESTIMATE_PROVIDER: &str = "peer_estimate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Environmental,
    Social,
    Governance,
    /// Additive impact metrics (emissions, water, waste) summed up the hierarchy
    Impact,
    #[serde(other)]
    Other,
}

/// A single recorded metric value for one entity from one provider.
///
/// Immutable once recorded, except that the propagator may write estimated
/// observations. An estimated observation never replaces a measured one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub entity_id: String,
    pub name: String,
    pub category: MetricCategory,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    #[serde(default)]
    pub is_estimated: bool,
}

impl MetricObservation {
    pub fn measured(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        category: MetricCategory,
        value: f64,
        provider: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            category,
            value,
            unit: String::new(),
            timestamp,
            provider: provider.into(),
            is_estimated: false,
        }
    }

    /// Observation imputed from sector peers
    pub fn estimated(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        category: MetricCategory,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            category,
            value,
            unit: String::new(),
            timestamp,
            provider: PEER_ESTIMATE_PROVIDER.to_string(),
            is_estimated: true,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}
