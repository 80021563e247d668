use serde::{Deserialize, Serialize};

/// How child scores are combined into a parent score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Each child weighted by its confidence; unweighted when all are zero
    #[default]
    ConfidenceWeighted,
    /// Plain arithmetic mean; composite is the mean of aggregated pillars
    Arithmetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    #[serde(default)]
    pub aggregation: AggregationMode,

    /// Metrics summed (not averaged) up the hierarchy
    #[serde(default = "default_additive_metrics")]
    pub additive_metrics: Vec<String>,

    /// Process independent trees on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Upper bound on a sector peer lookup
    #[serde(default = "default_peer_query_timeout_ms")]
    pub peer_query_timeout_ms: u64,

    /// Upper bound on fetching provider bundles for reconciliation
    #[serde(default = "default_provider_query_timeout_ms")]
    pub provider_query_timeout_ms: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationMode::default(),
            additive_metrics: default_additive_metrics(),
            parallel: default_parallel(),
            peer_query_timeout_ms: default_peer_query_timeout_ms(),
            provider_query_timeout_ms: default_provider_query_timeout_ms(),
        }
    }
}

impl PropagationConfig {
    pub fn is_additive(&self, metric: &str) -> bool {
        self.additive_metrics.iter().any(|m| m == metric)
    }
}

fn default_additive_metrics() -> Vec<String> {
    [
        "carbon_emissions",
        "scope1_emissions",
        "scope2_emissions",
        "scope3_emissions",
        "water_consumption",
        "waste_generated",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_parallel() -> bool {
    true
}
fn default_peer_query_timeout_ms() -> u64 {
    2_000
}
fn default_provider_query_timeout_ms() -> u64 {
    2_000
}
