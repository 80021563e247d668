use super::schema::FeatureMap;
use crate::core::MetricObservation;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Flattens an entity's metric observations into a typed feature map.
///
/// When several observations share a name, measured values win over
/// estimated ones, then the most recent timestamp wins. Provider name breaks
/// the remaining ties so repeated runs pick the same value.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    include_estimated: bool,
}

impl FeatureExtractor {
    /// Extractor that ignores estimated observations
    pub fn measured_only() -> Self {
        Self {
            include_estimated: false,
        }
    }

    /// Extractor that falls back to estimated observations when no measured one exists
    pub fn including_estimated() -> Self {
        Self {
            include_estimated: true,
        }
    }

    pub fn extract(&self, observations: &[MetricObservation]) -> FeatureMap {
        let mut map = FeatureMap::new();
        for (name, observation) in self.latest_by_name(observations) {
            map.set(&name, observation.value);
        }
        map
    }

    /// Parse raw metric documents and extract features from the valid ones
    pub fn extract_documents(&self, documents: &[Value]) -> FeatureMap {
        let observations: Vec<MetricObservation> = documents
            .iter()
            .filter_map(|doc| match serde_json::from_value(doc.clone()) {
                Ok(obs) => Some(obs),
                Err(e) => {
                    tracing::debug!("Skipping malformed metric document: {}", e);
                    None
                }
            })
            .collect();
        self.extract(&observations)
    }

    /// Latest value of each named additive metric
    pub fn extract_additive(
        &self,
        observations: &[MetricObservation],
        metric_names: &[String],
    ) -> BTreeMap<String, f64> {
        self.latest_by_name(observations)
            .into_iter()
            .filter(|(name, _)| metric_names.iter().any(|m| m == name))
            .map(|(name, obs)| (name, obs.value))
            .collect()
    }

    /// Select one observation per metric name
    pub fn latest_by_name<'a>(
        &self,
        observations: &'a [MetricObservation],
    ) -> BTreeMap<String, &'a MetricObservation> {
        let mut selected: BTreeMap<String, &MetricObservation> = BTreeMap::new();

        for obs in observations {
            if !obs.value.is_finite() || (obs.is_estimated && !self.include_estimated) {
                continue;
            }
            match selected.get(&obs.name) {
                Some(current) if prefer(current, obs) != Ordering::Less => {}
                _ => {
                    selected.insert(obs.name.clone(), obs);
                }
            }
        }

        selected
    }
}

/// Ordering of `a` relative to `b`; `Greater` means `a` should be kept
fn prefer(a: &MetricObservation, b: &MetricObservation) -> Ordering {
    // Measured beats estimated
    b.is_estimated
        .cmp(&a.is_estimated)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| b.provider.cmp(&a.provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetricCategory;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn obs(name: &str, value: f64, provider: &str, days_ago: i64) -> MetricObservation {
        let base = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        MetricObservation::measured(
            "company-1",
            name,
            MetricCategory::Environmental,
            value,
            provider,
            base - Duration::days(days_ago),
        )
    }

    #[test]
    fn test_latest_observation_wins() {
        let observations = vec![
            obs("carbon_intensity", 120.0, "alpha", 30),
            obs("carbon_intensity", 95.0, "alpha", 2),
        ];
        let map = FeatureExtractor::measured_only().extract(&observations);
        assert_eq!(map.environmental.carbon_intensity, Some(95.0));
    }

    #[test]
    fn test_measured_beats_newer_estimate() {
        let mut estimate = obs("water_usage", 10.0, "peer_estimate", 0);
        estimate.is_estimated = true;
        let observations = vec![obs("water_usage", 400.0, "alpha", 100), estimate];

        let map = FeatureExtractor::including_estimated().extract(&observations);
        assert_eq!(map.environmental.water_usage, Some(400.0));
    }

    #[test]
    fn test_measured_only_skips_estimates() {
        let mut estimate = obs("water_usage", 10.0, "peer_estimate", 0);
        estimate.is_estimated = true;

        let map = FeatureExtractor::measured_only().extract(&[estimate.clone()]);
        assert_eq!(map.environmental.water_usage, None);

        let map = FeatureExtractor::including_estimated().extract(&[estimate]);
        assert_eq!(map.environmental.water_usage, Some(10.0));
    }

    #[test]
    fn test_tie_broken_by_provider_name() {
        let observations = vec![
            obs("audit_quality", 70.0, "zeta", 1),
            obs("audit_quality", 80.0, "alpha", 1),
        ];
        let map = FeatureExtractor::measured_only().extract(&observations);
        assert_eq!(map.governance.audit_quality, Some(80.0));
    }

    #[test]
    fn test_extract_additive_filters_names() {
        let observations = vec![
            obs("carbon_emissions", 1500.0, "alpha", 1),
            obs("carbon_intensity", 80.0, "alpha", 1),
        ];
        let totals = FeatureExtractor::measured_only()
            .extract_additive(&observations, &["carbon_emissions".to_string()]);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals["carbon_emissions"], 1500.0);
    }

    #[test]
    fn test_extract_documents_skips_malformed() {
        let docs = vec![
            json!({
                "entity_id": "p-1", "name": "energy_efficiency", "category": "environmental",
                "value": 72.0, "timestamp": "2026-01-01T00:00:00Z", "provider": "alpha"
            }),
            json!({"entity_id": "p-1", "name": "broken"}),
        ];
        let map = FeatureExtractor::measured_only().extract_documents(&docs);
        assert_eq!(map.environmental.energy_efficiency, Some(72.0));
        assert_eq!(map.get("broken"), None);
    }
}
