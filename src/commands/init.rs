use crate::config::CONFIG_FILE_NAME;
use crate::io;
use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# esgmap configuration

[quality]
# Days after which a bundle's timestamp counts as stale
freshness_days = 90
# Days over which the staleness penalty grows to its cap
decay_days = 365
max_timeliness_penalty = 0.5
# Allowed gap between the combined score and the pillar mean
combined_tolerance = 5.0
min_provider_confidence = 70.0

# Must sum to 1.0
[quality.weights]
completeness = 0.25
accuracy = 0.30
consistency = 0.20
timeliness = 0.15
validity = 0.10

# Minimum 0-1 score per dimension for a bundle to pass
[quality.thresholds]
completeness = 0.8
accuracy = 0.9
consistency = 0.85
timeliness = 0.9
validity = 0.95

[quality.levels]
excellent = 90.0
good = 80.0
acceptable = 70.0
poor = 60.0

[reconciliation]
range_threshold = 30.0
cov_threshold = 0.3

[scoring]
neutral_score = 50.0
neutral_confidence = 50.0
legacy_confidence = 40.0
momentum_window = 6
min_momentum_points = 3
max_margin = 10.0
min_trained_features = 3
cross_check_tolerance = 20.0
ridge_lambda = 0.001

[propagation]
# "confidence_weighted" or "arithmetic"
aggregation = "confidence_weighted"
additive_metrics = [
    "carbon_emissions",
    "scope1_emissions",
    "scope2_emissions",
    "scope3_emissions",
    "water_consumption",
    "waste_generated",
]
parallel = true
peer_query_timeout_ms = 2000
provider_query_timeout_ms = 2000
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    io::write_file(&config_path, DEFAULT_CONFIG)?;
    println!("Created {} configuration file", CONFIG_FILE_NAME);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_path, EsgConfig};

    #[test]
    fn test_default_file_matches_defaults() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        let loaded = load_config_from_path(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(loaded, EsgConfig::default());
    }

    #[test]
    fn test_existing_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        assert!(init_config(dir.path(), false).is_err());
        assert!(init_config(dir.path(), true).is_ok());
    }
}
