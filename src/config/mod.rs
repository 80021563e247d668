// Sub-modules
mod propagation;
mod quality;
mod scoring;

// Core configuration types
mod core;
mod loader;

pub use propagation::{AggregationMode, PropagationConfig};

pub use quality::{
    default_accuracy_weight, default_completeness_weight, default_consistency_weight,
    default_timeliness_weight, default_validity_weight, DimensionThresholds, DimensionWeights,
    QualityConfig, QualityLevelThresholds, ReconciliationConfig,
};

pub use scoring::ScoringConfig;

pub use core::EsgConfig;

pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path,
    parse_and_validate_config, CONFIG_FILE_NAME,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(EsgConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = EsgConfig::default();
        config.quality.weights.accuracy = 0.9;
        config.scoring.max_margin = -1.0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = EsgConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = parse_and_validate_config(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
