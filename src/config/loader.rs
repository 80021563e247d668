use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::EsgConfig;
use super::quality::DimensionWeights;
use super::scoring::ScoringConfig;
use crate::errors::{Error, Result};

/// File name searched for in the working directory and its ancestors
pub const CONFIG_FILE_NAME: &str = ".esgmap.toml";

/// Pure function to read config file contents
pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse config from a TOML string, repairing invalid sections with defaults
pub fn parse_and_validate_config(contents: &str) -> std::result::Result<EsgConfig, String> {
    let mut config = toml::from_str::<EsgConfig>(contents)
        .map_err(|e| format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))?;

    // Validate and normalize dimension weights
    if let Err(e) = config.quality.weights.validate() {
        if config.quality.weights.sum() > 0.0
            && [
                config.quality.weights.completeness,
                config.quality.weights.accuracy,
                config.quality.weights.consistency,
                config.quality.weights.timeliness,
                config.quality.weights.validity,
            ]
            .iter()
            .all(|w| *w >= 0.0)
        {
            log::warn!("{}. Normalizing quality weights.", e);
            config.quality.weights.normalize();
        } else {
            log::warn!("Invalid quality weights: {}. Using defaults.", e);
            config.quality.weights = DimensionWeights::default();
        }
    }

    if let Err(e) = config.scoring.validate() {
        log::warn!("Invalid scoring settings: {}. Using defaults.", e);
        config.scoring = ScoringConfig::default();
    }

    Ok(config)
}

/// Load and parse a config file at an explicit path
pub fn load_config_from_path(path: &Path) -> Result<EsgConfig> {
    let contents = read_config_file(path).map_err(|e| {
        Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_and_validate_config(&contents).map_err(Error::Configuration)
}

/// Pure function to try loading config from a specific path
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<EsgConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("{}. Using defaults.", e);
            None
        }
    }
}

/// Handle file read errors with appropriate logging
pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    // Only log actual errors, not "file not found"
    if error.kind() != std::io::ErrorKind::NotFound {
        log::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Pure function to generate directory ancestors up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search `start` and its ancestors for a config file
pub fn load_config_from(start: PathBuf) -> EsgConfig {
    const MAX_TRAVERSAL_DEPTH: usize = 10;

    directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            EsgConfig::default()
        })
}

pub fn load_config() -> EsgConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(dir),
        Err(e) => {
            log::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            EsgConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregationMode;
    use indoc::indoc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_config_fills_defaults() {
        let config = parse_and_validate_config(indoc! {r#"
            [quality]
            freshness_days = 30

            [propagation]
            aggregation = "arithmetic"
        "#})
        .unwrap();

        assert_eq!(config.quality.freshness_days, 30);
        assert_eq!(config.quality.weights, DimensionWeights::default());
        assert_eq!(config.propagation.aggregation, AggregationMode::Arithmetic);
        assert_eq!(config.reconciliation.range_threshold, 30.0);
    }

    #[test]
    fn test_parse_normalizes_weights() {
        let config = parse_and_validate_config(indoc! {r#"
            [quality.weights]
            completeness = 1.0
            accuracy = 1.0
            consistency = 1.0
            timeliness = 1.0
            validity = 1.0
        "#});
        let config = config.unwrap();
        assert!((config.quality.weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_invalid_toml_is_error() {
        assert!(parse_and_validate_config("[quality\nbroken").is_err());
    }

    #[test]
    fn test_load_config_from_ancestor() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[scoring]\nlegacy_confidence = 25.0\n",
        )
        .unwrap();

        let config = load_config_from(nested);
        assert_eq!(config.scoring.legacy_confidence, 25.0);
    }

    #[test]
    fn test_load_config_from_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let result = load_config_from_path(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_directory_ancestors_depth() {
        let dirs: Vec<_> = directory_ancestors(PathBuf::from("/a/b/c"), 2).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a/b/c"), PathBuf::from("/a/b")]);
    }
}
