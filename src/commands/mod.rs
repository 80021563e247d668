//! CLI command implementations.
//!
//! Available commands:
//! - **score**: Score entities held in a store snapshot
//! - **validate**: Assess data quality of provider bundles
//! - **reconcile**: Cross-check scores reported by several providers
//! - **train**: Fit a pillar model and persist its artifact
//! - **propagate**: Aggregate scores up Fund → Company → Project trees
//! - **init**: Write a default configuration file

pub mod init;
pub mod propagate;
pub mod reconcile;
pub mod score;
pub mod train;
pub mod validate;

pub use init::init_config;
pub use propagate::{propagate_store, PropagateConfig};
pub use reconcile::reconcile_bundles;
pub use score::{score_store, ScoreConfig};
pub use train::{train_model, TrainConfig};
pub use validate::validate_bundles;

use crate::config::{load_config, load_config_from_path, EsgConfig};
use crate::store::MemoryStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Explicit config file if given, otherwise the nearest `.esgmap.toml`
pub fn resolve_config(path: Option<&Path>) -> Result<EsgConfig> {
    match path {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(load_config()),
    }
}

/// Load a store snapshot; a missing file yields an empty store
pub fn open_store(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        log::info!("{} not found; starting from an empty store", path.display());
        return Ok(MemoryStore::new());
    }
    MemoryStore::load(path).with_context(|| format!("Failed to open store {}", path.display()))
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content = crate::io::read_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// A JSON array as its elements, anything else as a single element
pub fn json_documents(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_documents_flattens_arrays_only() {
        assert_eq!(json_documents(json!([1, 2])).len(), 2);
        assert_eq!(json_documents(json!({"a": 1})).len(), 1);
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("absent.json")).unwrap();
        assert!(store.snapshot().as_object().unwrap().is_empty());
    }
}
