use super::regression::RidgeRegression;
use crate::core::Pillar;
use crate::errors::{Error, Result, ResultExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Persisted state of a component model.
///
/// `blob` is opaque to everything except the owning model; metadata is kept
/// alongside it so reports can show feature importance without decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub pillar: Pillar,
    pub feature_importance: BTreeMap<String, f64>,
    pub is_trained: bool,
    #[serde(default)]
    pub blob: String,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

impl ModelArtifact {
    pub fn trained(
        pillar: Pillar,
        feature_importance: BTreeMap<String, f64>,
        regression: &RidgeRegression,
    ) -> Result<Self> {
        let blob = serde_json::to_string(regression)
            .map_err(|e| Error::ModelArtifact(format!("encoding {} model: {}", pillar, e)))?;
        Ok(Self {
            pillar,
            feature_importance,
            is_trained: true,
            blob,
            trained_at: Some(Utc::now()),
        })
    }

    pub fn untrained(pillar: Pillar, feature_importance: BTreeMap<String, f64>) -> Self {
        Self {
            pillar,
            feature_importance,
            is_trained: false,
            blob: String::new(),
            trained_at: None,
        }
    }

    /// Decode the regression held in `blob`
    pub fn regression(&self) -> Result<RidgeRegression> {
        if !self.is_trained {
            return Err(Error::ModelArtifact(format!(
                "{} artifact is not trained",
                self.pillar
            )));
        }
        serde_json::from_str(&self.blob)
            .map_err(|e| Error::ModelArtifact(format!("corrupt {} blob: {}", self.pillar, e)))
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| Error::ModelArtifact(format!("invalid artifact document: {}", e)))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(Error::from)
            .context(format!("writing {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::ModelArtifact(format!("{}: {}", path.display(), e)))
    }
}
