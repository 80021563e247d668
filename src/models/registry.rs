use super::artifact::ModelArtifact;
use super::component::{
    ComponentModel, EnvironmentalModel, GovernanceModel, SocialModel, TrainingResult,
};
use super::strategy::Prediction;
use crate::config::ScoringConfig;
use crate::core::{Pillar, MODELS};
use crate::errors::{Error, Result};
use crate::features::FeatureMap;
use crate::store::{DocumentStore, Filter};
use std::collections::BTreeMap;
use std::path::Path;

/// Explicit pillar → model dispatch table
pub struct ModelRegistry {
    models: BTreeMap<Pillar, Box<dyn ComponentModel>>,
}

impl ModelRegistry {
    /// Registry holding the three standard pillar models, untrained
    pub fn new(settings: ScoringConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(EnvironmentalModel::new(settings)));
        registry.register(Box::new(SocialModel::new(settings)));
        registry.register(Box::new(GovernanceModel::new(settings)));
        registry
    }

    pub fn empty() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Add or replace the model for its pillar
    pub fn register(&mut self, model: Box<dyn ComponentModel>) {
        self.models.insert(model.pillar(), model);
    }

    pub fn get(&self, pillar: Pillar) -> Option<&dyn ComponentModel> {
        self.models.get(&pillar).map(|m| m.as_ref())
    }

    pub fn predict(&self, pillar: Pillar, features: &FeatureMap) -> Result<Prediction> {
        self.get(pillar)
            .ok_or_else(|| Error::Model(format!("no model registered for {}", pillar)))?
            .predict(features)
    }

    pub fn train(
        &mut self,
        pillar: Pillar,
        dataset: &[FeatureMap],
        target_column: &str,
    ) -> Result<TrainingResult> {
        let model = self
            .models
            .get_mut(&pillar)
            .ok_or_else(|| Error::Model(format!("no model registered for {}", pillar)))?;
        Ok(model.train(dataset, target_column))
    }

    pub fn artifacts(&self) -> Result<Vec<ModelArtifact>> {
        self.models.values().map(|m| m.artifact()).collect()
    }

    /// Apply an artifact to the matching model; false if it was rejected
    pub fn load_artifact(&mut self, artifact: &ModelArtifact) -> bool {
        match self.models.get_mut(&artifact.pillar) {
            Some(model) => model.load_artifact(artifact),
            None => false,
        }
    }

    /// Load artifacts from the `models` collection. Missing or corrupt
    /// documents leave the affected model in fallback mode.
    pub fn load_from_store(&mut self, store: &dyn DocumentStore) -> usize {
        let mut loaded = 0;
        for pillar in Pillar::ALL {
            let filter = Filter::new().eq("pillar", pillar.as_str());
            let document = match store.find_one(MODELS, &filter) {
                Ok(Some(doc)) => doc,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Could not read {} model artifact: {}", pillar, e);
                    continue;
                }
            };
            match ModelArtifact::from_value(&document) {
                Ok(artifact) if self.load_artifact(&artifact) => loaded += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("{}; {} model uses fallback scoring", e, pillar),
            }
        }
        loaded
    }

    pub fn save_to_store(&self, store: &dyn DocumentStore) -> Result<()> {
        for artifact in self.artifacts()? {
            let filter = Filter::new().eq("pillar", artifact.pillar.as_str());
            store.update_one(MODELS, &filter, artifact.to_value()?, true)?;
        }
        Ok(())
    }

    /// Load `<pillar>.json` artifacts from a directory
    pub fn load_from_dir(&mut self, dir: &Path) -> usize {
        let mut loaded = 0;
        for pillar in Pillar::ALL {
            let path = dir.join(format!("{}.json", pillar.as_str()));
            if !path.exists() {
                continue;
            }
            match ModelArtifact::load(&path) {
                Ok(artifact) if self.load_artifact(&artifact) => loaded += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("{}; {} model uses fallback scoring", e, pillar),
            }
        }
        loaded
    }

    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for artifact in self.artifacts()? {
            artifact.save(&dir.join(format!("{}.json", artifact.pillar.as_str())))?;
        }
        Ok(())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
