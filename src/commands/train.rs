use super::{json_documents, open_store, read_json};
use crate::config::EsgConfig;
use crate::core::Pillar;
use crate::features::FeatureMap;
use crate::io::{create_writer, OutputFormat};
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub struct TrainConfig {
    pub store: PathBuf,
    pub pillar: Pillar,
    pub dataset: PathBuf,
    pub target: String,
    pub model_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: EsgConfig,
}

/// Train one pillar model; returns whether training succeeded
pub fn train_model(config: TrainConfig) -> Result<bool> {
    let dataset = json_documents(read_json(&config.dataset)?)
        .iter()
        .enumerate()
        .map(|(i, row)| {
            FeatureMap::from_json(row).with_context(|| format!("Invalid dataset row {}", i))
        })
        .collect::<Result<Vec<_>>>()?;

    let store = Arc::new(open_store(&config.store)?);
    let mut pipeline = Pipeline::new(store.clone(), config.config);
    let result = pipeline.train(config.pillar, &dataset, &config.target)?;

    if result.success {
        store
            .save(&config.store)
            .with_context(|| format!("Failed to save {}", config.store.display()))?;
        if let Some(dir) = &config.model_dir {
            pipeline.engine().registry().save_to_dir(dir)?;
        }
    }

    let mut writer = create_writer(config.format, config.output.as_deref())?;
    writer.write_training(config.pillar, &result)?;
    Ok(result.success)
}
