use super::open_store;
use crate::config::EsgConfig;
use crate::io::{create_writer, OutputFormat};
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub struct ScoreConfig {
    pub store: PathBuf,
    pub entity: Option<String>,
    pub dry_run: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: EsgConfig,
}

pub fn score_store(config: ScoreConfig) -> Result<()> {
    let store = Arc::new(open_store(&config.store)?);
    let pipeline = Pipeline::new(store.clone(), config.config);

    let reports = match &config.entity {
        Some(id) => vec![pipeline
            .score_entity(id)
            .with_context(|| format!("Failed to score {}", id))?],
        None => pipeline.score_all()?,
    };

    if !config.dry_run {
        store
            .save(&config.store)
            .with_context(|| format!("Failed to save {}", config.store.display()))?;
    }

    let mut writer = create_writer(config.format, config.output.as_deref())?;
    writer.write_entity_reports(&reports)
}
