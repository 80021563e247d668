use super::open_store;
use crate::config::EsgConfig;
use crate::io::{create_writer, OutputFormat};
use crate::pipeline::Pipeline;
use crate::propagation::{CancellationToken, PropagationSummary};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub struct PropagateConfig {
    pub store: PathBuf,
    pub root: Option<String>,
    pub parallel: bool,
    pub dry_run: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: EsgConfig,
}

pub fn propagate_store(config: PropagateConfig) -> Result<PropagationSummary> {
    let mut esg_config = config.config;
    esg_config.propagation.parallel &= config.parallel;

    let store = Arc::new(open_store(&config.store)?);
    let pipeline = Pipeline::new(store.clone(), esg_config);
    let summary = pipeline.propagate(config.root.as_deref(), CancellationToken::new())?;

    if !config.dry_run {
        store
            .save(&config.store)
            .with_context(|| format!("Failed to save {}", config.store.display()))?;
    }

    let mut writer = create_writer(config.format, config.output.as_deref())?;
    writer.write_propagation(&summary)?;
    Ok(summary)
}
