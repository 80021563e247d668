use super::writers::{JsonWriter, TerminalWriter};
use crate::core::Pillar;
use crate::models::TrainingResult;
use crate::pipeline::EntityReport;
use crate::propagation::PropagationSummary;
use crate::quality::{QualityReport, ReconciliationOutcome};
use clap::ValueEnum;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Colored human-readable summary
    Terminal,
}

/// Renders each kind of report the CLI produces
pub trait OutputWriter {
    fn write_entity_reports(&mut self, reports: &[EntityReport]) -> anyhow::Result<()>;
    fn write_quality_reports(&mut self, reports: &[QualityReport]) -> anyhow::Result<()>;
    fn write_reconciliation(&mut self, outcome: &ReconciliationOutcome) -> anyhow::Result<()>;
    fn write_training(&mut self, pillar: Pillar, result: &TrainingResult) -> anyhow::Result<()>;
    fn write_propagation(&mut self, summary: &PropagationSummary) -> anyhow::Result<()>;
}

/// Writer for `format`, targeting `output` or stdout
pub fn create_writer(
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<Box<dyn OutputWriter>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };
    Ok(match format {
        OutputFormat::Json => Box::new(JsonWriter::new(sink)),
        OutputFormat::Terminal => Box::new(TerminalWriter::new(sink)),
    })
}
