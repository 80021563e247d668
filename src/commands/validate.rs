use super::{json_documents, read_json};
use crate::config::QualityConfig;
use crate::io::{create_writer, OutputFormat};
use crate::quality::DataQualityValidator;
use anyhow::Result;
use std::path::Path;

/// Validate every bundle in `input`; returns true when all pass.
pub fn validate_bundles(
    input: &Path,
    quality: QualityConfig,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<bool> {
    let bundles = json_documents(read_json(input)?);
    let validator = DataQualityValidator::new(quality);
    let reports: Vec<_> = bundles.iter().map(|b| validator.validate(b)).collect();

    let mut writer = create_writer(format, output)?;
    writer.write_quality_reports(&reports)?;

    Ok(reports.iter().all(|r| r.is_valid))
}
