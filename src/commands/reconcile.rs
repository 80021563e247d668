use super::{json_documents, read_json};
use crate::config::ReconciliationConfig;
use crate::io::{create_writer, OutputFormat};
use crate::quality::Reconciler;
use anyhow::Result;
use std::path::Path;

pub fn reconcile_bundles(
    input: &Path,
    reconciliation: ReconciliationConfig,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let bundles = json_documents(read_json(input)?);
    let outcome = Reconciler::new(reconciliation).reconcile(&bundles);

    let mut writer = create_writer(format, output)?;
    writer.write_reconciliation(&outcome)
}
