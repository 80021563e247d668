use crate::core::Pillar;
use crate::io::output::OutputWriter;
use crate::models::TrainingResult;
use crate::pipeline::EntityReport;
use crate::propagation::PropagationSummary;
use crate::quality::{QualityReport, ReconciliationOutcome};
use serde::Serialize;
use serde_json::json;
use std::io::Write;

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.writer.write_all(json.as_bytes())?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> OutputWriter for JsonWriter<W> {
    fn write_entity_reports(&mut self, reports: &[EntityReport]) -> anyhow::Result<()> {
        match reports {
            [single] => self.write_value(single),
            _ => self.write_value(reports),
        }
    }

    fn write_quality_reports(&mut self, reports: &[QualityReport]) -> anyhow::Result<()> {
        self.write_value(reports)
    }

    fn write_reconciliation(&mut self, outcome: &ReconciliationOutcome) -> anyhow::Result<()> {
        self.write_value(outcome)
    }

    fn write_training(&mut self, pillar: Pillar, result: &TrainingResult) -> anyhow::Result<()> {
        self.write_value(&json!({ "pillar": pillar, "result": result }))
    }

    fn write_propagation(&mut self, summary: &PropagationSummary) -> anyhow::Result<()> {
        self.write_value(summary)
    }
}
