use crate::core::{Pillar, PillarScore};
use crate::io::output::OutputWriter;
use crate::models::TrainingResult;
use crate::pipeline::EntityReport;
use crate::propagation::{EntityState, PropagationSummary};
use crate::quality::{QualityDimension, QualityReport, ReconciliationOutcome, ReliabilityLevel};
use colored::*;
use std::io::Write;

const RULE: &str = "───────────────────────────────────────────";

pub struct TerminalWriter<W: Write> {
    writer: W,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn header(&mut self, title: &str) -> anyhow::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", title.bold().cyan())?;
        writeln!(self.writer, "{}", RULE)?;
        Ok(())
    }

    fn pillar_line(&mut self, pillar: Pillar, score: &PillarScore) -> anyhow::Result<()> {
        writeln!(
            self.writer,
            "  {:<14} {:>6} {} (confidence {:.0}, {})",
            pillar.to_string(),
            format!("{:.1}", score.score.value()),
            score_band(score.score.value()),
            score.confidence.value(),
            score.model_used
        )?;
        Ok(())
    }

    fn entity_report(&mut self, report: &EntityReport) -> anyhow::Result<()> {
        self.header(&format!("ESG SCORE: {}", report.entity_id))?;
        for (pillar, score) in report.score.pillars() {
            self.pillar_line(pillar, score)?;
        }
        let composite = &report.score.composite;
        writeln!(
            self.writer,
            "  {:<14} {:>6} {} [{:.1}, {:.1}] confidence {:.0}",
            "Composite".bold(),
            format!("{:.1}", composite.score.value()),
            score_band(composite.score.value()),
            composite.confidence_interval[0],
            composite.confidence_interval[1],
            composite.confidence.value()
        )?;
        writeln!(
            self.writer,
            "  Momentum: {:+.2} overall",
            report.score.momentum.overall
        )?;

        if !report.quality.is_empty() {
            let failing = report.quality.iter().filter(|r| !r.is_valid).count();
            let status = if failing == 0 {
                "all within thresholds".green()
            } else {
                format!("{} below thresholds", failing).yellow()
            };
            writeln!(
                self.writer,
                "  Data quality: {} bundle(s), {}",
                report.quality.len(),
                status
            )?;
        }
        self.reconciliation_lines(&report.reconciliation)
    }

    fn reconciliation_lines(&mut self, outcome: &ReconciliationOutcome) -> anyhow::Result<()> {
        match outcome {
            ReconciliationOutcome::Impossible { reason, .. } => {
                writeln!(
                    self.writer,
                    "  Reconciliation: {} ({})",
                    "not possible".dimmed(),
                    reason
                )?;
            }
            ReconciliationOutcome::Reconciled(report) => {
                writeln!(
                    self.writer,
                    "  Reconciliation: {} providers, reliability {:.2} ({})",
                    report.providers.len(),
                    report.reliability_score,
                    reliability_colored(report.reliability_level)
                )?;
                for (score_type, consensus) in &report.consensus_scores {
                    writeln!(
                        self.writer,
                        "    consensus {:<14} {:.1}",
                        score_type.to_string(),
                        consensus
                    )?;
                }
                for discrepancy in &report.discrepancies {
                    writeln!(
                        self.writer,
                        "    {} {}: {}",
                        "⚠".yellow(),
                        discrepancy.score_type,
                        discrepancy.reason
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> OutputWriter for TerminalWriter<W> {
    fn write_entity_reports(&mut self, reports: &[EntityReport]) -> anyhow::Result<()> {
        for report in reports {
            self.entity_report(report)?;
        }
        if reports.len() > 1 {
            writeln!(self.writer)?;
            writeln!(self.writer, "Scored {} entities", reports.len())?;
        }
        Ok(())
    }

    fn write_quality_reports(&mut self, reports: &[QualityReport]) -> anyhow::Result<()> {
        for report in reports {
            let title = format!(
                "DATA QUALITY: {} / {}",
                report.entity_id.as_deref().unwrap_or("unknown entity"),
                report.provider.as_deref().unwrap_or("unknown provider")
            );
            self.header(&title)?;
            let verdict = if report.is_valid {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            writeln!(
                self.writer,
                "  Overall {:.1} ({}) {}",
                report.overall_score.value(),
                report.level,
                verdict
            )?;
            for dimension in QualityDimension::ALL {
                writeln!(
                    self.writer,
                    "    {:<13} {:.2}",
                    dimension.to_string(),
                    report.dimension_scores.get(dimension).value()
                )?;
            }
            for issue in &report.issues {
                writeln!(
                    self.writer,
                    "  - [{:?}] {}: {}",
                    issue.severity, issue.dimension, issue.message
                )?;
            }
            for recommendation in &report.recommendations {
                writeln!(self.writer, "  → {}", recommendation)?;
            }
        }
        Ok(())
    }

    fn write_reconciliation(&mut self, outcome: &ReconciliationOutcome) -> anyhow::Result<()> {
        self.header("PROVIDER RECONCILIATION")?;
        self.reconciliation_lines(outcome)
    }

    fn write_training(&mut self, pillar: Pillar, result: &TrainingResult) -> anyhow::Result<()> {
        self.header(&format!("TRAINING: {}", pillar))?;
        if !result.success {
            writeln!(
                self.writer,
                "  {} {}",
                "failed:".red(),
                result.error.as_deref().unwrap_or("unknown error")
            )?;
            return Ok(());
        }
        writeln!(
            self.writer,
            "  R² {:.3} on {} samples",
            result.training_score, result.samples_used
        )?;
        let mut importance: Vec<(&String, &f64)> = result.feature_importance.iter().collect();
        importance.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, weight) in importance {
            writeln!(self.writer, "    {:<24} {:.3}", name, weight)?;
        }
        Ok(())
    }

    fn write_propagation(&mut self, summary: &PropagationSummary) -> anyhow::Result<()> {
        self.header("HIERARCHY PROPAGATION")?;
        writeln!(
            self.writer,
            "  {} entities across {} tree(s)",
            summary.entities_processed, summary.trees_processed
        )?;
        for state in [
            EntityState::Scored,
            EntityState::Propagated,
            EntityState::Estimated,
            EntityState::Unscored,
        ] {
            let count = summary.states.values().filter(|s| **s == state).count();
            writeln!(self.writer, "    {:<11} {}", format!("{:?}", state), count)?;
        }
        if summary.cancelled {
            writeln!(
                self.writer,
                "  {} {} tree(s) abandoned",
                "Cancelled:".yellow(),
                summary.trees_abandoned
            )?;
        }
        if !summary.failures.is_empty() {
            writeln!(self.writer, "  {}", "Failures:".red().bold())?;
            for failure in &summary.failures {
                writeln!(
                    self.writer,
                    "  - {} [{:?}] {}",
                    failure.entity_id, failure.kind, failure.message
                )?;
            }
        }
        Ok(())
    }
}

fn score_band(score: f64) -> ColoredString {
    if score >= 70.0 {
        "HIGH".green()
    } else if score >= 40.0 {
        "MEDIUM".yellow()
    } else {
        "LOW".red()
    }
}

fn reliability_colored(level: ReliabilityLevel) -> ColoredString {
    match level {
        ReliabilityLevel::High | ReliabilityLevel::Good => level.to_string().green(),
        ReliabilityLevel::Moderate => level.to_string().yellow(),
        ReliabilityLevel::Low | ReliabilityLevel::Poor => level.to_string().red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{ProviderScores, Reconciler, ScoreType};

    #[test]
    fn test_reconciliation_summary_lists_providers() {
        let outcome = Reconciler::default().reconcile_scores(
            Some("c-1".to_string()),
            vec![
                ProviderScores::new("a").with_score(ScoreType::Environmental, 60.0),
                ProviderScores::new("b").with_score(ScoreType::Environmental, 64.0),
            ],
        );
        let mut writer = TerminalWriter::new(Vec::new());
        writer.write_reconciliation(&outcome).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains("2 providers"));
        assert!(text.contains("PROVIDER RECONCILIATION"));
    }

    #[test]
    fn test_failed_training_reports_error() {
        let result = TrainingResult {
            success: false,
            training_score: 0.0,
            feature_importance: Default::default(),
            samples_used: 2,
            error: Some("need more samples than features".to_string()),
        };
        let mut writer = TerminalWriter::new(Vec::new());
        writer.write_training(Pillar::Social, &result).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains("need more samples than features"));
    }
}
