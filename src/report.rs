//! Per-run summaries.
//!
//! Every stage processes a batch of items (workbooks, year-files, regions)
//! and records one tagged outcome per item instead of aborting on the first
//! failure. The collected outcomes decide the process exit status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::dataset::QualityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Normalize,
    Combine,
    Inspect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Combine => "combine",
            Stage::Inspect => "inspect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    /// Completed but produced nothing, e.g. a workbook with no year-blocks
    Warning,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// File or region the outcome refers to
    pub item: String,
    pub status: OutcomeStatus,
    pub message: Option<String>,
    pub outputs: Vec<PathBuf>,
}

impl Outcome {
    pub fn succeeded(item: impl Into<String>, outputs: Vec<PathBuf>) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Succeeded,
            message: None,
            outputs,
        }
    }

    pub fn warning(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Warning,
            message: Some(message.into()),
            outputs: Vec::new(),
        }
    }

    pub fn failed(item: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self {
            item: item.into(),
            status: OutcomeStatus::Failed,
            message: Some(error.to_string()),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
}

impl RunReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            outcomes: Vec::new(),
            quality: None,
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == OutcomeStatus::Failed)
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn with_status(&self, status: OutcomeStatus) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }

    /// Every file written during the run, in the order produced
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().flat_map(|o| o.outputs.iter())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Run Summary: {}", self.stage)?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Succeeded:          {}", self.count(OutcomeStatus::Succeeded))?;
        writeln!(f, "Warnings:           {}", self.count(OutcomeStatus::Warning))?;
        writeln!(f, "Failed:             {}", self.count(OutcomeStatus::Failed))?;

        let skipped: Vec<&Outcome> = self
            .outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Succeeded)
            .collect();
        if !skipped.is_empty() {
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "Skipped:")?;
            for outcome in skipped {
                writeln!(
                    f,
                    "  [{:?}] {}: {}",
                    outcome.status,
                    outcome.item,
                    outcome.message.as_deref().unwrap_or("")
                )?;
            }
        }

        let outputs: Vec<&PathBuf> = self.outputs().collect();
        if !outputs.is_empty() {
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "Generated ({}):", outputs.len())?;
            for path in outputs {
                writeln!(f, "  {}", path.display())?;
            }
        }

        if let Some(quality) = &self.quality {
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "Rows loaded:        {}", quality.rows)?;
            writeln!(f, "Missing cells:      {}", quality.missing_cells)?;
            writeln!(f, "Coercion failures:  {}", quality.total_failures())?;
            for (column, count) in &quality.failures_by_column {
                writeln!(f, "  {column}: {count}")?;
            }
        }

        write!(f, "{}", "=".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_failures_drive_status() {
        let mut report = RunReport::new(Stage::Extract);
        report.push(Outcome::succeeded("a.xlsx", vec![PathBuf::from("out/A/2006_07.csv")]));
        report.push(Outcome::warning("b.xlsx", "no year-blocks"));
        assert!(!report.has_failures());

        report.push(Outcome::failed("c.xlsx", &Boom));
        assert!(report.has_failures());
        assert_eq!(report.count(OutcomeStatus::Failed), 1);
        assert_eq!(report.outputs().count(), 1);
    }

    #[test]
    fn test_summary_lists_skipped_items() {
        let mut report = RunReport::new(Stage::Normalize);
        report.push(Outcome::failed("South_West/2006_07.csv", &Boom));
        let text = report.to_string();
        assert!(text.contains("Run Summary: normalize"));
        assert!(text.contains("South_West/2006_07.csv: boom"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut report = RunReport::new(Stage::Combine);
        report.push(Outcome::warning("Empty_Region", "no year-files"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "combine");
        assert_eq!(json["outcomes"][0]["status"], "warning");
        assert!(json.get("quality").is_none());
    }
}
