use serde::Serialize;
use std::collections::BTreeMap;

// One master-table row with metrics coerced to numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub region: String,
    pub organisation: String,
    pub financial_year: String,
    pub regime: String,
    pub year_start: i32,
    /// Values in the order of `Dataset::metric_columns`; `None` is missing
    pub metrics: Vec<Option<f64>>,
}

/// Data-quality summary gathered while coercing metric cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub rows: usize,
    /// Empty or unparseable metric cells
    pub missing_cells: usize,
    /// Non-empty cells that failed numeric coercion, per column
    pub failures_by_column: BTreeMap<String, usize>,
}

impl QualityReport {
    pub fn total_failures(&self) -> usize {
        self.failures_by_column.values().sum()
    }

    pub(crate) fn record_failure(&mut self, column: &str) {
        *self.failures_by_column.entry(column.to_string()).or_insert(0) += 1;
    }
}
