// Normalizer: raw year-file -> one row per organisation with metadata columns
//
// Input (written by the extractor):
//   2006-07,,,,,,
//   Category,Female_Count,Male_Count,Total_Count,Female_Rate,Male_Rate,Total_Rate
//   All ABI,120,140,260,31.2,37.5,34.3
//   Head injuries,...
// Output (rewritten in place):
//   Organisation,FinancialYear,Regime,All_ABI_Female_Count,...,CO_poisoning_Total_Rate
//   South West,2006-07,PCT,120,140,260,31.2,37.5,34.3,...

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::extract::CATEGORY_HEADER;
use crate::regime::FinancialYear;
use crate::schema::{
    canonical_category, canonical_metric, normalized_header, standardize_token, CATEGORIES,
    METRICS, ORGANISATION,
};
use crate::table::{self, is_blank_cell, tidy, Grid, TableError};
use crate::utils::region_display_name;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("{0} is empty")]
    Empty(PathBuf),

    #[error("File name {0} is not a financial year (expected e.g. 2006_07.csv)")]
    UnknownYear(PathBuf),

    #[error("File is named for {file_year} but its header says {header_year}")]
    YearMismatch {
        file_year: String,
        header_year: String,
    },

    #[error("No regime is defined for financial year {0}")]
    UnsupportedYear(String),

    #[error("Missing header row: expected column A to read 'Category', found {0:?}")]
    MissingHeaderRow(String),

    #[error("Unknown metric column {0:?}")]
    UnknownMetric(String),

    #[error("Metric column {0} appears more than once")]
    DuplicateMetric(String),

    #[error("Unknown injury category {label:?} at line {line}")]
    UnknownCategory { label: String, line: usize },

    #[error("Category {category} appears twice for organisation {organisation}")]
    DuplicateCategory {
        organisation: String,
        category: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStatus {
    Normalized,
    /// Header already standardized; file left untouched
    AlreadyNormalized,
}

/// Financial year encoded in a year-file name (`2006_07.csv`)
pub fn year_from_path(path: &Path) -> Result<FinancialYear, NormalizeError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(FinancialYear::parse)
        .ok_or_else(|| NormalizeError::UnknownYear(path.to_path_buf()))
}

/// True if the first row is already the normalized header
pub fn is_normalized(grid: &[Vec<String>]) -> bool {
    grid.first()
        .is_some_and(|first| first.iter().map(|c| c.trim()).eq(normalized_header().iter().map(String::as_str)))
}

/// Normalize one year-file grid.
///
/// `organisation` fills the `Organisation` column for regional files that do
/// not name organisations themselves.
pub fn normalize_grid(
    grid: &[Vec<String>],
    year: FinancialYear,
    organisation: &str,
) -> Result<Grid, NormalizeError> {
    let regime = year
        .regime()
        .ok_or_else(|| NormalizeError::UnsupportedYear(year.label()))?;

    let grid = tidy(grid);

    // Header spans two rows: the year title row, then the metric row
    let has_title_row = grid.first().is_some_and(|row| {
        row.first().and_then(|c| FinancialYear::parse(c)).is_some()
            && row.iter().skip(1).all(|c| is_blank_cell(c))
    });
    let (header, data) = if has_title_row {
        let header_year = FinancialYear::parse(&grid[0][0]);
        if header_year != Some(year) {
            return Err(NormalizeError::YearMismatch {
                file_year: year.label(),
                header_year: grid[0][0].clone(),
            });
        }
        (grid.get(1), grid.get(2..).unwrap_or(&[]))
    } else {
        (grid.first(), grid.get(1..).unwrap_or(&[]))
    };

    let header: Vec<String> = header
        .ok_or_else(|| NormalizeError::MissingHeaderRow(String::new()))?
        .iter()
        .map(|c| standardize_token(c))
        .collect();
    let first = header.first().cloned().unwrap_or_default();
    if !first.eq_ignore_ascii_case(CATEGORY_HEADER) {
        return Err(NormalizeError::MissingHeaderRow(first));
    }

    let has_org_column = header
        .get(1)
        .is_some_and(|c| c.eq_ignore_ascii_case(ORGANISATION));
    let metric_start = if has_org_column { 2 } else { 1 };

    // Column index -> position within METRICS
    let mut metric_slots: Vec<(usize, usize)> = Vec::new();
    let mut seen_metrics = HashSet::new();
    for (col, name) in header.iter().enumerate().skip(metric_start) {
        // Spacer column
        if name.is_empty() {
            continue;
        }
        let metric = canonical_metric(name).ok_or_else(|| NormalizeError::UnknownMetric(name.clone()))?;
        if !seen_metrics.insert(metric) {
            return Err(NormalizeError::DuplicateMetric(metric.to_string()));
        }
        let slot = METRICS.iter().position(|m| *m == metric).unwrap_or_default();
        metric_slots.push((col, slot));
    }

    let width = CATEGORIES.len() * METRICS.len();
    let mut organisations: Vec<String> = Vec::new();
    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    let mut seen_pairs: HashSet<(String, &'static str)> = HashSet::new();

    // +1 for the header, +1 for the title row, +1 for 1-based lines
    let line_offset = if has_title_row { 3 } else { 2 };

    for (idx, row) in data.iter().enumerate() {
        let label = row.first().map(String::as_str).unwrap_or("");
        let category = canonical_category(label).ok_or_else(|| NormalizeError::UnknownCategory {
            label: label.to_string(),
            line: idx + line_offset,
        })?;
        let cat_idx = CATEGORIES.iter().position(|c| *c == category).unwrap_or_default();

        let org = if has_org_column {
            row.get(1)
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .unwrap_or(organisation)
                .to_string()
        } else {
            organisation.to_string()
        };

        if !seen_pairs.insert((org.clone(), category)) {
            return Err(NormalizeError::DuplicateCategory {
                organisation: org,
                category: category.to_string(),
            });
        }

        let cells = values.entry(org.clone()).or_insert_with(|| {
            organisations.push(org.clone());
            vec![String::new(); width]
        });
        for &(col, slot) in &metric_slots {
            if let Some(cell) = row.get(col) {
                cells[cat_idx * METRICS.len() + slot] = cell.trim().to_string();
            }
        }
    }

    let mut out = vec![normalized_header()];
    for org in organisations {
        let cells = values.remove(&org).unwrap_or_default();
        let mut row = vec![org, year.label(), regime.to_string()];
        row.extend(cells);
        out.push(row);
    }

    Ok(out)
}

/// Rewrites year-files in place
#[derive(Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a year-file under `<root>/<Region>/`. The region display
    /// name becomes the organisation for regional files.
    #[instrument(skip(self), fields(file = %path.display()))]
    pub fn normalize_file(&self, path: &Path) -> Result<NormalizeStatus, NormalizeError> {
        let grid = table::read_grid(path)?;
        if grid.iter().all(|row| table::is_blank_row(row)) {
            return Err(NormalizeError::Empty(path.to_path_buf()));
        }

        if is_normalized(&grid) {
            debug!("Already normalized, skipping");
            return Ok(NormalizeStatus::AlreadyNormalized);
        }

        let year = year_from_path(path)?;
        let region = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(region_display_name)
            .unwrap_or_default();

        let normalized = normalize_grid(&grid, year, &region)?;
        table::write_grid(path, &normalized)?;

        info!(
            "Normalized {} ({} organisation rows)",
            path.display(),
            normalized.len() - 1
        );
        Ok(NormalizeStatus::Normalized)
    }
}
