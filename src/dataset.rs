//! Read access to the master table.
//!
//! The accessor never regenerates data: a missing master is reported with the
//! stage to re-run. Loaded datasets are cached per path and reused while the
//! file's modification time is unchanged.

pub mod error;
pub mod models;

pub use error::DatasetError;
pub use models::{QualityReport, Record};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

use crate::regime::Regime;
use crate::schema::{is_count_column, is_rate_column, FINANCIAL_YEAR, ORGANISATION, REGIME, REGION, YEAR_START};
use crate::table::{self, is_blank_cell};

/// Columns the master must carry
pub const REQUIRED_COLUMNS: [&str; 4] = [REGION, ORGANISATION, FINANCIAL_YEAR, REGIME];

/// Stage that produces the master table
pub const PRODUCING_STAGE: &str = "combine";

/// First calendar year of a financial-year label (`2006-07` -> 2006)
pub fn year_start(label: &str) -> Option<i32> {
    let token: String = label.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if token.len() == 4 {
        token.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    metric_columns: Vec<String>,
    records: Vec<Record>,
    quality: QualityReport,
}

impl Dataset {
    /// Load the master table at `path`
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        if !path.is_file() {
            return Err(DatasetError::MissingArtifact {
                path: path.to_path_buf(),
                stage: PRODUCING_STAGE,
            });
        }
        let grid = table::read_grid(path)?;
        let dataset = Self::from_grid(&grid)?;
        info!(
            "Loaded {} rows, {} coercion failures",
            dataset.records.len(),
            dataset.quality.total_failures()
        );
        Ok(dataset)
    }

    /// Build a dataset from a master grid whose first row is the header
    pub fn from_grid(grid: &[Vec<String>]) -> Result<Self, DatasetError> {
        let header: Vec<String> = grid
            .first()
            .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
            .unwrap_or_default();

        let column = |name: &str| {
            header
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };
        let region_col = column(REGION)?;
        let org_col = column(ORGANISATION)?;
        let year_col = column(FINANCIAL_YEAR)?;
        let regime_col = column(REGIME)?;

        let metric_idx: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| is_count_column(name) || is_rate_column(name))
            .map(|(idx, _)| idx)
            .collect();
        let metric_columns: Vec<String> = metric_idx.iter().map(|&i| header[i].clone()).collect();

        let cell = |row: &[String], idx: usize| row.get(idx).map(|c| c.trim().to_string()).unwrap_or_default();

        let mut quality = QualityReport::default();
        let mut records = Vec::with_capacity(grid.len().saturating_sub(1));

        for (offset, row) in grid.iter().enumerate().skip(1) {
            if table::is_blank_row(row) {
                continue;
            }
            let financial_year = cell(row, year_col);
            let start = year_start(&financial_year).ok_or_else(|| DatasetError::InvalidFinancialYear {
                value: financial_year.clone(),
                line: offset + 1,
            })?;

            let mut metrics = Vec::with_capacity(metric_idx.len());
            for (&idx, name) in metric_idx.iter().zip(&metric_columns) {
                let raw = row.get(idx).map(String::as_str).unwrap_or("");
                // Empty and unparseable cells both read as missing, never as zero
                let value = table::parse_number(raw);
                if value.is_none() {
                    quality.missing_cells += 1;
                    if !is_blank_cell(raw) {
                        quality.record_failure(name);
                    }
                }
                metrics.push(value);
            }

            records.push(Record {
                region: cell(row, region_col),
                organisation: cell(row, org_col),
                financial_year,
                regime: cell(row, regime_col),
                year_start: start,
                metrics,
            });
        }
        quality.rows = records.len();

        if quality.total_failures() > 0 {
            warn!(
                "{} metric cells could not be read as numbers",
                quality.total_failures()
            );
        }

        Ok(Self {
            metric_columns,
            records,
            quality,
        })
    }

    /// Full output schema, including the derived `Year_Start`
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.push(YEAR_START.to_string());
        columns.extend(self.metric_columns.iter().cloned());
        columns
    }

    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn quality(&self) -> &QualityReport {
        &self.quality
    }

    fn metric_index(&self, column: &str) -> Result<usize, DatasetError> {
        self.metric_columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DatasetError::UnknownColumn(column.to_string()))
    }

    /// Value of a metric column for one record
    pub fn value(&self, record: &Record, column: &str) -> Result<Option<f64>, DatasetError> {
        let idx = self.metric_index(column)?;
        Ok(record.metrics.get(idx).copied().flatten())
    }

    /// Distinct regions, sorted
    pub fn regions(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.region.as_str()).collect();
        set.into_iter().collect()
    }

    /// Distinct starting years, sorted
    pub fn years(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.records.iter().map(|r| r.year_start).collect();
        set.into_iter().collect()
    }

    /// Records in any of `regions` (all regions when empty) whose starting
    /// year falls inside `years`
    pub fn filter(&self, regions: &[&str], years: RangeInclusive<i32>) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| regions.is_empty() || regions.contains(&r.region.as_str()))
            .filter(|r| years.contains(&r.year_start))
            .collect()
    }

    /// Distinct organisations reported under a regime, sorted
    pub fn organisations_by_regime(&self, regime: Regime) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| Regime::parse(&r.regime) == Some(regime))
            .map(|r| r.organisation.as_str())
            .collect();
        set.into_iter().collect()
    }

    /// Sum of a count column per region. Missing values are skipped.
    pub fn sum_by_region(&self, column: &str) -> Result<BTreeMap<String, f64>, DatasetError> {
        if !is_count_column(column) {
            return Err(DatasetError::UnknownColumn(column.to_string()));
        }
        let idx = self.metric_index(column)?;
        let mut sums = BTreeMap::new();
        for record in &self.records {
            let entry = sums.entry(record.region.clone()).or_insert(0.0);
            if let Some(v) = record.metrics.get(idx).copied().flatten() {
                *entry += v;
            }
        }
        Ok(sums)
    }

    /// Mean of a rate column per region over the records that have a value.
    /// Regions with no value are left out.
    pub fn mean_by_region(&self, column: &str) -> Result<BTreeMap<String, f64>, DatasetError> {
        if !is_rate_column(column) {
            return Err(DatasetError::UnknownColumn(column.to_string()));
        }
        let idx = self.metric_index(column)?;
        let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            if let Some(v) = record.metrics.get(idx).copied().flatten() {
                let entry = acc.entry(record.region.clone()).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }
        Ok(acc
            .into_iter()
            .map(|(region, (sum, n))| (region, sum / n as f64))
            .collect())
    }

    /// Records ordered by region, then starting year. Ties keep file order.
    pub fn sorted(&self) -> Vec<&Record> {
        let mut rows: Vec<&Record> = self.records.iter().collect();
        rows.sort_by(|a, b| a.region.cmp(&b.region).then(a.year_start.cmp(&b.year_start)));
        rows
    }
}

/// Process-local cache of loaded master tables, keyed by modification time
#[derive(Debug, Default)]
pub struct DatasetStore {
    cache: Mutex<Option<CachedDataset>>,
}

#[derive(Debug)]
struct CachedDataset {
    path: PathBuf,
    modified: SystemTime,
    dataset: Arc<Dataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, reusing the cached dataset while the file is unchanged
    pub fn load(&self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        let modified = match fs::metadata(path) {
            Ok(meta) => meta.modified().map_err(|source| DatasetError::Io {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::MissingArtifact {
                    path: path.to_path_buf(),
                    stage: PRODUCING_STAGE,
                })
            }
            Err(source) => {
                return Err(DatasetError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = cache.as_ref() {
            if cached.path == path && cached.modified == modified {
                debug!("Using cached dataset for {}", path.display());
                return Ok(Arc::clone(&cached.dataset));
            }
        }

        let dataset = Arc::new(Dataset::load(path)?);
        *cache = Some(CachedDataset {
            path: path.to_path_buf(),
            modified,
            dataset: Arc::clone(&dataset),
        });
        Ok(dataset)
    }

    /// Drop the cached dataset
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *cache = None;
    }
}
