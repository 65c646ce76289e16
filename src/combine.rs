//! Combiner: normalized year-files -> regional tables -> master table.
//!
//! Each region directory is merged into `<Region>.csv` plus a per-year
//! `Regional_total.csv`. The regional tables are then concatenated into the
//! master. Column schemas are checked at both levels; a region that fails
//! blocks the master.

pub mod regional_total;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::schema::{METADATA_COLUMNS, REGION};
use crate::table::{self, Grid, TableError};
use crate::utils::{is_year_file, region_display_name};

pub use regional_total::REGIONAL_TOTAL_FILE;

#[derive(Error, Debug)]
pub enum CombineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Processed data directory {0} not found (run the extract and normalize stages first)")]
    MissingRoot(PathBuf),

    #[error("{0} is not normalized (run the normalize stage first)")]
    NotNormalized(PathBuf),

    #[error(
        "Schema mismatch in {}: missing {missing:?}, unexpected {unexpected:?}",
        file.display()
    )]
    SchemaMismatch {
        file: PathBuf,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("No regional tables to combine under {0}")]
    NoRegions(PathBuf),

    #[error("Master table not built: regions failed: {}", .0.join(", "))]
    MasterBlocked(Vec<String>),
}

/// Output of combining one region
#[derive(Debug, Clone)]
pub struct RegionTables {
    /// Region directory name
    pub region: String,
    pub combined: PathBuf,
    pub totals: PathBuf,
    pub year_files: usize,
    pub rows: usize,
}

/// Compare two ordered headers. Returns the columns missing from `actual`
/// and the columns it adds, or `None` when the headers are identical.
pub fn schema_diff(expected: &[String], actual: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    if expected == actual {
        return None;
    }
    let missing = expected
        .iter()
        .filter(|c| !actual.contains(c))
        .cloned()
        .collect();
    let unexpected = actual
        .iter()
        .filter(|c| !expected.contains(c))
        .cloned()
        .collect();
    Some((missing, unexpected))
}

/// Normalized files open with `Organisation, FinancialYear, Regime`
fn has_metadata_columns(header: &[String]) -> bool {
    header.len() >= METADATA_COLUMNS.len()
        && header.iter().zip(METADATA_COLUMNS).all(|(c, m)| c == m)
}

fn check_schema(expected: &[String], actual: &[String], file: &Path) -> Result<(), CombineError> {
    match schema_diff(expected, actual) {
        None => Ok(()),
        Some((missing, unexpected)) => Err(CombineError::SchemaMismatch {
            file: file.to_path_buf(),
            missing,
            unexpected,
        }),
    }
}

pub struct Combiner {
    processed_root: PathBuf,
    master_path: PathBuf,
}

impl Combiner {
    pub fn new(processed_root: impl Into<PathBuf>, master_name: &str) -> Self {
        let processed_root = processed_root.into();
        let master_path = processed_root.join(format!("{master_name}.csv"));
        Self {
            processed_root,
            master_path,
        }
    }

    pub fn master_path(&self) -> &Path {
        &self.master_path
    }

    /// Region directories in ascending name order
    pub fn region_dirs(&self) -> Result<Vec<PathBuf>, CombineError> {
        if !self.processed_root.is_dir() {
            return Err(CombineError::MissingRoot(self.processed_root.clone()));
        }
        let mut dirs: Vec<PathBuf> = list_dir(&self.processed_root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Merge one region's year-files into its regional and total tables.
    /// Returns `None` when the region has no year-files.
    #[instrument(skip(self), fields(region = %region_dir.display()))]
    pub fn combine_region(&self, region_dir: &Path) -> Result<Option<RegionTables>, CombineError> {
        let slug = region_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let display = region_display_name(&slug);

        let year_files = year_files(region_dir)?;
        if year_files.is_empty() {
            warn!("Region {} has no year-files, skipping", slug);
            return Ok(None);
        }

        let mut combined: Grid = Vec::new();
        let mut expected: Option<Vec<String>> = None;

        for path in &year_files {
            let grid = table::read_grid(path)?;
            let header: Vec<String> = grid
                .first()
                .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
                .unwrap_or_default();
            if !has_metadata_columns(&header) {
                return Err(CombineError::NotNormalized(path.clone()));
            }
            match &expected {
                Some(first) => check_schema(first, &header, path)?,
                None => {
                    let mut out_header = vec![REGION.to_string()];
                    out_header.extend(header.iter().cloned());
                    combined.push(out_header);
                    expected = Some(header);
                }
            }

            for row in grid.into_iter().skip(1) {
                let mut line = Vec::with_capacity(row.len() + 1);
                line.push(display.clone());
                line.extend(row);
                combined.push(line);
            }
            debug!("Merged {}", path.display());
        }

        let combined_path = region_dir.join(format!("{slug}.csv"));
        table::write_grid(&combined_path, &combined)?;

        let totals = regional_total::regional_totals(&display, &combined);
        let totals_path = region_dir.join(REGIONAL_TOTAL_FILE);
        table::write_grid(&totals_path, &totals)?;

        let rows = combined.len() - 1;
        info!(
            "Combined {} year-files into {} ({} rows)",
            year_files.len(),
            combined_path.display(),
            rows
        );

        Ok(Some(RegionTables {
            region: slug,
            combined: combined_path,
            totals: totals_path,
            year_files: year_files.len(),
            rows,
        }))
    }

    /// Concatenate regional tables into the master, written atomically.
    /// A schema mismatch removes any stale master.
    #[instrument(skip_all, fields(master = %self.master_path.display()))]
    pub fn build_master(&self, regions: &[RegionTables]) -> Result<usize, CombineError> {
        if regions.is_empty() {
            self.remove_stale_master()?;
            return Err(CombineError::NoRegions(self.processed_root.clone()));
        }

        let mut master: Grid = Vec::new();
        for region in regions {
            let grid = table::read_grid(&region.combined)?;
            let Some((header, rows)) = grid.split_first() else {
                continue;
            };
            let header: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();

            if let Some(first) = master.first() {
                if let Err(e) = check_schema(first, &header, &region.combined) {
                    self.remove_stale_master()?;
                    return Err(e);
                }
            } else {
                master.push(header);
            }
            master.extend(rows.iter().cloned());
        }

        table::write_grid_atomic(&self.master_path, &master)?;
        let rows = master.len().saturating_sub(1);
        info!("Wrote master table {} ({} rows)", self.master_path.display(), rows);
        Ok(rows)
    }

    /// Delete a master left over from an earlier run
    pub fn remove_stale_master(&self) -> Result<(), CombineError> {
        if self.master_path.exists() {
            warn!("Removing stale master {}", self.master_path.display());
            fs::remove_file(&self.master_path).map_err(|source| CombineError::Io {
                path: self.master_path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Normalized year-files of a region, in ascending file-name order
pub fn year_files(region_dir: &Path) -> Result<Vec<PathBuf>, CombineError> {
    let mut files: Vec<PathBuf> = list_dir(region_dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_year_file(p))
        .collect();
    files.sort();
    Ok(files)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, CombineError> {
    let io_err = |source| CombineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalized_header;
    use tempfile::TempDir;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn normalized_row(org: &str, year: &str, regime: &str, value: &str) -> Vec<String> {
        let mut row = strings(&[org, year, regime]);
        row.extend(std::iter::repeat(value.to_string()).take(normalized_header().len() - 3));
        row
    }

    fn write_year(dir: &Path, name: &str, rows: Vec<Vec<String>>) {
        fs::create_dir_all(dir).unwrap();
        let mut grid = vec![normalized_header()];
        grid.extend(rows);
        table::write_grid(&dir.join(name), &grid).unwrap();
    }

    #[test]
    fn test_schema_diff() {
        let a = strings(&["A", "B", "C"]);
        assert!(schema_diff(&a, &a).is_none());

        let (missing, unexpected) = schema_diff(&a, &strings(&["A", "C", "D"])).unwrap();
        assert_eq!(missing, strings(&["B"]));
        assert_eq!(unexpected, strings(&["D"]));

        // Same columns in a different order still mismatch
        let (missing, unexpected) = schema_diff(&a, &strings(&["B", "A", "C"])).unwrap();
        assert!(missing.is_empty() && unexpected.is_empty());
    }

    #[test]
    fn test_combine_region_orders_years() {
        let tmp = TempDir::new().unwrap();
        let region = tmp.path().join("South_West");
        write_year(&region, "2007_08.csv", vec![normalized_row("South West", "2007-08", "PCT", "2")]);
        write_year(&region, "2006_07.csv", vec![normalized_row("South West", "2006-07", "PCT", "1")]);

        let combiner = Combiner::new(tmp.path(), "England");
        let tables = combiner.combine_region(&region).unwrap().unwrap();
        assert_eq!(tables.rows, 2);
        assert_eq!(tables.year_files, 2);

        let grid = table::read_grid(&tables.combined).unwrap();
        assert_eq!(grid[0][0], "Region");
        assert_eq!(&grid[0][1..], normalized_header().as_slice());
        assert_eq!(grid[1][0], "South West");
        assert_eq!(grid[1][2], "2006-07");
        assert_eq!(grid[2][2], "2007-08");

        let totals = table::read_grid(&tables.totals).unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[1][3], "1");
    }

    #[test]
    fn test_combine_region_rejects_raw_year_file() {
        let tmp = TempDir::new().unwrap();
        let region = tmp.path().join("London");
        fs::create_dir_all(&region).unwrap();
        table::write_grid(
            &region.join("2006_07.csv"),
            &[strings(&["2006-07", ""]), strings(&["Category", "Female_Count"])],
        )
        .unwrap();

        let combiner = Combiner::new(tmp.path(), "England");
        assert!(matches!(
            combiner.combine_region(&region),
            Err(CombineError::NotNormalized(_))
        ));
    }

    #[test]
    fn test_empty_region_skipped() {
        let tmp = TempDir::new().unwrap();
        let region = tmp.path().join("London");
        fs::create_dir_all(&region).unwrap();
        let combiner = Combiner::new(tmp.path(), "England");
        assert!(combiner.combine_region(&region).unwrap().is_none());
    }

    #[test]
    fn test_region_dirs_sorted_and_missing_root() {
        let tmp = TempDir::new().unwrap();
        for name in ["West_Midlands", "East_of_England", "London"] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        fs::write(tmp.path().join("England.csv"), "").unwrap();

        let combiner = Combiner::new(tmp.path(), "England");
        let names: Vec<String> = combiner
            .region_dirs()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["East_of_England", "London", "West_Midlands"]);

        let missing = Combiner::new(tmp.path().join("nope"), "England");
        assert!(matches!(missing.region_dirs(), Err(CombineError::MissingRoot(_))));
    }

    #[test]
    fn test_build_master_without_regions() {
        let tmp = TempDir::new().unwrap();
        let combiner = Combiner::new(tmp.path(), "England");
        fs::write(combiner.master_path(), "stale").unwrap();

        assert!(matches!(combiner.build_master(&[]), Err(CombineError::NoRegions(_))));
        assert!(!combiner.master_path().exists());
    }
}
