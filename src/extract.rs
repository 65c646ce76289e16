// Extractor: raw regional workbooks -> one raw year-file per financial year
//
// The regional table sits on the second sheet of each workbook. Rows 1-6 are
// titles and legends. Below them, each financial year is a block of rows:
// - group row: financial-year label in column A, merged `Rate` cell over the rate columns
// - metric row: `Female` / `Male` / `Total` per column (column B may be `Organisation`)
// - data rows: injury category in column A (merged down), six values
// Blocks are separated by blank rows.

pub mod blocks;
pub mod headers;
pub mod workbook;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::regime::FinancialYear;
use crate::schema::ORGANISATION;
use crate::table::{self, Grid, TableError};
use crate::utils::region_slug_from_file_name;
use blocks::{fill_down, fill_right, Block, YearBlocks};
use headers::relabel;

/// Number of title/legend rows at the top of every regional sheet
pub const TITLE_ROWS: usize = 6;

/// Label written to column A of the metric row
pub const CATEGORY_HEADER: &str = "Category";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Workbook {file} has {sheets} sheet(s); the regional table is expected on sheet 2")]
    MissingSheet { file: String, sheets: usize },

    #[error("Failed to read sheet {sheet}: {msg}")]
    SheetRead { sheet: String, msg: String },

    #[error("Cannot derive a region from file name {file}: {reason}")]
    UnrecognisedFileName { file: String, reason: &'static str },

    #[error("Region {0} was already produced by another workbook in this run")]
    DuplicateRegion(String),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Problems with the structure of a year-block. Row numbers are 1-based
/// sheet rows.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Year-block {year} at row {row} has no metric header row")]
    MissingHeaderRow { year: String, row: usize },

    #[error("Unparseable header at row {row}: {msg}")]
    UnparseableLayout { row: usize, msg: String },

    #[error("Data row {row} has no category label above it")]
    MissingCategoryLabel { row: usize },

    #[error("Financial year {year} appears twice (second block at row {row})")]
    DuplicateYear { year: String, row: usize },
}

/// One year-block, ready to be written as `<YYYY_YY>.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct YearFile {
    pub year: FinancialYear,
    pub rows: Grid,
}

impl YearFile {
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.year.slug())
    }
}

/// Result of splitting a sheet into year-files
#[derive(Debug, Clone, Default)]
pub struct SplitSheet {
    pub year_files: Vec<YearFile>,
    /// Sheet rows (1-based) of blocks without a financial-year label
    pub skipped_blocks: Vec<usize>,
}

/// What one workbook produced
#[derive(Debug, Clone)]
pub struct Extraction {
    pub region: String,
    pub year_files: Vec<PathBuf>,
    pub skipped_blocks: Vec<usize>,
}

/// Rewrites the long "Other disorders (encephalitis, ...)" label to a single token
pub fn normalize_text(cell: &str) -> Option<&'static str> {
    cell.trim()
        .starts_with("Other disorders")
        .then_some("Other_disorders")
}

/// Split a regional sheet (title rows included) into year-files.
pub fn split_year_files(sheet: &[Vec<String>]) -> Result<SplitSheet, LayoutError> {
    let body: Grid = sheet
        .iter()
        .skip(TITLE_ROWS)
        .map(|row| {
            row.iter()
                .map(|cell| match normalize_text(cell) {
                    Some(token) => token.to_string(),
                    None => cell.clone(),
                })
                .collect()
        })
        .collect();

    let mut split = SplitSheet::default();
    let mut seen: HashSet<FinancialYear> = HashSet::new();

    for block in YearBlocks::new(&body, TITLE_ROWS) {
        match build_year_file(&block)? {
            Some(year_file) => {
                if !seen.insert(year_file.year) {
                    return Err(LayoutError::DuplicateYear {
                        year: year_file.year.label(),
                        row: block.sheet_row(0),
                    });
                }
                debug!(
                    "Found year-block {} at row {} with {} data rows",
                    year_file.year,
                    block.sheet_row(0),
                    year_file.rows.len().saturating_sub(2)
                );
                split.year_files.push(year_file);
            }
            None => {
                warn!(
                    "Skipping block at row {}: no financial-year label in column A",
                    block.sheet_row(0)
                );
                split.skipped_blocks.push(block.sheet_row(0));
            }
        }
    }

    Ok(split)
}

/// Turn one block into a year-file. `Ok(None)` for blocks that are not
/// year-blocks (notes, footnotes).
fn build_year_file(block: &Block<'_>) -> Result<Option<YearFile>, LayoutError> {
    let group_row = &block.rows[0];
    let year = match group_row.first().and_then(|c| FinancialYear::parse(c)) {
        Some(year) => year,
        None => return Ok(None),
    };

    let metric_row = block
        .rows
        .get(1)
        .ok_or_else(|| LayoutError::MissingHeaderRow {
            year: year.label(),
            row: block.sheet_row(0),
        })?;

    let has_org_column = metric_row
        .get(1)
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(ORGANISATION));
    let metric_start = if has_org_column { 2 } else { 1 };

    let width = block.rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut padded_group = group_row.clone();
    padded_group.resize(width, String::new());
    let groups = fill_right(&padded_group, metric_start);

    let mut header = vec![CATEGORY_HEADER.to_string()];
    if has_org_column {
        header.push(ORGANISATION.to_string());
    }

    let mut last_metric_col = None;
    for col in metric_start..width {
        let group = groups.get(col).map(String::as_str).unwrap_or("");
        let metric = metric_row.get(col).map(|c| c.trim()).unwrap_or("");
        if metric.is_empty() {
            // Trailing or spacer column; kept blank
            header.push(String::new());
            continue;
        }
        let label = relabel(group, metric).ok_or_else(|| LayoutError::UnparseableLayout {
            row: block.sheet_row(1),
            msg: format!("column {} header {metric:?} names no gender", col + 1),
        })?;
        header.push(label);
        last_metric_col = Some(col);
    }

    let last_metric_col = last_metric_col.ok_or_else(|| LayoutError::UnparseableLayout {
        row: block.sheet_row(1),
        msg: "no Female/Male/Total columns".to_string(),
    })?;
    let out_width = last_metric_col + 1;
    header.truncate(out_width);

    let mut data: Grid = block.rows[2..]
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = row.iter().take(out_width).cloned().collect();
            cells.resize(out_width, String::new());
            cells
        })
        .collect();

    fill_down(&mut data, 0).map_err(|idx| LayoutError::MissingCategoryLabel {
        row: block.sheet_row(idx + 2),
    })?;

    let mut title = vec![year.label()];
    title.resize(out_width, String::new());

    let mut rows = Vec::with_capacity(data.len() + 2);
    rows.push(title);
    rows.push(header);
    rows.extend(data);

    Ok(Some(YearFile { year, rows }))
}

/// Writes year-files for each workbook into `<output_root>/<Region>/`
pub struct Extractor {
    output_root: PathBuf,
}

impl Extractor {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Region slug for a workbook path
    pub fn region_for(path: &Path) -> Result<String, ExtractError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        region_slug_from_file_name(file_name).map_err(|reason| ExtractError::UnrecognisedFileName {
            file: file_name.to_string(),
            reason,
        })
    }

    /// Extract one workbook
    #[instrument(skip(self), fields(workbook = %path.display()))]
    pub fn extract_workbook(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let region = Self::region_for(path)?;
        let (sheet_name, grid) = workbook::read_regional_sheet(path)?;
        info!(
            "Read sheet '{}' ({} rows) for region {}",
            sheet_name,
            grid.len(),
            region
        );
        self.extract_grid(&region, &grid)
    }

    /// Split an already-loaded sheet grid and write its year-files.
    ///
    /// The region directory is replaced once the sheet has parsed. A sheet
    /// with no year-blocks leaves the directory empty, so year-files from an
    /// earlier run never outlive the workbook that produced them. A layout
    /// error leaves earlier output untouched.
    pub fn extract_grid(&self, region: &str, sheet: &[Vec<String>]) -> Result<Extraction, ExtractError> {
        let split = split_year_files(sheet)?;

        let region_dir = self.output_root.join(region);
        self.reset_region_dir(&region_dir)?;

        if split.year_files.is_empty() {
            warn!("No year-blocks found for region {}", region);
            return Ok(Extraction {
                region: region.to_string(),
                year_files: Vec::new(),
                skipped_blocks: split.skipped_blocks,
            });
        }

        let mut written = Vec::with_capacity(split.year_files.len());
        for year_file in &split.year_files {
            let path = region_dir.join(year_file.file_name());
            table::write_grid(&path, &year_file.rows)?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        info!("Extracted {} year-files for region {}", written.len(), region);
        Ok(Extraction {
            region: region.to_string(),
            year_files: written,
            skipped_blocks: split.skipped_blocks,
        })
    }

    fn reset_region_dir(&self, region_dir: &Path) -> Result<(), ExtractError> {
        let io_err = |source| ExtractError::Io {
            path: region_dir.to_path_buf(),
            source,
        };
        if region_dir.exists() {
            fs::remove_dir_all(region_dir).map_err(io_err)?;
        }
        fs::create_dir_all(region_dir).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn titled(mut body: Grid) -> Grid {
        let mut sheet = vec![row(&["Title"]), row(&[]), row(&["Legend"]), row(&[]), row(&[]), row(&["Source"])];
        sheet.append(&mut body);
        sheet
    }

    fn block(year: &str, data: &[&[&str]]) -> Grid {
        let mut rows = vec![
            row(&[year, "", "", "", "Rate", "", ""]),
            row(&["Category", "Female", "Male", "Total", "Female", "Male", "Total"]),
        ];
        rows.extend(data.iter().map(|r| row(r)));
        rows
    }

    #[test]
    fn test_title_rows_dropped_even_when_they_look_like_data() {
        let mut sheet = titled(block("2006-07", &[&["All ABI", "1", "2", "3", "0.1", "0.2", "0.3"]]));
        sheet[0] = row(&["2005-06", "", "", "", "Rate"]);
        let split = split_year_files(&sheet).unwrap();
        assert_eq!(split.year_files.len(), 1);
        assert_eq!(split.year_files[0].year, FinancialYear::new(2006));
    }

    #[test]
    fn test_metric_row_relabelled() {
        let sheet = titled(block("2006-07", &[&["All ABI", "1", "2", "3", "0.1", "0.2", "0.3"]]));
        let split = split_year_files(&sheet).unwrap();
        let rows = &split.year_files[0].rows;
        assert_eq!(rows[0], row(&["2006-07", "", "", "", "", "", ""]));
        assert_eq!(
            rows[1],
            row(&[
                "Category",
                "Female_Count",
                "Male_Count",
                "Total_Count",
                "Female_Rate",
                "Male_Rate",
                "Total_Rate"
            ])
        );
    }

    #[test]
    fn test_other_disorders_rewritten() {
        let sheet = titled(block(
            "2006-07",
            &[&["Other disorders (encephalitis, etc.)", "1", "2", "3", "4", "5", "6"]],
        ));
        let split = split_year_files(&sheet).unwrap();
        assert_eq!(split.year_files[0].rows[2][0], "Other_disorders");
    }

    #[test]
    fn test_note_blocks_skipped() {
        let mut body = block("2006-07", &[&["All ABI", "1", "2", "3", "4", "5", "6"]]);
        body.push(row(&[]));
        body.push(row(&["Note: rates per 100,000 population"]));
        let split = split_year_files(&titled(body)).unwrap();
        assert_eq!(split.year_files.len(), 1);
        assert_eq!(split.skipped_blocks, vec![11]);
    }

    #[test]
    fn test_block_without_metric_row() {
        let body = vec![row(&["2006-07", "", "", "", "Rate"])];
        let err = split_year_files(&titled(body)).unwrap_err();
        assert_eq!(
            err,
            LayoutError::MissingHeaderRow {
                year: "2006-07".to_string(),
                row: 7
            }
        );
    }

    #[test]
    fn test_metric_row_without_genders() {
        let body = vec![
            row(&["2006-07", "", "Rate"]),
            row(&["Category", "Persons", "Persons"]),
            row(&["All ABI", "1", "2"]),
        ];
        assert!(matches!(
            split_year_files(&titled(body)),
            Err(LayoutError::UnparseableLayout { row: 8, .. })
        ));
    }

    #[test]
    fn test_data_row_before_any_label() {
        let body = block("2006-07", &[&["", "1", "2", "3", "4", "5", "6"]]);
        assert_eq!(
            split_year_files(&titled(body)).unwrap_err(),
            LayoutError::MissingCategoryLabel { row: 9 }
        );
    }

    #[test]
    fn test_duplicate_year() {
        let mut body = block("2006-07", &[&["All ABI", "1", "2", "3", "4", "5", "6"]]);
        body.push(row(&[]));
        body.extend(block("2006/07", &[&["All ABI", "1", "2", "3", "4", "5", "6"]]));
        assert!(matches!(
            split_year_files(&titled(body)),
            Err(LayoutError::DuplicateYear { .. })
        ));
    }

    #[test]
    fn test_organisation_column_kept() {
        let body = vec![
            row(&["2014-15", "", "", "", "", "Rate", "", ""]),
            row(&["Category", "Organisation", "Female", "Male", "Total", "Female", "Male", "Total"]),
            row(&["Stroke", "NHS Bristol CCG", "1", "2", "3", "4", "5", "6"]),
            row(&["", "NHS Devon CCG", "7", "8", "9", "10", "11", "12"]),
        ];
        let split = split_year_files(&titled(body)).unwrap();
        let rows = &split.year_files[0].rows;
        assert_eq!(rows[1][1], "Organisation");
        assert_eq!(rows[1][2], "Female_Count");
        assert_eq!(rows[1][5], "Female_Rate");
        assert_eq!(rows[3][0], "Stroke");
        assert_eq!(rows[3][1], "NHS Devon CCG");
    }

    #[test]
    fn test_trailing_empty_columns_trimmed() {
        let body = vec![
            row(&["2006-07", "", "", "", "Rate", "", "", "", ""]),
            row(&["Category", "Female", "Male", "Total", "Female", "Male", "Total", "", ""]),
            row(&["All ABI", "1", "2", "3", "4", "5", "6", "", "stray"]),
        ];
        let split = split_year_files(&titled(body)).unwrap();
        assert!(split.year_files[0].rows.iter().all(|r| r.len() == 7));
    }

    #[test]
    fn test_unrecognised_file_name() {
        let result = Extractor::region_for(Path::new("england_data/residents-abi.xlsx"));
        assert!(matches!(result, Err(ExtractError::UnrecognisedFileName { .. })));
    }
}
