//! Headerless CSV grids shared by every pipeline stage.
//!
//! Intermediate files carry multi-row headers, so they are read and written
//! as plain rows of text rather than through serde records.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A sheet or CSV file as rows of cell text
pub type Grid = Vec<Vec<String>>;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read every row of a CSV file without treating any row as a header.
/// Rows may have differing lengths.
pub fn read_grid(path: &Path) -> Result<Grid, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Write rows to `path`, replacing any existing file
pub fn write_grid(path: &Path, rows: &[Vec<String>]) -> Result<(), TableError> {
    let file = fs::File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_rows(file, path, rows)
}

/// Write rows to a temporary file next to `path`, then rename it into place.
/// Readers never observe a partially written file.
pub fn write_grid_atomic(path: &Path, rows: &[Vec<String>]) -> Result<(), TableError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    write_rows(temp.as_file(), path, rows)?;

    temp.persist(path).map_err(|e| TableError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn write_rows<W: Write>(sink: W, path: &Path, rows: &[Vec<String>]) -> Result<(), TableError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(sink);

    for row in rows {
        writer.write_record(row).map_err(|source| TableError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    writer.flush().map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn is_blank_cell(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Parse a metric cell, stripping thousands separators. Blanks, suppression
/// markers (`*`, `..`) and non-finite values yield `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// A row whose cells are all empty or whitespace
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| is_blank_cell(cell))
}

/// Trim every cell, drop fully blank rows and fully blank columns,
/// and pad short rows so every row has the same width.
pub fn tidy(grid: &[Vec<String>]) -> Grid {
    let rows: Vec<Vec<String>> = grid
        .iter()
        .filter(|row| !is_blank_row(row))
        .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| {
            rows.iter()
                .any(|row| row.get(col).is_some_and(|c| !c.is_empty()))
        })
        .collect();

    rows.into_iter()
        .map(|row| {
            keep.iter()
                .map(|&col| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}
