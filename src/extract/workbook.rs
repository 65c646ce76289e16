/// Workbook access through calamine
///
/// Reads the regional sheet (always the second sheet, whatever its name) into
/// a plain text grid with absolute row/column positions.
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::debug;

use super::ExtractError;
use crate::table::Grid;

/// Position of the regional table among the workbook's sheets
pub const REGIONAL_SHEET_INDEX: usize = 1;

/// Open a workbook and read its regional sheet.
/// Returns the sheet name with the grid.
pub fn read_regional_sheet(path: &Path) -> Result<(String, Grid), ExtractError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractError::WorkbookOpen(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_owned();
    debug!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

    let sheet_name = match sheet_names.get(REGIONAL_SHEET_INDEX) {
        Some(name) => name.clone(),
        None => {
            return Err(ExtractError::MissingSheet {
                file: path.display().to_string(),
                sheets: sheet_names.len(),
            })
        }
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExtractError::SheetRead {
            sheet: sheet_name.clone(),
            msg: e.to_string(),
        })?;

    Ok((sheet_name, range_to_grid(&range)))
}

/// Convert a calamine range into rows of text.
///
/// calamine trims leading empty rows and columns from a range; they are
/// padded back so that grid positions match sheet positions.
pub fn range_to_grid(range: &Range<Data>) -> Grid {
    let (start_row, start_col) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Vec::new(),
    };

    let mut grid: Grid = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col];
        cells.extend(row.iter().map(cell_text));
        grid.push(cells);
    }
    grid
}

/// Text form of a cell. Whole floats lose their trailing `.0` so counts
/// stored as floats read as integers.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}
