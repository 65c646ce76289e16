/// Year-block segmentation of a regional sheet
///
/// Below the title rows, a regional sheet stacks one block per financial year,
/// separated by one or more fully blank rows. `YearBlocks` walks the rows
/// lazily and yields each block as a borrowed slice. Cloning the iterator
/// restarts from the same position, so the same sheet can be scanned twice
/// without copying it.
use crate::table::is_blank_row;

/// Contiguous non-blank rows bounded by blank separator rows
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    /// Zero-based sheet row index of the first row in the block
    pub first_row: usize,
    pub rows: &'a [Vec<String>],
}

impl<'a> Block<'a> {
    /// 1-based sheet row number of the block row at `offset`
    pub fn sheet_row(&self, offset: usize) -> usize {
        self.first_row + offset + 1
    }
}

#[derive(Debug, Clone)]
pub struct YearBlocks<'a> {
    rows: &'a [Vec<String>],
    pos: usize,
    row_offset: usize,
}

impl<'a> YearBlocks<'a> {
    /// `row_offset` is the sheet row index of `rows[0]`, used for
    /// error messages that point back into the workbook.
    pub fn new(rows: &'a [Vec<String>], row_offset: usize) -> Self {
        Self {
            rows,
            pos: 0,
            row_offset,
        }
    }
}

impl<'a> Iterator for YearBlocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.rows.len() && is_blank_row(&self.rows[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= self.rows.len() {
            return None;
        }

        let start = self.pos;
        while self.pos < self.rows.len() && !is_blank_row(&self.rows[self.pos]) {
            self.pos += 1;
        }

        Some(Block {
            first_row: self.row_offset + start,
            rows: &self.rows[start..self.pos],
        })
    }
}

/// Fill blank cells with the nearest non-blank cell to their left,
/// starting at column `from`. Cells before the first label stay blank.
pub fn fill_right(row: &[String], from: usize) -> Vec<String> {
    let mut current: Option<&str> = None;
    row.iter()
        .enumerate()
        .map(|(col, cell)| {
            if col < from {
                return cell.clone();
            }
            let trimmed = cell.trim();
            if !trimmed.is_empty() {
                current = Some(trimmed);
            }
            current.unwrap_or("").to_string()
        })
        .collect()
}

/// Fill blank cells in column `col` with the nearest non-blank cell above.
/// Returns the index of the first row that has no label above it, if any.
pub fn fill_down(rows: &mut [Vec<String>], col: usize) -> Result<(), usize> {
    let mut current: Option<String> = None;
    for (idx, row) in rows.iter_mut().enumerate() {
        if row.len() <= col {
            row.resize(col + 1, String::new());
        }
        let cell = row[col].trim();
        if cell.is_empty() {
            match &current {
                Some(label) => row[col] = label.clone(),
                None => return Err(idx),
            }
        } else {
            let label = cell.to_string();
            row[col] = label.clone();
            current = Some(label);
        }
    }
    Ok(())
}
