use super::{Clipboard, Document};
use crate::error::{Result, SheetError};
use tallysheet_engine::engine::{CellContent, CellKey, Grid, rebase_for_paste, rebase_formula};
use tracing::info;

/// Dimension for row/column operations
#[derive(Copy, Clone, Debug)]
enum Dimension {
    Row,
    Column,
}

impl Dimension {
    /// Get the coordinate value from a CellKey for this dimension
    fn get_coord(&self, key: &CellKey) -> usize {
        match self {
            Dimension::Row => key.row,
            Dimension::Column => key.col,
        }
    }

    /// Create a new CellKey with modified coordinate in this dimension
    fn with_coord(&self, key: &CellKey, coord: usize) -> CellKey {
        match self {
            Dimension::Row => CellKey::new(coord, key.col),
            Dimension::Column => CellKey::new(key.row, coord),
        }
    }

    /// Rewrite a formula for a shift of `delta` after `after` on this axis.
    fn rebase(&self, expr: &str, after: usize, delta: isize) -> String {
        match self {
            Dimension::Row => rebase_formula(expr, after, delta, 0, 0, false),
            Dimension::Column => rebase_formula(expr, 0, 0, after, delta, false),
        }
    }
}

/// Which side of the current row/column an insert goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

impl Document {
    /// Store user input in a cell. Empty input clears it. Input containing
    /// a line break is rejected.
    pub fn set_cell_from_input(&mut self, key: CellKey, input: &str) -> Result<()> {
        check_key(key)?;
        if input.contains(['\n', '\r']) {
            return Err(SheetError::LineBreak(key.to_string()));
        }
        self.sheet.set_cell(key, input);
        if !input.is_empty() {
            self.grow_to(key);
        }
        self.modified = true;
        Ok(())
    }

    /// Clear the specified cell
    pub fn clear_cell(&mut self, key: CellKey) -> Option<CellContent> {
        let old = self.sheet.clear_cell(key);
        if old.is_some() {
            self.modified = true;
        }
        old
    }

    /// Copy a cell to the clipboard. Copying an empty cell leaves the
    /// clipboard unchanged and returns false.
    pub fn copy_cell(&mut self, key: CellKey) -> bool {
        match self.sheet.content(key) {
            Some(content) => {
                self.clipboard = Some(Clipboard {
                    source: key,
                    content: content.clone(),
                });
                true
            }
            None => false,
        }
    }

    pub fn cut_cell(&mut self, key: CellKey) -> bool {
        if !self.copy_cell(key) {
            return false;
        }
        self.clear_cell(key);
        true
    }

    /// Paste the clipboard into `key`. With `adjust`, addresses in a copied
    /// formula move by the distance between the source and `key`.
    pub fn paste_cell(&mut self, key: CellKey, adjust: bool) -> Result<()> {
        check_key(key)?;
        let clip = self.clipboard.clone().ok_or(SheetError::NothingToPaste)?;
        let content = match clip.content {
            CellContent::Formula(expr) if adjust => {
                let delta_row = key.row as isize - clip.source.row as isize;
                let delta_col = key.col as isize - clip.source.col as isize;
                CellContent::Formula(rebase_for_paste(&expr, delta_row, delta_col))
            }
            other => other,
        };
        self.sheet.set_content(key, Some(content));
        self.grow_to(key);
        self.modified = true;
        Ok(())
    }

    /// Insert `count` empty rows before or after `at`.
    pub fn insert_rows(&mut self, at: usize, placement: Placement, count: usize) -> Result<()> {
        self.insert_dimension(Dimension::Row, at, placement, count)
    }

    /// Insert `count` empty columns before or after `at`.
    pub fn insert_cols(&mut self, at: usize, placement: Placement, count: usize) -> Result<()> {
        self.insert_dimension(Dimension::Column, at, placement, count)
    }

    /// Delete `count` rows starting at `at`, clamped to the sheet. Returns
    /// how many rows were deleted.
    pub fn delete_rows(&mut self, at: usize, count: usize) -> Result<usize> {
        self.delete_dimension(Dimension::Row, at, count)
    }

    /// Delete `count` columns starting at `at`, clamped to the sheet.
    pub fn delete_cols(&mut self, at: usize, count: usize) -> Result<usize> {
        self.delete_dimension(Dimension::Column, at, count)
    }

    fn insert_dimension(
        &mut self,
        dim: Dimension,
        at: usize,
        placement: Placement,
        count: usize,
    ) -> Result<()> {
        if at == 0 {
            return Err(SheetError::InvalidAddress(format!("{:?} 0", dim)));
        }
        if count == 0 {
            return Err(SheetError::InvalidCount(count));
        }
        let after = match placement {
            Placement::Before => at - 1,
            Placement::After => at,
        };
        let delta = count as isize;

        let grid: Grid = self
            .sheet
            .cells()
            .map(|(key, content)| {
                let coord = dim.get_coord(key);
                let new_key = if coord > after {
                    dim.with_coord(key, coord + count)
                } else {
                    *key
                };
                (new_key, rebase_content(dim, content, after, delta))
            })
            .collect();
        self.sheet.replace_all(grid);

        match dim {
            Dimension::Row => self.num_rows += count,
            Dimension::Column => self.num_cols += count,
        }
        self.modified = true;
        info!(dimension = ?dim, after, count, "inserted");
        Ok(())
    }

    fn delete_dimension(&mut self, dim: Dimension, at: usize, count: usize) -> Result<usize> {
        if at == 0 {
            return Err(SheetError::InvalidAddress(format!("{:?} 0", dim)));
        }
        if count == 0 {
            return Err(SheetError::InvalidCount(count));
        }
        let limit = match dim {
            Dimension::Row => self.num_rows,
            Dimension::Column => self.num_cols,
        };
        if at > limit {
            return Ok(0);
        }
        let last = at.saturating_add(count - 1).min(limit);
        let count = last - at + 1;
        let after = at - 1;
        let delta = -(count as isize);

        let grid: Grid = self
            .sheet
            .cells()
            .filter_map(|(key, content)| {
                let coord = dim.get_coord(key);
                let new_key = if coord < at {
                    *key
                } else if coord > last {
                    dim.with_coord(key, coord - count)
                } else {
                    return None;
                };
                Some((new_key, rebase_content(dim, content, after, delta)))
            })
            .collect();
        self.sheet.replace_all(grid);

        match dim {
            Dimension::Row => self.num_rows -= count,
            Dimension::Column => self.num_cols -= count,
        }
        self.modified = true;
        info!(dimension = ?dim, at, count, "deleted");
        Ok(count)
    }
}

fn rebase_content(
    dim: Dimension,
    content: &CellContent,
    after: usize,
    delta: isize,
) -> CellContent {
    match content {
        CellContent::Formula(expr) => CellContent::Formula(dim.rebase(expr, after, delta)),
        other => other.clone(),
    }
}

pub(crate) fn check_key(key: CellKey) -> Result<()> {
    if key.row == 0 || key.col == 0 {
        return Err(SheetError::InvalidAddress(format!("({}, {})", key.row, key.col)));
    }
    Ok(())
}
