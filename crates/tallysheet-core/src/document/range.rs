//! Block commands: copy, clear, strip error tags, fill with numbers.

use super::Document;
use super::ops::check_key;
use crate::error::{Result, SheetError};
use std::collections::HashMap;
use tallysheet_engine::engine::{
    CellContent, CellKey, ErrorTag, format_number, normalize_range, rebase_for_paste,
};

impl Document {
    /// Copy the block `src_start..=src_end` onto `dst_start..=dst_end`.
    ///
    /// A smaller source is tiled to fill the destination; a bigger one is
    /// clipped. Without `dst_end`, the destination has the source's shape.
    /// Blank source cells clear their destination. With `adjust`, formula
    /// addresses move by the distance each cell travels. Returns the number
    /// of cells written.
    pub fn copy_range(
        &mut self,
        src_start: CellKey,
        src_end: CellKey,
        dst_start: CellKey,
        dst_end: Option<CellKey>,
        adjust: bool,
    ) -> Result<usize> {
        let (src_start, src_end) = self.checked_range(src_start, src_end)?;
        let dst_end = dst_end.unwrap_or_else(|| {
            CellKey::new(
                dst_start.row + (src_end.row - src_start.row),
                dst_start.col + (src_end.col - src_start.col),
            )
        });
        let (dst_start, dst_end) = self.checked_range(dst_start, dst_end)?;

        // Snapshot first so overlapping blocks read the original content.
        let source: HashMap<CellKey, CellContent> = self
            .sheet
            .keys_in(src_start, src_end)
            .into_iter()
            .filter_map(|key| self.sheet.content(key).map(|content| (key, content.clone())))
            .collect();

        let src_rows = src_end.row - src_start.row + 1;
        let src_cols = src_end.col - src_start.col + 1;
        let mut updates = Vec::new();
        let mut written = 0;
        for (r, row) in (dst_start.row..=dst_end.row).enumerate() {
            for (c, col) in (dst_start.col..=dst_end.col).enumerate() {
                let from = CellKey::new(src_start.row + r % src_rows, src_start.col + c % src_cols);
                let to = CellKey::new(row, col);
                let content = source.get(&from).cloned().map(|content| match content {
                    CellContent::Formula(expr) if adjust => {
                        let delta_row = to.row as isize - from.row as isize;
                        let delta_col = to.col as isize - from.col as isize;
                        CellContent::Formula(rebase_for_paste(&expr, delta_row, delta_col))
                    }
                    other => other,
                });
                if content.is_some() {
                    written += 1;
                }
                updates.push((to, content));
            }
        }
        self.sheet.set_contents(updates);
        self.grow_to(dst_end);
        self.modified = true;
        Ok(written)
    }

    /// Remove every cell in the block. Returns how many were removed.
    pub fn clear_range(&mut self, start: CellKey, end: CellKey) -> Result<usize> {
        let (start, end) = self.checked_range(start, end)?;
        let keys = self.sheet.keys_in(start, end);
        let cleared = keys.len();
        self.sheet.set_contents(keys.into_iter().map(|key| (key, None)));
        if cleared > 0 {
            self.modified = true;
        }
        Ok(cleared)
    }

    /// Strip a leading error tag (and its `:` separator) from text cells in
    /// the block, so a loop-tagged formula becomes a formula again. Returns
    /// how many cells changed.
    pub fn clear_error_tags(&mut self, start: CellKey, end: CellKey) -> Result<usize> {
        let (start, end) = self.checked_range(start, end)?;
        let mut updates = Vec::new();
        for key in self.sheet.keys_in(start, end) {
            let Some(CellContent::Text(text)) = self.sheet.content(key) else {
                continue;
            };
            let Some((_, rest)) = ErrorTag::strip_prefix(text) else {
                continue;
            };
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            updates.push((key, CellContent::from_input(rest)));
        }
        let changed = updates.len();
        self.sheet.set_contents(updates);
        if changed > 0 {
            self.modified = true;
        }
        Ok(changed)
    }

    /// Fill the block row-major with `first`, `first + step`, ...
    pub fn fill_numbers(
        &mut self,
        start: CellKey,
        end: CellKey,
        first: f64,
        step: f64,
    ) -> Result<usize> {
        let (start, end) = self.checked_range(start, end)?;
        let mut updates = Vec::new();
        let mut value = first;
        for row in start.row..=end.row {
            for col in start.col..=end.col {
                let content = CellContent::from_input(&format_number(value, None));
                updates.push((CellKey::new(row, col), content));
                value += step;
            }
        }
        let filled = updates.len();
        self.sheet.set_contents(updates);
        self.grow_to(end);
        self.modified = true;
        Ok(filled)
    }

    /// Normalize a block and check it is addressable and not too large.
    fn checked_range(&self, a: CellKey, b: CellKey) -> Result<(CellKey, CellKey)> {
        check_key(a)?;
        check_key(b)?;
        let (start, end) = normalize_range(a, b);
        let cells = (end.row - start.row + 1).checked_mul(end.col - start.col + 1);
        match cells {
            Some(n) if n <= self.config.engine.max_range_cells => Ok((start, end)),
            _ => Err(SheetError::InvalidRange(format!("{}:{} is too large", start, end))),
        }
    }
}
