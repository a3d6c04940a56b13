//! Rewriting the addresses embedded in formula text.
//!
//! Structural edits (row/column insert and delete) go through
//! [`rebase_formula`]; copy/paste moves go through [`rebase_for_paste`].
//! Both keep every character of the text that is not an address, and
//! leave an address token untouched unless its coordinates change.
//!
//! # Examples
//!
//! ```
//! use tallysheet_engine::engine::rebase_formula;
//!
//! // One row inserted before row 1.
//! assert_eq!(rebase_formula("A1+1", 0, 1, 0, 0, false), "A2+1");
//! // Row 1 deleted: the reference is tagged, not renumbered.
//! assert_eq!(rebase_formula("A1+B2", 0, -1, 0, 0, false), "#ErrRow#A1+B1");
//! ```

use tracing::trace;

use super::cell::ErrorTag;
use super::cell_ref::{AddressToken, CellRef, col_to_letters, scan_addresses};

/// New coordinates of one address, with the tags to prefix it with.
struct Moved {
    row_tag: Option<ErrorTag>,
    col_tag: Option<ErrorTag>,
    row: usize,
    col: usize,
}

impl Moved {
    fn is_unchanged(&self, cell: &CellRef) -> bool {
        self.row_tag.is_none()
            && self.col_tag.is_none()
            && self.row == cell.row()
            && self.col == cell.col()
    }
}

/// Shift addresses for a row/column insert or delete.
///
/// A positive delta inserts: every coordinate greater than `after` moves by
/// the delta. A negative delta deletes the span `after+1 ..= after-delta`:
/// coordinates inside it are tagged with `#ErrRow#`/`#ErrCol#` and keep their
/// numeral, coordinates past it move back by the span length. With
/// `respect_fixed`, `$`-marked coordinates are not shifted (they are still
/// tagged on delete). `$` markers are kept in the text either way.
pub fn rebase_formula(
    text: &str,
    after_row: usize,
    delta_row: isize,
    after_col: usize,
    delta_col: isize,
    respect_fixed: bool,
) -> String {
    rewrite_addresses(text, |cell| {
        let (row_tag, row) = shift_axis(
            cell.row(),
            after_row,
            delta_row,
            respect_fixed && cell.row_fixed,
            ErrorTag::Row,
        );
        let (col_tag, col) = shift_axis(
            cell.col(),
            after_col,
            delta_col,
            respect_fixed && cell.col_fixed,
            ErrorTag::Col,
        );
        Moved {
            row_tag,
            col_tag,
            row,
            col,
        }
    })
}

/// Shift addresses for a copy/paste move by `(delta_row, delta_col)`.
///
/// `$`-marked coordinates never move. A coordinate that would end up at 0
/// or below keeps its original value and the address gets the row or
/// column error tag, so the source reference can still be read back.
pub fn rebase_for_paste(text: &str, delta_row: isize, delta_col: isize) -> String {
    rewrite_addresses(text, |cell| {
        let (row_tag, row) = move_axis(cell.row(), delta_row, cell.row_fixed, ErrorTag::Row);
        let (col_tag, col) = move_axis(cell.col(), delta_col, cell.col_fixed, ErrorTag::Col);
        Moved {
            row_tag,
            col_tag,
            row,
            col,
        }
    })
}

fn shift_axis(
    coord: usize,
    after: usize,
    delta: isize,
    fixed: bool,
    tag: ErrorTag,
) -> (Option<ErrorTag>, usize) {
    if delta > 0 {
        if coord > after && !fixed {
            return (None, coord.saturating_add(delta.unsigned_abs()));
        }
        return (None, coord);
    }
    if delta < 0 {
        let span = delta.unsigned_abs();
        let last_deleted = after.saturating_add(span);
        if coord > after && coord <= last_deleted {
            return (Some(tag), coord);
        }
        if coord > last_deleted && !fixed {
            return (None, coord - span);
        }
    }
    (None, coord)
}

fn move_axis(coord: usize, delta: isize, fixed: bool, tag: ErrorTag) -> (Option<ErrorTag>, usize) {
    if fixed {
        return (None, coord);
    }
    match coord.checked_add_signed(delta) {
        Some(moved) if moved > 0 => (None, moved),
        _ => (Some(tag), coord),
    }
}

/// Replace each address token whose rewrite differs from the original.
fn rewrite_addresses(text: &str, mut rewrite: impl FnMut(&CellRef) -> Moved) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for token in scan_addresses(text) {
        let moved = rewrite(&token.cell);
        if moved.is_unchanged(&token.cell) {
            continue;
        }
        let replacement = render(&token, &moved);
        trace!(from = token.text, to = %replacement, "rebased address");
        out.push_str(&text[last..token.start]);
        out.push_str(&replacement);
        last = token.start + token.text.len();
    }
    out.push_str(&text[last..]);
    out
}

fn render(token: &AddressToken<'_>, moved: &Moved) -> String {
    let mut out = String::new();
    if let Some(tag) = moved.row_tag {
        out.push_str(tag.as_str());
    }
    if let Some(tag) = moved.col_tag {
        out.push_str(tag.as_str());
    }
    if token.cell.col_fixed {
        out.push('$');
    }
    out.push_str(&col_to_letters(moved.col));
    if token.cell.row_fixed {
        out.push('$');
    }
    out.push_str(&moved.row.to_string());
    out
}
