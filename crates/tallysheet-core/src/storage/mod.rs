//! Plain-text sheet files: one line per row, fields split by a separator.

mod lines;

pub use lines::{ParsedSheet, escape_field, parse_line, read_sheet, write_sheet};
