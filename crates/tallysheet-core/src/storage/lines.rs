//! Reader and writer for the row-per-line sheet format.
//!
//! A field that contains the separator, or starts with the quote char, is
//! wrapped in quote chars with inner quote chars doubled. Empty fields are
//! absent cells. Reading reverses the writer exactly for content without
//! line breaks, which documents refuse at input.

use tallysheet_engine::engine::CellKey;

use crate::config::StorageConfig;
use crate::error::{Result, SheetError};

/// Cells read from a sheet file, with the row and column counts it spans.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedSheet {
    pub cells: Vec<(CellKey, String)>,
    pub num_rows: usize,
    pub num_cols: usize,
}

/// Quote `field` if it would not survive a round trip as written.
pub fn escape_field(field: &str, config: &StorageConfig) -> String {
    if !field.contains(config.field_sep) && !field.starts_with(config.quote) {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    out.push(config.quote);
    for ch in field.chars() {
        if ch == config.quote {
            out.push(config.quote);
        }
        out.push(ch);
    }
    out.push(config.quote);
    out
}

/// Split one line into unescaped fields.
///
/// Errors carry no line number; [`read_sheet`] adds it.
pub fn parse_line(line: &str, config: &StorageConfig) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        let mut field = String::new();
        if chars.peek() == Some(&config.quote) {
            chars.next();
            loop {
                match chars.next() {
                    Some(c) if c == config.quote => {
                        if chars.peek() == Some(&config.quote) {
                            chars.next();
                            field.push(c);
                        } else {
                            break;
                        }
                    }
                    Some(c) => field.push(c),
                    None => return Err(format!("unterminated quoted field {:?}", field)),
                }
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(c) if c == config.field_sep => fields.push(field),
                Some(c) => return Err(format!("unexpected {:?} after quoted field", c)),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(c) if c == config.field_sep => break,
                    Some(c) => field.push(c),
                }
            }
            fields.push(field);
        }
    }
}

/// Parse a whole sheet file.
pub fn read_sheet(content: &str, config: &StorageConfig) -> Result<ParsedSheet> {
    let mut sheet = ParsedSheet::default();
    for (index, line) in content.lines().enumerate() {
        let row = index + 1;
        let fields = parse_line(line, config)
            .map_err(|message| SheetError::Parse { line: row, message })?;
        sheet.num_rows = row;
        sheet.num_cols = sheet.num_cols.max(fields.len());
        for (index, field) in fields.into_iter().enumerate() {
            if !field.is_empty() {
                sheet.cells.push((CellKey::new(row, index + 1), field));
            }
        }
    }
    Ok(sheet)
}

/// Render cells as a sheet file covering `num_rows` x `num_cols`, grown to
/// fit every cell given.
pub fn write_sheet<S: AsRef<str>>(
    cells: impl IntoIterator<Item = (CellKey, S)>,
    num_rows: usize,
    num_cols: usize,
    config: &StorageConfig,
) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut num_cols = num_cols;
    for (key, text) in cells {
        if rows.len() < key.row {
            rows.resize_with(key.row, Vec::new);
        }
        let row = &mut rows[key.row - 1];
        if row.len() < key.col {
            row.resize(key.col, String::new());
        }
        row[key.col - 1] = escape_field(text.as_ref(), config);
        num_cols = num_cols.max(key.col);
    }
    rows.resize_with(rows.len().max(num_rows), Vec::new);

    let sep = config.field_sep.to_string();
    let mut out = String::new();
    for mut row in rows {
        row.resize(num_cols, String::new());
        out.push_str(&row.join(&sep));
        out.push('\n');
    }
    out
}
