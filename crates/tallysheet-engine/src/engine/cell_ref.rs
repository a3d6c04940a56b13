//! Cell addresses: parsing, formatting and scanning.
//!
//! Converts between spreadsheet-style addresses (`A1`, `$B$2`, `AA100`) and
//! 1-based `(row, col)` keys, and finds address-shaped tokens in formula
//! text.
//!
//! # Examples
//!
//! ```
//! use tallysheet_engine::engine::{CellKey, parse_address, format_address};
//!
//! let cell = parse_address("$B3").unwrap();
//! assert_eq!(cell.key, CellKey::new(3, 2));
//! assert!(cell.col_fixed && !cell.row_fixed);
//! assert_eq!(format_address(3, 2), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::lexer::{Token, TokenKind, tokenize};

/// Identity of a cell slot, 1-based. Orders row-major.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellKey {
    pub row: usize,
    pub col: usize,
}

impl CellKey {
    pub fn new(row: usize, col: usize) -> CellKey {
        CellKey { row, col }
    }

    /// Parse an address, ignoring any `$` markers.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellKey> {
        parse_address(name).map(|cell| cell.key)
    }
}

impl std::str::FromStr for CellKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellKey::from_str(s).ok_or_else(|| format!("Invalid cell address: {}", s))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

/// A parsed address: the key plus its `$` markers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct CellRef {
    pub key: CellKey,
    pub row_fixed: bool,
    pub col_fixed: bool,
}

impl CellRef {
    pub fn relative(key: CellKey) -> CellRef {
        CellRef {
            key,
            row_fixed: false,
            col_fixed: false,
        }
    }

    pub fn row(&self) -> usize {
        self.key.row
    }

    pub fn col(&self) -> usize {
        self.key.col
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col_marker = if self.col_fixed { "$" } else { "" };
        let row_marker = if self.row_fixed { "$" } else { "" };
        write!(
            f,
            "{}{}{}{}",
            col_marker,
            col_to_letters(self.key.col),
            row_marker,
            self.key.row
        )
    }
}

fn address_re() -> &'static Regex {
    static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();
    ADDRESS_RE.get_or_init(|| {
        Regex::new(r"^(?<col_fixed>\$)?(?<letters>[A-Za-z]+)(?<row_fixed>\$)?(?<numbers>[0-9]+)$")
            .expect("address regex must compile")
    })
}

/// Parse a complete address such as `A1`, `$A1`, `a$1` or `$AB$12`.
///
/// Returns `None` for trailing garbage, row 0, or a column/row too large to
/// represent.
pub fn parse_address(text: &str) -> Option<CellRef> {
    let caps = address_re().captures(text)?;
    let col = letters_to_col(&caps["letters"])?;
    let row = caps["numbers"].parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some(CellRef {
        key: CellKey::new(row, col),
        row_fixed: caps.name("row_fixed").is_some(),
        col_fixed: caps.name("col_fixed").is_some(),
    })
}

/// Format a 1-based `(row, col)` pair as an address.
pub fn format_address(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row)
}

/// Decode bijective base-26 column letters (A=1 ... Z=26, AA=27).
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// Encode a 1-based column as letters (1 -> A, 26 -> Z, 27 -> AA).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col as u128;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// An address-shaped token found in free text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressToken<'a> {
    pub text: &'a str,
    pub start: usize,
    pub cell: CellRef,
}

/// One entry of [`scan_ranges`]: a single address or a `start:end` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefSpan {
    Cell(CellRef),
    Range(CellRef, CellRef),
}

impl RefSpan {
    /// Normalized `(top-left, bottom-right)` corners.
    pub fn bounds(&self) -> (CellKey, CellKey) {
        match self {
            RefSpan::Cell(cell) => (cell.key, cell.key),
            RefSpan::Range(a, b) => normalize_range(a.key, b.key),
        }
    }
}

/// Order two corners into `(top-left, bottom-right)`.
pub fn normalize_range(a: CellKey, b: CellKey) -> (CellKey, CellKey) {
    (
        CellKey::new(a.row.min(b.row), a.col.min(b.col)),
        CellKey::new(a.row.max(b.row), a.col.max(b.col)),
    )
}

/// Address at `tokens[i]`, unless it is quoted, a function name (followed
/// by an opening bracket) or already carries an error tag (`#...#A1`).
fn address_at<'a>(text: &str, tokens: &[Token<'a>], i: usize) -> Option<AddressToken<'a>> {
    let token = tokens.get(i)?;
    if token.kind != TokenKind::AlphaNum {
        return None;
    }
    if tokens.get(i + 1).is_some_and(|next| next.kind == TokenKind::Open) {
        return None;
    }
    if text[..token.start].ends_with('#') {
        return None;
    }
    let cell = parse_address(token.text)?;
    Some(AddressToken {
        text: token.text,
        start: token.start,
        cell,
    })
}

/// Find every address token in `text`, in order of appearance.
pub fn scan_addresses(text: &str) -> Vec<AddressToken<'_>> {
    let tokens = tokenize(text);
    (0..tokens.len())
        .filter_map(|i| address_at(text, &tokens, i))
        .collect()
}

/// Like [`scan_addresses`], but `start:end` pairs are grouped into ranges.
pub fn scan_ranges(text: &str) -> Vec<RefSpan> {
    let tokens = tokenize(text);
    let mut spans = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let Some(first) = address_at(text, &tokens, i) else {
            i += 1;
            continue;
        };
        let colon = tokens.get(i + 1).is_some_and(|t| t.is_symbol(':'));
        if colon && let Some(second) = address_at(text, &tokens, i + 2) {
            spans.push(RefSpan::Range(first.cell, second.cell));
            i += 3;
        } else {
            spans.push(RefSpan::Cell(first.cell));
            i += 1;
        }
    }
    spans
}

/// Parse a range argument: `A1`, `A1:B5`, optionally wrapped in one bracket
/// pair (`[A1:B5]`). Returns the raw endpoints and whether a `:` pair was
/// given.
pub fn parse_range_arg(text: &str) -> Option<(CellKey, CellKey, bool)> {
    let tokens: Vec<Token<'_>> = tokenize(text);
    let inner = match tokens.as_slice() {
        [open, inner @ .., close]
            if open.kind == TokenKind::Open && close.kind == TokenKind::Close =>
        {
            inner
        }
        all => all,
    };
    let single = |t: &Token<'_>| (t.kind == TokenKind::AlphaNum).then(|| parse_address(t.text))?;
    match inner {
        [only] => single(only).map(|cell| (cell.key, cell.key, false)),
        [start, colon, end] if colon.is_symbol(':') => {
            Some((single(start)?.key, single(end)?.key, true))
        }
        _ => None,
    }
}
