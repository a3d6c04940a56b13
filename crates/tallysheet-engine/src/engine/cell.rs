//! Cell data types.
//!
//! - [`CellContent`] - raw content, classified as formula, numeric literal or text
//! - [`Value`] / [`ErrorTag`] - computed values and their error markers
//! - [`Grid`] - sparse content storage
//! - [`ValueCache`] - memoized values, invalidated through the dependency graph

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::cell_ref::CellKey;

/// Error marker carried by a computed value.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorTag {
    /// A numeric literal failed to parse.
    Num,
    /// A substituted expression failed to evaluate.
    Exc,
    /// The loop guard tripped.
    Loop,
    /// A function outside the allowlist was called.
    PFn,
    /// Reference to a deleted row.
    Row,
    /// Reference to a deleted column.
    Col,
}

impl ErrorTag {
    pub const ALL: [ErrorTag; 6] = [
        ErrorTag::Num,
        ErrorTag::Exc,
        ErrorTag::Loop,
        ErrorTag::PFn,
        ErrorTag::Row,
        ErrorTag::Col,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::Num => "#ErrNum#",
            ErrorTag::Exc => "#ErrExc#",
            ErrorTag::Loop => "#ErrLop#",
            ErrorTag::PFn => "#ErrPFn#",
            ErrorTag::Row => "#ErrRow#",
            ErrorTag::Col => "#ErrCol#",
        }
    }

    /// Split a leading tag off `text`.
    pub fn strip_prefix(text: &str) -> Option<(ErrorTag, &str)> {
        ErrorTag::ALL
            .iter()
            .find_map(|tag| text.strip_prefix(tag.as_str()).map(|rest| (*tag, rest)))
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Error(ErrorTag),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<ErrorTag> for Value {
    fn from(tag: ErrorTag) -> Self {
        Value::Error(tag)
    }
}

/// Raw cell content, classified once when it is stored.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CellContent {
    /// Expression text, without the leading `=`.
    Formula(String),
    /// Text starting with a sign or a digit.
    Numeric(String),
    Text(String),
}

impl CellContent {
    /// Classify user input. Empty input means "no content".
    pub fn from_input(input: &str) -> Option<CellContent> {
        let first = input.chars().next()?;
        Some(if let Some(expr) = input.strip_prefix('=') {
            CellContent::Formula(expr.to_string())
        } else if first == '+' || first == '-' || first.is_numeric() {
            CellContent::Numeric(input.to_string())
        } else {
            CellContent::Text(input.to_string())
        })
    }

    /// The text a user would type to recreate this content.
    pub fn to_input_string(&self) -> String {
        match self {
            CellContent::Formula(expr) => format!("={}", expr),
            CellContent::Numeric(text) | CellContent::Text(text) => text.clone(),
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }
}

/// Sparse content store. Ordered row-major so walks and saves are
/// deterministic.
pub type Grid = BTreeMap<CellKey, CellContent>;

/// Memoized values, shared between the sheet and its dependency graph.
pub type ValueCache = Arc<DashMap<CellKey, Value>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_input() {
        assert_eq!(CellContent::from_input(""), None);
        assert_eq!(
            CellContent::from_input("=A1+1"),
            Some(CellContent::Formula("A1+1".into()))
        );
        assert_eq!(
            CellContent::from_input("-3.5"),
            Some(CellContent::Numeric("-3.5".into()))
        );
        assert_eq!(
            CellContent::from_input("42"),
            Some(CellContent::Numeric("42".into()))
        );
        assert_eq!(
            CellContent::from_input(" 42"),
            Some(CellContent::Text(" 42".into()))
        );
        assert_eq!(
            CellContent::from_input("hello"),
            Some(CellContent::Text("hello".into()))
        );
    }

    #[test]
    fn test_input_round_trip() {
        for input in ["=sum(A1:A3)", "12", "+1", "text", "=", "#ErrLop#:=B1"] {
            let content = CellContent::from_input(input).unwrap();
            assert_eq!(content.to_input_string(), input);
        }
    }

    #[test]
    fn test_strip_error_prefix() {
        assert_eq!(
            ErrorTag::strip_prefix("#ErrLop#:=A1"),
            Some((ErrorTag::Loop, ":=A1"))
        );
        assert_eq!(ErrorTag::strip_prefix("#Err#"), None);
        for tag in ErrorTag::ALL {
            assert_eq!(tag.as_str().len(), 8);
        }
    }
}
