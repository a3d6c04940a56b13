//! Spreadsheet engine API.
//!
//! This module provides the formula engine behind a sheet:
//!
//! - [`tokenize`], [`segment`] - Lexing and splitting formula text
//! - [`CellKey`], [`CellRef`] - Cell addresses (A1 notation ↔ row/col)
//! - [`CellContent`], [`Value`], [`ErrorTag`] - Stored content and computed values
//! - [`DependencyGraph`] - Forward/reverse links and cache invalidation
//! - [`Sheet`] - Content, value cache and links owned together
//! - [`PassContext`] - The loop guard threaded through an evaluation
//! - [`rebase_formula`], [`rebase_for_paste`] - Address rewriting
//! - [`RecalcReport`] - Result of a block or full-sheet recompute
//! - [`format_value`] - Format values for display

mod cell;
mod cell_ref;
mod config;
mod cycle;
mod deps;
mod eval;
mod format;
mod lexer;
mod rebase;
mod recalc;
mod segment;
mod sheet;

pub use cell::{CellContent, ErrorTag, Grid, Value, ValueCache};
pub use cell_ref::{
    AddressToken, CellKey, CellRef, RefSpan, col_to_letters, format_address, letters_to_col,
    normalize_range, parse_address, parse_range_arg, scan_addresses, scan_ranges,
};
pub use config::EngineConfig;
pub use cycle::{PassContext, Unwind};
pub use deps::{DependencyGraph, extract_dependencies};
pub use eval::{EvalOptions, create_engine};
pub use format::{format_number, format_value};
pub use lexer::{LexOptions, Lexer, Token, TokenKind, next_token, tokenize};
pub use rebase::{rebase_for_paste, rebase_formula};
pub use recalc::RecalcReport;
pub use segment::{Part, segment, split_arguments};
pub use sheet::Sheet;

pub(crate) use eval::finite_number;
