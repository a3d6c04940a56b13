//! tallysheet - spreadsheet formula engine and document model.
//!
//! The engine lives in [`engine`] (cells, evaluation, dependency links,
//! rebasing, recompute); the document layer (edits, structural changes,
//! files, configuration) is re-exported at the top level.
//!
//! ```
//! use tallysheet::{CellKey, Document};
//! use tallysheet::engine::Value;
//!
//! let mut doc = Document::new();
//! doc.set_cell_from_input(CellKey::new(1, 1), "2").unwrap();
//! doc.set_cell_from_input(CellKey::new(1, 2), "=A1/4").unwrap();
//! assert_eq!(doc.sheet.value_of(CellKey::new(1, 2)), Value::Number(0.5));
//! ```

pub use tallysheet_core::{
    CellKey, Clipboard, DisplayConfig, Document, Placement, Result, SheetConfig, SheetError,
    StorageConfig, config, document, storage,
};
pub use tallysheet_engine::{builtins, engine};
