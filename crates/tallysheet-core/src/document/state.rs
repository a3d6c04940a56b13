use std::path::PathBuf;
use tallysheet_engine::engine::{CellContent, CellKey, Sheet};

use crate::config::SheetConfig;

/// A copied cell and where it was copied from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clipboard {
    pub source: CellKey,
    pub content: CellContent,
}

/// UI-agnostic document state for the spreadsheet.
#[derive(Debug)]
pub struct Document {
    /// Content, value cache and dependency links
    pub sheet: Sheet,
    pub config: SheetConfig,
    /// Rows in use. Grows with writes, never below the data extent.
    pub num_rows: usize,
    pub num_cols: usize,
    pub clipboard: Option<Clipboard>,
    /// Current file path
    pub file_path: Option<PathBuf>,
    /// Whether the sheet has been modified since the last load or save
    pub modified: bool,
}

impl Document {
    /// Create an empty document with default configuration.
    ///
    /// This constructor is side-effect free: it does not touch the filesystem.
    pub fn new() -> Self {
        Document::with_config(SheetConfig::default())
    }

    pub fn with_config(config: SheetConfig) -> Self {
        Document {
            sheet: Sheet::with_config(config.engine.clone()),
            config,
            num_rows: 0,
            num_cols: 0,
            clipboard: None,
            file_path: None,
            modified: false,
        }
    }

    /// Display text for a cell, using the configured precision.
    pub fn display_value(&mut self, key: CellKey) -> String {
        self.sheet.display_value_with(key, self.config.display.precision)
    }

    /// Grow the tracked dimensions to include `key`.
    pub(crate) fn grow_to(&mut self, key: CellKey) {
        self.num_rows = self.num_rows.max(key.row);
        self.num_cols = self.num_cols.max(key.col);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
