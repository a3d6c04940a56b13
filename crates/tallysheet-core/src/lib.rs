//! tallysheet-core - UI-agnostic document model + storage.

pub mod config;
pub mod document;
pub mod error;
pub mod storage;

pub use config::{DisplayConfig, SheetConfig, StorageConfig};
pub use document::{Clipboard, Document, Placement};
pub use error::{Result, SheetError};

pub use tallysheet_engine::engine::CellKey;
