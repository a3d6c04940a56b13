//! Error types for Tallysheet core.

use thiserror::Error;

/// Errors that can occur while editing, loading or saving a sheet
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No file path set")]
    NoFilePath,

    #[error("Nothing to paste")]
    NothingToPaste,

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid count: {0}")]
    InvalidCount(usize),

    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Line break in cell {0}: sheet files hold one row per line")]
    LineBreak(String),
}

pub type Result<T> = std::result::Result<T, SheetError>;
