//! User configuration, read from `config.toml` in the platform config dir.
//!
//! ```toml
//! [engine]
//! max_call_depth = 64
//!
//! [storage]
//! field_sep = ";"
//! quote = "'"
//!
//! [display]
//! precision = 2
//! ```
//!
//! Every field is optional; a missing file means all defaults.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tallysheet_engine::engine::EngineConfig;

use crate::error::{Result, SheetError};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
}

/// How sheet files are laid out on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub field_sep: char,
    pub quote: char,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            field_sep: ';',
            quote: '\'',
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Decimal places for numbers; `None` prints the shortest form.
    pub precision: Option<usize>,
}

impl SheetConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SheetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SheetConfig::default());
        }
        let meta = std::fs::metadata(path)?;
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            return Err(SheetError::InvalidConfig(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            )));
        }
        let content = std::fs::read_to_string(path)?;
        SheetConfig::from_toml_str(&content)
    }

    /// `<config dir>/tallysheet/config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("", "", "tallysheet")?;
        let mut path = proj.config_dir().to_path_buf();
        path.push("config.toml");
        Some(path)
    }

    pub fn load_default() -> Result<Self> {
        match SheetConfig::default_path() {
            Some(path) => SheetConfig::load(&path),
            None => Ok(SheetConfig::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let StorageConfig { field_sep, quote } = self.storage;
        if field_sep == quote {
            return Err(SheetError::InvalidConfig(
                "field_sep and quote must differ".to_string(),
            ));
        }
        if field_sep == '\n' || quote == '\n' {
            return Err(SheetError::InvalidConfig(
                "field_sep and quote cannot be a newline".to_string(),
            ));
        }
        if self.engine.max_call_depth == 0 {
            return Err(SheetError::InvalidConfig(
                "engine.max_call_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
