use super::Document;
use crate::config::SheetConfig;
use crate::error::{Result, SheetError};
use crate::storage::{read_sheet, write_sheet};
use std::path::{Path, PathBuf};
use tallysheet_engine::engine::{CellContent, Grid};
use tracing::info;

impl Document {
    /// Create a new document and load a file if provided. A path that does
    /// not exist yet becomes the save target.
    pub fn with_file(path: Option<PathBuf>, config: SheetConfig) -> Result<Self> {
        let mut doc = Document::with_config(config);
        if let Some(p) = path {
            if p.exists() {
                doc.load_file(&p)?;
            } else {
                doc.file_path = Some(p);
            }
        }
        Ok(doc)
    }

    /// Replace the document's content with a parsed sheet file. Nothing
    /// changes if parsing fails.
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let parsed = read_sheet(content, &self.config.storage)?;
        let grid: Grid = parsed
            .cells
            .iter()
            .filter_map(|(key, text)| CellContent::from_input(text).map(|content| (*key, content)))
            .collect();
        self.sheet.replace_all(grid);
        self.num_rows = parsed.num_rows;
        self.num_cols = parsed.num_cols;
        self.modified = false;
        Ok(())
    }

    /// Load from file
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content)?;
        self.file_path = Some(path.to_path_buf());
        info!(path = %path.display(), cells = self.sheet.len(), "loaded sheet");
        Ok(())
    }

    /// The document as sheet-file text.
    pub fn to_text(&self) -> String {
        let cells = self
            .sheet
            .cells()
            .map(|(key, content)| (*key, content.to_input_string()));
        write_sheet(cells, self.num_rows, self.num_cols, &self.config.storage)
    }

    /// Save to current file path.
    /// Returns the path saved to.
    pub fn save_file(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            return Err(SheetError::NoFilePath);
        };
        self.write_to(&path)?;
        Ok(path)
    }

    /// Save to `path` and make it the current file path.
    pub fn save_file_as(&mut self, path: &Path) -> Result<PathBuf> {
        self.write_to(path)?;
        self.file_path = Some(path.to_path_buf());
        Ok(path.to_path_buf())
    }

    fn write_to(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        self.modified = false;
        info!(path = %path.display(), cells = self.sheet.len(), "saved sheet");
        Ok(())
    }
}
