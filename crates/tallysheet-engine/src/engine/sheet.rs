//! The sheet aggregate: cell content, value cache and dependency links,
//! owned together so every write keeps them in step.

use dashmap::DashMap;
use rhai::Engine;
use std::collections::HashSet;
use std::sync::Arc;

use super::cell::{CellContent, Grid, Value, ValueCache};
use super::cell_ref::{CellKey, normalize_range};
use super::config::EngineConfig;
use super::deps::DependencyGraph;
use super::eval::create_engine;

pub struct Sheet {
    pub(crate) cells: Grid,
    pub(crate) cache: ValueCache,
    pub(crate) links: DependencyGraph,
    pub(crate) engine: Engine,
    pub(crate) config: EngineConfig,
    pub(crate) needs_recalc: bool,
}

impl Default for Sheet {
    fn default() -> Self {
        Sheet::new()
    }
}

impl std::fmt::Debug for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("cells", &self.cells)
            .field("cached", &self.cache.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Sheet {
    pub fn new() -> Self {
        Sheet::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cache: ValueCache = Arc::new(DashMap::new());
        Sheet {
            cells: Grid::new(),
            links: DependencyGraph::new(cache.clone(), config.max_range_cells),
            cache,
            engine: create_engine(),
            config,
            needs_recalc: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn content(&self, key: CellKey) -> Option<&CellContent> {
        self.cells.get(&key)
    }

    /// The text a user would see when editing `key`.
    pub fn raw(&self, key: CellKey) -> Option<String> {
        self.cells.get(&key).map(CellContent::to_input_string)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &CellContent)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Largest row and column holding content.
    pub fn extent(&self) -> Option<(usize, usize)> {
        let max_row = self.cells.keys().next_back()?.row;
        let max_col = self.cells.keys().map(|k| k.col).max()?;
        Some((max_row, max_col))
    }

    /// Store user input in `key`. Empty input clears the cell.
    pub fn set_cell(&mut self, key: CellKey, input: &str) {
        self.set_content(key, CellContent::from_input(input));
    }

    pub fn set_content(&mut self, key: CellKey, content: Option<CellContent>) {
        let mut cleared = HashSet::new();
        self.store(key, content, &mut cleared);
    }

    /// Apply several writes as one batch, sharing the invalidation walk.
    pub fn set_contents(
        &mut self,
        updates: impl IntoIterator<Item = (CellKey, Option<CellContent>)>,
    ) {
        let mut cleared = HashSet::new();
        for (key, content) in updates {
            self.store(key, content, &mut cleared);
        }
    }

    pub fn clear_cell(&mut self, key: CellKey) -> Option<CellContent> {
        let old = self.cells.get(&key).cloned();
        if old.is_some() {
            self.set_content(key, None);
        }
        old
    }

    pub(crate) fn store(
        &mut self,
        key: CellKey,
        content: Option<CellContent>,
        cleared: &mut HashSet<CellKey>,
    ) {
        self.links.cell_updated(key, content.as_ref(), cleared);
        match content {
            Some(content) => {
                self.cells.insert(key, content);
            }
            None => {
                self.cells.remove(&key);
            }
        }
        self.needs_recalc = true;
    }

    /// Replace all content at once, relinking from scratch and dropping
    /// every cached value. Used after structural edits and loads.
    pub fn replace_all(&mut self, cells: Grid) {
        self.cells = cells;
        self.links.rebuild_all(self.cells.iter());
        self.cache.clear();
        self.needs_recalc = true;
    }

    pub fn links(&self) -> &DependencyGraph {
        &self.links
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    pub fn cached(&self, key: CellKey) -> Option<Value> {
        self.cache.get(&key).map(|v| v.value().clone())
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.needs_recalc = true;
    }

    pub fn needs_recalc(&self) -> bool {
        self.needs_recalc
    }

    /// Read and reset the "needs recompute" flag.
    pub fn take_needs_recalc(&mut self) -> bool {
        std::mem::take(&mut self.needs_recalc)
    }

    /// Present cells inside the rectangle spanned by `a` and `b`, row-major.
    pub fn keys_in(&self, a: CellKey, b: CellKey) -> Vec<CellKey> {
        let (start, end) = normalize_range(a, b);
        let mut keys = Vec::new();
        for row in start.row..=end.row {
            let from = CellKey::new(row, start.col);
            let to = CellKey::new(row, end.col);
            keys.extend(self.cells.range(from..=to).map(|(k, _)| *k));
            if self.cells.range(CellKey::new(row.saturating_add(1), 0)..).next().is_none() {
                break;
            }
        }
        keys
    }
}
