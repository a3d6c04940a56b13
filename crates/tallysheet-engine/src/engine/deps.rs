//! Dependency links between cells.
//!
//! Every formula cell has a forward-link set (the cells it reads, ranges
//! expanded) and every referenced cell a reverse-link set (the cells that
//! read it). The graph shares the value cache with its sheet: updating a
//! cell removes the cached values of the cell and of everything that
//! transitively reads it.
//!
//! Handles:
//! - Simple references: `A1`, `$B$2`
//! - Ranges: `SUM(A1:B5)`, expanded cell by cell
//! - Ignores quoted strings and function names

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::cell::{CellContent, ValueCache};
use super::cell_ref::{CellKey, RefSpan, scan_ranges};

/// Cells read by a formula expression, ranges expanded.
///
/// Ranges with more than `max_range_cells` cells are skipped.
pub fn extract_dependencies(expr: &str, max_range_cells: usize) -> HashSet<CellKey> {
    let mut deps = HashSet::new();
    for span in scan_ranges(expr) {
        let (start, end) = span.bounds();
        if let RefSpan::Cell(cell) = span {
            deps.insert(cell.key);
            continue;
        }
        let rows = end.row - start.row + 1;
        let cols = end.col - start.col + 1;
        let Some(count) = rows.checked_mul(cols).filter(|n| *n <= max_range_cells) else {
            warn!(%start, %end, "range too large to link, skipping");
            continue;
        };
        deps.reserve(count);
        for row in start.row..=end.row {
            for col in start.col..=end.col {
                deps.insert(CellKey::new(row, col));
            }
        }
    }
    deps
}

#[derive(Debug)]
pub struct DependencyGraph {
    forward: HashMap<CellKey, HashSet<CellKey>>,
    reverse: HashMap<CellKey, HashSet<CellKey>>,
    cache: ValueCache,
    max_range_cells: usize,
}

impl DependencyGraph {
    pub fn new(cache: ValueCache, max_range_cells: usize) -> Self {
        DependencyGraph {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            cache,
            max_range_cells,
        }
    }

    /// Record that `key` now holds `content` (`None` when cleared).
    ///
    /// Forward links are re-derived and diffed against the previous set, and
    /// the reverse links of added/removed precedents are adjusted. Then the
    /// cached value of `key` and of every cell reachable through reverse
    /// links is dropped. `cleared` collects invalidated cells across a batch
    /// of updates; cells already in it are not walked again.
    pub fn cell_updated(
        &mut self,
        key: CellKey,
        content: Option<&CellContent>,
        cleared: &mut HashSet<CellKey>,
    ) {
        self.relink(key, content);
        self.invalidate(key, cleared);
    }

    fn relink(&mut self, key: CellKey, content: Option<&CellContent>) {
        let links = match content.and_then(CellContent::formula) {
            Some(expr) => extract_dependencies(expr, self.max_range_cells),
            None => HashSet::new(),
        };
        let old = self.forward.remove(&key).unwrap_or_default();

        for added in links.difference(&old) {
            self.reverse.entry(*added).or_default().insert(key);
        }
        for removed in old.difference(&links) {
            match self.reverse.get_mut(removed) {
                Some(readers) => {
                    readers.remove(&key);
                    if readers.is_empty() {
                        self.reverse.remove(removed);
                    }
                }
                None => warn!(cell = %key, precedent = %removed, "reverse link missing"),
            }
        }

        if !links.is_empty() {
            self.forward.insert(key, links);
        }
    }

    /// Drop the cached value of `key` and of all its transitive readers.
    pub fn invalidate(&self, key: CellKey, cleared: &mut HashSet<CellKey>) {
        let mut pending = vec![key];
        while let Some(cell) = pending.pop() {
            self.cache.remove(&cell);
            cleared.insert(cell);
            if let Some(readers) = self.reverse.get(&cell) {
                pending.extend(readers.iter().filter(|r| !cleared.contains(*r)).copied());
            }
        }
    }

    /// Rebuild every link from scratch. The cache is left alone; callers
    /// clear it themselves.
    pub fn rebuild_all<'a>(
        &mut self,
        cells: impl IntoIterator<Item = (&'a CellKey, &'a CellContent)>,
    ) {
        self.forward.clear();
        self.reverse.clear();
        for (key, content) in cells {
            self.relink(*key, Some(content));
        }
    }

    /// Cells read by `key`'s formula.
    pub fn precedents(&self, key: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.forward.get(&key).into_iter().flatten().copied()
    }

    /// Cells whose formulas read `key`.
    pub fn dependents(&self, key: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.reverse.get(&key).into_iter().flatten().copied()
    }

    /// Whether forward and reverse links mirror each other exactly.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(reader, precedents)| {
            precedents
                .iter()
                .all(|p| self.reverse.get(p).is_some_and(|r| r.contains(reader)))
        });
        let reverse_ok = self.reverse.iter().all(|(precedent, readers)| {
            readers
                .iter()
                .all(|r| self.forward.get(r).is_some_and(|f| f.contains(precedent)))
        });
        forward_ok && reverse_ok
    }
}
