//! Block and full-sheet recomputation.
//!
//! A single evaluation never recurses deeper than the call-depth budget, so
//! a chain longer than the budget cannot resolve in one call. The scheduler
//! instead walks the cells of a block several times: every cell that does
//! resolve stays cached, so each sub-pass gets further along a long chain.
//! If the block still has unresolved cells after its sub-passes, the whole
//! sheet is walked (a bounded number of times) before the leftovers are
//! tagged as loops.

use std::ops::RangeInclusive;
use tracing::{debug, warn};

use super::cell::CellContent;
use super::cell_ref::CellKey;
use super::cycle::PassContext;
use super::eval::Settled;
use super::sheet::Sheet;

/// What a recompute did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecalcReport {
    pub sub_passes: usize,
    pub escalations: usize,
    /// Cells evaluated to a value (errors included).
    pub evaluated: usize,
    /// Top-level evaluations that ran into a reference loop.
    pub loops: usize,
    /// Cells still unresolved at the end, now loop-tagged.
    pub unresolved: Vec<CellKey>,
}

impl RecalcReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl Sheet {
    /// Fill the value cache for every present cell in a block.
    ///
    /// `full_clear` drops the whole cache first.
    pub fn recompute_block(
        &mut self,
        full_clear: bool,
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
    ) -> RecalcReport {
        if full_clear {
            self.cache.clear();
        }
        let mut report = RecalcReport::default();
        let mut seeds = Vec::new();
        let mut failed = self.run_sub_passes(&rows, &cols, &mut seeds, &mut report);

        while !failed.is_empty() && report.escalations < self.config.escalations {
            report.escalations += 1;
            let Some((max_row, max_col)) = self.extent() else {
                break;
            };
            debug!(
                escalation = report.escalations,
                unresolved = failed.len(),
                "escalating to full sheet"
            );
            failed = self.run_sub_passes(&(1..=max_row), &(1..=max_col), &mut seeds, &mut report);
        }

        if !failed.is_empty() {
            warn!(count = failed.len(), "recompute gave up on cells");
            self.tag_loop(&failed);
            report.unresolved = failed;
        }
        self.needs_recalc = false;
        report
    }

    /// Recompute every cell of the sheet.
    pub fn recompute_all(&mut self, full_clear: bool) -> RecalcReport {
        match self.extent() {
            Some((max_row, max_col)) => self.recompute_block(full_clear, 1..=max_row, 1..=max_col),
            None => {
                if full_clear {
                    self.cache.clear();
                }
                self.needs_recalc = false;
                RecalcReport::default()
            }
        }
    }

    /// Up to `sub_passes` walks over the uncached cells of a block. Returns
    /// the cells still unresolved after the last walk.
    ///
    /// Each cell follows its depth frontiers for up to `resolve_attempts`
    /// hops. When that budget runs out, the frontier where it stopped is kept
    /// as a seed and evaluated first in the next walk, so the window slides
    /// down a long chain one walk at a time.
    fn run_sub_passes(
        &mut self,
        rows: &RangeInclusive<usize>,
        cols: &RangeInclusive<usize>,
        seeds: &mut Vec<CellKey>,
        report: &mut RecalcReport,
    ) -> Vec<CellKey> {
        let mut failed = Vec::new();
        for pass in 0..self.config.sub_passes.max(1) {
            report.sub_passes += 1;
            failed.clear();
            let mut ctx = PassContext::new(self.config.max_call_depth);
            let mut order: Vec<CellKey> = std::mem::take(seeds);
            order.extend(self.pending_in(rows, cols));
            for key in order {
                if self.cache.contains_key(&key) {
                    continue;
                }
                let attempts = self.config.resolve_attempts;
                match self.settle(&mut ctx, key, self.nested_options(), attempts) {
                    Settled::Value(_) => report.evaluated += 1,
                    Settled::Loop => report.loops += 1,
                    Settled::Exhausted { frontier, .. } => {
                        if !seeds.contains(&frontier) {
                            seeds.push(frontier);
                        }
                        if !failed.contains(&key) {
                            failed.push(key);
                        }
                    }
                }
            }
            debug!(pass, failed = failed.len(), "recompute sub-pass");
            if failed.is_empty() {
                break;
            }
        }
        failed
    }

    /// Formula and numeric cells in the block without a cached value.
    fn pending_in(
        &self,
        rows: &RangeInclusive<usize>,
        cols: &RangeInclusive<usize>,
    ) -> Vec<CellKey> {
        if rows.is_empty() || cols.is_empty() {
            return Vec::new();
        }
        let top_left = CellKey::new(*rows.start(), *cols.start());
        let bottom_right = CellKey::new(*rows.end(), *cols.end());
        self.keys_in(top_left, bottom_right)
            .into_iter()
            .filter(|key| !matches!(self.cells.get(key), Some(CellContent::Text(_))))
            .filter(|key| !self.cache.contains_key(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, ErrorTag, Value};

    fn key(name: &str) -> CellKey {
        CellKey::from_str(name).unwrap()
    }

    fn chain_sheet(config: EngineConfig, length: usize) -> Sheet {
        let mut sheet = Sheet::with_config(config);
        sheet.set_cell(CellKey::new(1, 1), "1");
        for row in 2..=length {
            sheet.set_cell(CellKey::new(row, 1), &format!("=A{}+1", row - 1));
        }
        sheet
    }

    #[test]
    fn test_recompute_fills_cache() {
        let mut sheet = Sheet::new();
        sheet.set_cell(key("A1"), "2");
        sheet.set_cell(key("B1"), "=A1*3");
        sheet.set_cell(key("C1"), "label");
        let report = sheet.recompute_all(true);
        assert!(report.is_complete());
        assert_eq!(report.evaluated, 2);
        assert_eq!(sheet.cached(key("B1")), Some(Value::Number(6.0)));
        assert_eq!(sheet.cached(key("C1")), None);
        assert!(!sheet.needs_recalc());
    }

    #[test]
    fn test_ring_longer_than_depth_budget_is_tagged_as_loop() {
        let mut sheet = Sheet::new();
        for row in 1..=100 {
            sheet.set_cell(CellKey::new(row, 1), &format!("=A{}+1", row % 100 + 1));
        }
        sheet.set_cell(key("B1"), "5");
        sheet.set_cell(key("B2"), "=B1*2");

        let report = sheet.recompute_all(true);
        assert!(report.loops > 0);
        assert!(report.is_complete());
        assert_eq!(report.sub_passes, 1);
        assert_eq!(report.escalations, 0);
        for row in 1..=100 {
            let raw = sheet.raw(CellKey::new(row, 1)).unwrap();
            assert!(raw.starts_with("#ErrLop#:="), "A{row}: {raw}");
        }
        assert_eq!(sheet.cached(key("B2")), Some(Value::Number(10.0)));
    }

    #[test]
    fn test_sliding_window_resolves_long_chain() {
        let config = EngineConfig {
            max_call_depth: 5,
            resolve_attempts: 2,
            ..EngineConfig::default()
        };
        let mut sheet = chain_sheet(config, 40);
        let report = sheet.recompute_block(true, 40..=40, 1..=1);
        assert!(report.is_complete());
        assert_eq!(sheet.cached(CellKey::new(40, 1)), Some(Value::Number(40.0)));
        assert!(report.sub_passes > 1);
    }

    #[test]
    fn test_long_chain_settles_in_one_pass_with_default_attempts() {
        let config = EngineConfig {
            max_call_depth: 5,
            ..EngineConfig::default()
        };
        let mut sheet = chain_sheet(config, 40);
        let report = sheet.recompute_block(true, 40..=40, 1..=1);
        assert!(report.is_complete());
        assert_eq!(report.sub_passes, 1);
        assert_eq!(sheet.cached(CellKey::new(40, 1)), Some(Value::Number(40.0)));
    }

    #[test]
    fn test_escalation_to_full_sheet() {
        let config = EngineConfig {
            max_call_depth: 3,
            sub_passes: 1,
            resolve_attempts: 1,
            ..EngineConfig::default()
        };
        let mut sheet = chain_sheet(config, 12);
        let report = sheet.recompute_block(true, 12..=12, 1..=1);
        assert!(report.escalations >= 1);
        assert!(report.is_complete());
        assert_eq!(sheet.value_of(CellKey::new(12, 1)), Value::Number(12.0));
    }

    #[test]
    fn test_unresolvable_cells_are_tagged() {
        let config = EngineConfig {
            max_call_depth: 2,
            sub_passes: 1,
            escalations: 0,
            resolve_attempts: 1,
            ..EngineConfig::default()
        };
        let mut sheet = chain_sheet(config, 10);
        let report = sheet.recompute_block(true, 10..=10, 1..=1);
        assert_eq!(report.unresolved, vec![CellKey::new(10, 1)]);
        assert_eq!(sheet.raw(CellKey::new(10, 1)).as_deref(), Some("#ErrLop#:=A9+1"));
    }

    #[test]
    fn test_cycle_in_block_is_tagged() {
        let mut sheet = Sheet::new();
        sheet.set_cell(key("A1"), "=B1");
        sheet.set_cell(key("B1"), "=A1");
        sheet.set_cell(key("C1"), "5");
        let report = sheet.recompute_all(true);
        assert_eq!(report.loops, 1);
        assert!(sheet.raw(key("A1")).unwrap().starts_with(ErrorTag::Loop.as_str()));
        assert!(sheet.raw(key("B1")).unwrap().starts_with(ErrorTag::Loop.as_str()));
        assert_eq!(sheet.cached(key("C1")), Some(Value::Number(5.0)));
    }
}
