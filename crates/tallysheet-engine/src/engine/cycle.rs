//! Loop guard for recursive evaluation.
//!
//! The dependency graph does not try to keep exact cycle information under
//! incremental edits. Instead evaluation bounds its own recursion: every
//! address (or range-reading call) descends one level. Entering a formula
//! cell that is already being evaluated, either further up the stack or by
//! an outer attempt waiting on the current one, closes a loop and tags the
//! cells involved. A cell entered beyond `max_depth` with no loop sits at the
//! far end of a chain longer than the budget; that is recoverable by
//! evaluating the frontier cell first and retrying.

use std::collections::HashSet;

use super::cell_ref::CellKey;

/// Bracket nesting allowed inside a single formula.
pub(crate) const MAX_NESTING: usize = 64;

/// Control signal that unwinds a recursive evaluation. Ordinary evaluation
/// failures are [`Value::Error`](super::Value) values, never an `Unwind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unwind {
    /// A reference loop was found; the formula cells on the current trail
    /// have been tagged.
    Loop { cell: CellKey },
    /// The depth budget ran out at `frontier` with no loop on the stack.
    DepthExceeded { frontier: CellKey },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Trip {
    Loop,
    Depth,
}

/// Per-pass evaluation state, threaded through every recursive call.
#[derive(Debug)]
pub struct PassContext {
    max_depth: usize,
    depth: usize,
    stack: Vec<CellKey>,
    waiting: HashSet<CellKey>,
    nesting: usize,
    /// `nesting` at the moment each stacked formula was entered.
    bases: Vec<usize>,
    trail: Vec<CellKey>,
    on_trail: HashSet<CellKey>,
}

impl PassContext {
    pub fn new(max_depth: usize) -> Self {
        PassContext {
            max_depth,
            depth: 0,
            stack: Vec::new(),
            waiting: HashSet::new(),
            nesting: 0,
            bases: Vec::new(),
            trail: Vec::new(),
            on_trail: HashSet::new(),
        }
    }

    /// Start a new top-level evaluation.
    pub fn begin(&mut self) {
        self.depth = 0;
        self.stack.clear();
        self.waiting.clear();
        self.nesting = 0;
        self.bases.clear();
        self.trail.clear();
        self.on_trail.clear();
    }

    /// Start a top-level evaluation on behalf of `waiting`, the outer cells
    /// whose own evaluation stopped at this one. Reaching any of them again
    /// is a loop.
    pub fn begin_for(&mut self, waiting: &[CellKey]) {
        self.begin();
        self.waiting.extend(waiting.iter().copied());
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn descend(&mut self) {
        self.depth += 1;
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Formula cells entered since the last [`begin`](Self::begin).
    pub fn trail(&self) -> &[CellKey] {
        &self.trail
    }

    /// Open one expression level. Fails once the current formula is nested
    /// [`MAX_NESTING`] deep.
    pub fn nest(&mut self) -> bool {
        let base = self.bases.last().copied().unwrap_or(0);
        if self.nesting - base >= MAX_NESTING {
            return false;
        }
        self.nesting += 1;
        true
    }

    pub fn unnest(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    pub(crate) fn enter(&mut self, key: CellKey) -> Result<(), Trip> {
        if self.stack.contains(&key) || self.waiting.contains(&key) {
            return Err(Trip::Loop);
        }
        // Each hop opens at least one expression level, so bracket-heavy
        // chains reach the frontier after fewer hops.
        let frame_budget = self.max_depth.saturating_add(1).saturating_mul(2);
        if self.depth > self.max_depth || self.nesting > frame_budget {
            return Err(Trip::Depth);
        }
        self.stack.push(key);
        self.bases.push(self.nesting);
        if self.on_trail.insert(key) {
            self.trail.push(key);
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self, key: CellKey) {
        if self.stack.last() == Some(&key) {
            self.stack.pop();
            self.bases.pop();
        }
    }
}
