use serde::{Deserialize, Serialize};

/// Tuning knobs for evaluation and recomputation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Address hops a single evaluation may take before the loop guard trips.
    pub max_call_depth: usize,
    /// Sub-passes per scheduler round.
    pub sub_passes: usize,
    /// Full-sheet rounds after the first block round fails.
    pub escalations: usize,
    /// Frontier retries for a single-cell read outside the scheduler.
    pub resolve_attempts: usize,
    /// Whether text cells read as 0 in numeric contexts.
    pub text_to_zero: bool,
    /// Largest range expanded into dependency links or aggregated.
    pub max_range_cells: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_call_depth: 64,
            sub_passes: 4,
            escalations: 2,
            resolve_attempts: 64,
            text_to_zero: true,
            max_range_cells: 1_000_000,
        }
    }
}
