use std::{fmt, ops::AddAssign};

/// Counters collected while optimizing one function.
///
/// Summing the stats of several functions gives totals for a whole unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Blocks removed as unreachable, before and after SSA.
    pub blocks_pruned: usize,
    /// Phi nodes placed.
    pub phis_inserted: usize,
    /// Fresh SSA names allocated by renaming.
    pub temps_allocated: usize,
    /// Phi nodes removed as phi-only webs.
    pub phis_cleaned: usize,
    /// Statements removed as dead.
    pub statements_removed: usize,
    /// Statement evaluations performed by type inference.
    pub inference_iterations: usize,
    /// Numeric constants retyped by propagation.
    pub constants_retyped: usize,
    /// Critical edges split.
    pub edges_split: usize,
    /// Copies inserted when leaving SSA form.
    pub moves_inserted: usize,
    /// Definitions retargeted onto phi targets instead of copied.
    pub moves_coalesced: usize,
    /// Whether SSA conversion was skipped for the function.
    pub ssa_skipped: bool,
}

impl AddAssign for PipelineStats {
    fn add_assign(&mut self, other: Self) {
        self.blocks_pruned += other.blocks_pruned;
        self.phis_inserted += other.phis_inserted;
        self.temps_allocated += other.temps_allocated;
        self.phis_cleaned += other.phis_cleaned;
        self.statements_removed += other.statements_removed;
        self.inference_iterations += other.inference_iterations;
        self.constants_retyped += other.constants_retyped;
        self.edges_split += other.edges_split;
        self.moves_inserted += other.moves_inserted;
        self.moves_coalesced += other.moves_coalesced;
        self.ssa_skipped |= other.ssa_skipped;
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pruned {} blocks, {} phis ({} cleaned), {} dead statements, {} edges split, \
             {} moves ({} coalesced)",
            self.blocks_pruned,
            self.phis_inserted,
            self.phis_cleaned,
            self.statements_removed,
            self.edges_split,
            self.moves_inserted,
            self.moves_coalesced
        )
    }
}
