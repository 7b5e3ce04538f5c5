//! Graph algorithms used by the SSA pipeline.
//!
//! - [`compute_dominators`] / [`compute_dominance_frontiers`] - Lengauer-Tarjan
//!   dominator tree and bottom-up dominance frontiers
//! - [`dfs`] / [`postorder`] / [`reverse_postorder`] - traversal orders

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, compute_dominators_rooted, DominatorIterator,
    DominatorTree,
};
pub use traversal::{dfs, postorder, reverse_postorder, DfsIterator};
