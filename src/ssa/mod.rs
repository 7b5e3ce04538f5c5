//! # Key Components
//!
//! - [`VariableCollector`] - Definition sites and non-local temps
//! - [`place_phis`] - Semi-pruned phi placement on iterated dominance frontiers
//! - [`rename`] - Dominator-tree renaming, returning the name-to-slot mapping
//! - [`DefUses`] - Def/use index shared by the later passes
//! - [`cleanup_phis`] - Removal of phi-only webs
//! - [`split_critical_edges`] / [`check_critical_edges`] - Edge splitting and its postcondition
//! - [`deconstruct_ssa`] - Phi nodes to predecessor copies
//! - [`linearize`] - Unreachable-block pruning and final block order
//!
//! # Invariants
//!
//! Between [`place_phis`] and [`deconstruct_ssa`], operand `i` of every phi in block
//! `Y` belongs to `Y.preds[i]`. Every pass that touches predecessor lists
//! ([`split_critical_edges`], [`linearize`]) keeps the two in step.

mod cleanup;
mod deconstruct;
mod defuse;
mod linearize;
mod phis;
mod rename;
mod split;
mod variables;

pub use cleanup::cleanup_phis;
pub use deconstruct::{deconstruct_ssa, DeconstructStats};
pub use defuse::{DefUse, DefUses};
pub use linearize::linearize;
pub use phis::place_phis;
pub use rename::rename;
pub use split::{check_critical_edges, find_critical_edge, split_critical_edges};
pub use variables::VariableCollector;
