//! Graph abstractions for control flow analysis.
//!
//! The SSA pipeline never builds a separate graph object: [`crate::ir::Function`]
//! implements the traits in this module directly over its block arena, and the
//! algorithms here are generic over those traits.
//!
//! # Architecture
//!
//! - **Core Types**: [`NodeId`] is the strongly-typed node handle all algorithms
//!   speak in. A [`crate::ir::BlockId`] converts into it losslessly.
//! - **Traits**: [`GraphBase`], [`Successors`], [`Predecessors`] and [`RootedGraph`]
//!   describe what an algorithm needs from a graph.
//! - **Algorithms**: traversal orders and Lengauer-Tarjan dominators with dominance
//!   frontiers, see [`algorithms`].
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use ssair::utils::graph::algorithms::{compute_dominators, dfs};
//!
//! let dom_tree = compute_dominators(&function, function.entry_node());
//! let reachable: Vec<_> = dfs(&function, function.entry_node()).collect();
//! ```

pub mod algorithms;

mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
