//! Shared utilities.
//!
//! - [`graph`] - Graph traits, traversal and dominator computation used by the
//!   SSA pipeline.

pub mod graph;
