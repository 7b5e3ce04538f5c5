//! Optimization passes and the pipeline driver.
//!
//! This module chains the building blocks of [`crate::ssa`] and the passes in
//! [`passes`] into the fixed order a function must go through:
//!
//! - [`crate::ssa`] - SSA construction and deconstruction stages
//! - [`passes`] - Dead code elimination, type inference and type propagation
//! - [`compiler`](self) - Configuration, counters, the [`Pass`] trait and the
//!   [`Optimizer`] driver
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Optimizer::run                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  validate                   Terminators and edges agree          │
//! │  linearize                  Drop unreachable blocks              │
//! │    └─ has_try / !ssa ──────► done, empty mapping                 │
//! │                                                                  │
//! │  Construction                                                    │
//! │    ├─ check_entry           Entry block has no predecessors      │
//! │    ├─ dominators            Lengauer-Tarjan + frontiers          │
//! │    ├─ VariableCollector     Definition sites, non-local temps    │
//! │    ├─ place_phis            Iterated dominance frontiers         │
//! │    └─ rename                Dominator-tree walk, name mapping    │
//! │                                                                  │
//! │  Optimization (Pass, shared PassContext)                         │
//! │    ├─ cleanup_phis          Phi-only webs                        │
//! │    ├─ DeadCodeElimination   Unused, effect-free definitions      │
//! │    ├─ TypeInference         Worklist fixpoint → TypeEnv          │
//! │    └─ TypePropagation       Expected types into constants        │
//! │                                                                  │
//! │  Deconstruction                                                  │
//! │    ├─ split_critical_edges  Landing blocks on critical edges     │
//! │    ├─ deconstruct_ssa       Phis → coalesced moves               │
//! │    └─ linearize             Final block order                    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`compile_functions`] runs the driver over many functions on the rayon pool.

mod config;
mod pass;
mod pipeline;
mod stats;

pub mod passes;

pub use config::OptimizerConfig;
pub use pass::{Pass, PassContext};
pub use pipeline::{compile_functions, Optimizer, PipelineOutput};
pub use stats::PipelineStats;
