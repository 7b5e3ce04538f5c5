//! Optimization passes run on SSA form.
//!
//! - [`DeadCodeEliminationPass`] - Removes unused, effect-free definitions
//! - [`TypeInferencePass`] - Fixpoint type inference, producing a [`TypeEnv`]
//! - [`TypePropagationPass`] - Pushes expected types into numeric constants

mod deadcode;
mod inference;
mod propagation;

pub use deadcode::{has_side_effect, DeadCodeEliminationPass};
pub use inference::{binop_type, unop_type, TypeEnv, TypeInferencePass};
pub use propagation::TypePropagationPass;
