//! The trait every optimization pass implements.
//!
//! Passes run on a function already in SSA form, between renaming and edge
//! splitting. The [`crate::compiler::Optimizer`] builds the list of enabled passes
//! from its configuration and drives them in a fixed order through [`Pass`], handing
//! each one the same [`PassContext`].

use crate::{
    compiler::{passes::TypeEnv, PipelineStats},
    ir::Function,
    ssa::DefUses,
    Result,
};

/// State shared by the passes of one pipeline run.
#[derive(Debug)]
pub struct PassContext {
    /// Def/use index of the function. Passes removing statements keep it in sync.
    pub defuses: DefUses,
    /// Types inferred so far, once type inference has run.
    pub types: Option<TypeEnv>,
    /// Counters the passes record their work into.
    pub stats: PipelineStats,
}

impl PassContext {
    /// Creates a context over `defuses`, continuing the counters in `stats`.
    #[must_use]
    pub fn new(defuses: DefUses, stats: PipelineStats) -> Self {
        PassContext {
            defuses,
            types: None,
            stats,
        }
    }
}

/// An optimization pass over SSA form.
///
/// Passes must be `Send + Sync` so functions can be optimized on the rayon pool.
/// A pass instance is used for one function at a time.
pub trait Pass: Send + Sync {
    /// Unique name for logging.
    fn name(&self) -> &'static str;

    /// Should this pass run on `function`?
    ///
    /// Called before [`Pass::run_on_function`]. Override to skip functions the pass
    /// has nothing to do for, or whose prerequisites are missing from `ctx`.
    fn should_run(&self, _function: &Function, _ctx: &PassContext) -> bool {
        true
    }

    /// Runs the pass on one function.
    ///
    /// # Arguments
    ///
    /// * `function` - The function in SSA form.
    /// * `ctx` - Def/use index, inferred types and counters of this run.
    ///
    /// # Returns
    ///
    /// `true` if the pass changed the function.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot process the function.
    fn run_on_function(&mut self, function: &mut Function, ctx: &mut PassContext) -> Result<bool>;
}
