//! The pipeline driver.
//!
//! [`Optimizer::run`] takes one function from front-end IR to the non-SSA,
//! linearized form instruction selection consumes. [`compile_functions`] does the
//! same for many functions at once on the rayon thread pool; functions share no
//! state while being optimized.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::{
    compiler::{
        passes::{DeadCodeEliminationPass, TypeEnv, TypeInferencePass, TypePropagationPass},
        OptimizerConfig, Pass, PassContext, PipelineStats,
    },
    ir::Function,
    ssa::{
        check_critical_edges, cleanup_phis, deconstruct_ssa, linearize, place_phis, rename,
        split_critical_edges, DefUses, VariableCollector,
    },
    utils::graph::algorithms::{compute_dominance_frontiers, compute_dominators_rooted},
    Error, Result,
};

/// What the pipeline hands back besides the rewritten function.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Maps each SSA name allocated for a formal or local back to that slot. Empty
    /// when SSA conversion was skipped.
    pub mapping: HashMap<u32, u32>,
    /// Counters for every stage that ran.
    pub stats: PipelineStats,
    /// Inferred types, when type inference ran.
    pub types: Option<TypeEnv>,
}

/// Runs the optimization pipeline on single functions.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::prelude::*;
///
/// let mut b = FunctionBuilder::new("f", 0, 0);
/// let entry = b.entry();
/// b.ret(entry, Expr::undefined())?;
/// let mut function = b.build()?;
///
/// let output = Optimizer::default().run(&mut function)?;
/// assert!(output.mapping.is_empty());
/// # Ok::<(), ssair::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    /// Creates an optimizer with the given stage switches.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Optimizer { config }
    }

    /// The stage switches in effect.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimizes `function` in place.
    ///
    /// Unreachable blocks are pruned first. Functions containing a protected region,
    /// or every function when SSA is disabled, are returned after pruning with an
    /// empty mapping.
    ///
    /// # Arguments
    ///
    /// * `function` - A function whose blocks all end in exactly one terminator
    ///
    /// # Returns
    ///
    /// The SSA name mapping, stage counters and inferred types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsaError`] if a block lacks a terminator or has one before its
    /// last statement, if the recorded edges disagree with the terminators, or if a
    /// reachable block branches back to the entry block of a function converted to
    /// SSA form.
    #[instrument(skip_all, name = "optimize", fields(function = %function.name))]
    pub fn run(&self, function: &mut Function) -> Result<PipelineOutput> {
        validate(function)?;

        let mut output = PipelineOutput::default();
        output.stats.blocks_pruned = linearize(function);

        if !self.config.ssa || function.has_try {
            output.stats.ssa_skipped = true;
            debug!(has_try = function.has_try, "skipping SSA conversion");
            return Ok(output);
        }

        check_entry(function)?;
        let dom_tree = compute_dominators_rooted(&*function);
        let frontiers = compute_dominance_frontiers(&*function, &dom_tree);

        let collector = VariableCollector::collect(function);
        output.stats.phis_inserted = place_phis(function, &collector, &frontiers);

        let temps_before = function.temp_count;
        output.mapping = rename(function, &dom_tree);
        output.stats.temps_allocated = (function.temp_count - temps_before) as usize;

        let mut ctx = PassContext::new(DefUses::build(function), output.stats);
        if self.config.phi_cleanup {
            ctx.stats.phis_cleaned = cleanup_phis(function, &mut ctx.defuses);
        }
        for mut pass in self.passes() {
            if !pass.should_run(function, &ctx) {
                trace!(pass = pass.name(), "skipped pass");
                continue;
            }
            let changed = pass.run_on_function(function, &mut ctx)?;
            trace!(pass = pass.name(), changed, "ran pass");
        }
        output.stats = ctx.stats;
        output.types = ctx.types;

        output.stats.edges_split = split_critical_edges(function);
        if self.config.verify_critical_edges {
            check_critical_edges(function);
        }

        let deconstructed = deconstruct_ssa(function);
        output.stats.moves_inserted = deconstructed.moves_inserted;
        output.stats.moves_coalesced = deconstructed.moves_coalesced;
        output.stats.blocks_pruned += linearize(function);

        info!(
            blocks = function.block_count(),
            temps = function.temp_count,
            stats = %output.stats,
            "optimized function"
        );
        Ok(output)
    }
}

impl Optimizer {
    /// The enabled passes, in the order they run.
    fn passes(&self) -> Vec<Box<dyn Pass>> {
        let mut passes: Vec<Box<dyn Pass>> = Vec::new();
        if self.config.dead_code_elimination {
            passes.push(Box::new(DeadCodeEliminationPass::new()));
        }
        if self.config.type_inference {
            passes.push(Box::new(TypeInferencePass::new()));
            if self.config.type_propagation {
                passes.push(Box::new(TypePropagationPass::new()));
            }
        }
        passes
    }
}

/// Optimizes every function of `functions` in parallel.
///
/// # Returns
///
/// One [`PipelineOutput`] per function, in input order.
///
/// # Errors
///
/// Returns the error of the first invalid function encountered. Functions already
/// processed by then stay optimized.
pub fn compile_functions(
    functions: &mut [Function],
    config: OptimizerConfig,
) -> Result<Vec<PipelineOutput>> {
    let optimizer = Optimizer::new(config);
    let outputs = functions
        .par_iter_mut()
        .map(|function| optimizer.run(function))
        .collect::<Result<Vec<_>>>()?;

    let mut total = PipelineStats::default();
    for output in &outputs {
        total += output.stats;
    }
    info!(functions = outputs.len(), stats = %total, "compiled functions");
    Ok(outputs)
}

fn validate(function: &Function) -> Result<()> {
    for id in function.block_ids() {
        let block = function.block(id);
        let Some((last, body)) = block.stmts.split_last() else {
            return Err(Error::SsaError(format!(
                "block {} of {} is empty",
                id, function.name
            )));
        };
        if !last.is_terminator() {
            return Err(Error::SsaError(format!(
                "block {} of {} does not end in a terminator",
                id, function.name
            )));
        }
        if body.iter().any(|stmt| stmt.is_terminator()) {
            return Err(Error::SsaError(format!(
                "block {} of {} has a terminator before its end",
                id, function.name
            )));
        }
        if last.targets() != block.succs {
            return Err(Error::SsaError(format!(
                "successors of block {} of {} disagree with its terminator",
                id, function.name
            )));
        }
        for &succ in &block.succs {
            if succ.index() >= function.block_count()
                || !function.block(succ).preds.contains(&id)
            {
                return Err(Error::SsaError(format!(
                    "edge {} -> {} of {} is not recorded on both ends",
                    id, succ, function.name
                )));
            }
        }
    }
    Ok(())
}

/// Dominator construction needs an entry block no edge leads back to.
fn check_entry(function: &Function) -> Result<()> {
    let entry = function.block(function.entry());
    if entry.preds.is_empty() {
        return Ok(());
    }
    Err(Error::SsaError(format!(
        "entry block {} of {} has {} predecessors",
        function.entry(),
        function.name,
        entry.preds.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AluOp, BlockId, Expr, FunctionBuilder, IrType, StmtKind, Temp};

    /// `function f(a) { var x; if (a) x = 1; else x = 2; return x; }`
    fn diamond() -> Function {
        let mut b = FunctionBuilder::new("f", 1, 1);
        let entry = b.entry();
        let then_bb = b.new_block();
        let else_bb = b.new_block();
        let exit = b.new_block();
        b.cjump(entry, Expr::temp(0), then_bb, else_bb).unwrap();
        b.move_to(then_bb, Expr::temp(1), Expr::number(1.0)).unwrap();
        b.jump(then_bb, exit).unwrap();
        b.move_to(else_bb, Expr::temp(1), Expr::number(2.0)).unwrap();
        b.jump(else_bb, exit).unwrap();
        b.ret(exit, Expr::temp(1)).unwrap();
        b.build().unwrap()
    }

    fn has_phi(function: &Function) -> bool {
        function.stmts().any(|(_, stmt)| stmt.is_phi())
    }

    #[test]
    fn test_diamond_round_trip() {
        let mut function = diamond();
        let output = Optimizer::default().run(&mut function).unwrap();

        assert!(!output.stats.ssa_skipped);
        assert_eq!(output.stats.phis_inserted, 1);
        assert_eq!(output.stats.moves_coalesced, 2);
        assert_eq!(output.stats.moves_inserted, 0);
        assert!(!has_phi(&function));

        // Every fresh name of x maps back to local slot 1.
        assert!(!output.mapping.is_empty());
        assert!(output.mapping.values().all(|&slot| slot == 1));

        let types = output.types.unwrap();
        let exit = BlockId::new(3);
        let StmtKind::Ret { expr } = &function.block(exit).stmts[0].kind else {
            panic!("join block should start with the return");
        };
        assert_eq!(types.expr_type(expr), IrType::SINT32);
    }

    #[test]
    fn test_try_skips_ssa() {
        let mut b = FunctionBuilder::new("f", 0, 1);
        let entry = b.entry();
        let body = b.new_block();
        let handler = b.new_block();
        b.try_block(entry, body, handler, Temp::new(0)).unwrap();
        b.move_to(body, Expr::temp(0), Expr::number(1.0)).unwrap();
        b.ret(body, Expr::temp(0)).unwrap();
        b.ret(handler, Expr::undefined()).unwrap();
        let mut function = b.build().unwrap();
        let before = function.stmt_count();

        let output = Optimizer::default().run(&mut function).unwrap();
        assert!(output.stats.ssa_skipped);
        assert!(output.mapping.is_empty());
        assert!(output.types.is_none());
        assert_eq!(function.stmt_count(), before);
    }

    #[test]
    fn test_disabled_only_prunes() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let dead = b.new_block();
        b.ret(entry, Expr::undefined()).unwrap();
        b.ret(dead, Expr::number(1.0)).unwrap();
        let mut function = b.build().unwrap();

        let output = Optimizer::new(OptimizerConfig::disabled())
            .run(&mut function)
            .unwrap();
        assert!(output.stats.ssa_skipped);
        assert_eq!(output.stats.blocks_pruned, 1);
        assert_eq!(function.block_count(), 1);
    }

    #[test]
    fn test_dead_code_removed() {
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        let unused = b.new_temp();
        b.move_to(
            entry,
            Expr::from_temp(unused),
            Expr::binop(AluOp::Add, Expr::temp(0), Expr::number(1.0)),
        )
        .unwrap();
        b.ret(entry, Expr::temp(0)).unwrap();
        let mut function = b.build().unwrap();

        let output = Optimizer::default().run(&mut function).unwrap();
        assert_eq!(output.stats.statements_removed, 1);
        assert_eq!(function.stmt_count(), 1);
    }

    #[test]
    fn test_rejects_inconsistent_edges() {
        let mut function = diamond();
        function.blocks[1].succs.clear();
        assert!(matches!(
            Optimizer::default().run(&mut function),
            Err(Error::SsaError(_))
        ));
    }

    #[test]
    fn test_rejects_missing_terminator() {
        let mut function = diamond();
        function.blocks[3].stmts.clear();
        assert!(matches!(
            Optimizer::default().run(&mut function),
            Err(Error::SsaError(_))
        ));
    }

    #[test]
    fn test_pass_order_follows_config() {
        let names = |config: OptimizerConfig| -> Vec<&'static str> {
            Optimizer::new(config)
                .passes()
                .iter()
                .map(|pass| pass.name())
                .collect()
        };

        assert_eq!(
            names(OptimizerConfig::default()),
            ["dead-code-elimination", "type-inference", "type-propagation"]
        );
        assert_eq!(
            names(OptimizerConfig {
                type_inference: false,
                ..OptimizerConfig::default()
            }),
            ["dead-code-elimination"]
        );
        assert!(names(OptimizerConfig::disabled()).is_empty());
    }

    #[test]
    fn test_rejects_entry_with_predecessors() {
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        let exit = b.new_block();
        b.cjump(entry, Expr::temp(0), entry, exit).unwrap();
        b.ret(exit, Expr::temp(0)).unwrap();
        let mut function = b.build().unwrap();
        let before = function.stmt_count();

        assert!(matches!(
            Optimizer::default().run(&mut function),
            Err(Error::SsaError(_))
        ));
        assert_eq!(function.stmt_count(), before);
    }

    #[test]
    fn test_unreachable_jump_to_entry_is_pruned() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let dead = b.new_block();
        b.ret(entry, Expr::undefined()).unwrap();
        b.jump(dead, entry).unwrap();
        let mut function = b.build().unwrap();

        let output = Optimizer::default().run(&mut function).unwrap();
        assert_eq!(output.stats.blocks_pruned, 1);
        assert!(function.block(function.entry()).preds.is_empty());
    }

    #[test]
    fn test_compile_functions_parallel() {
        let mut functions: Vec<Function> = (0..8).map(|_| diamond()).collect();
        let outputs = compile_functions(&mut functions, OptimizerConfig::default()).unwrap();

        assert_eq!(outputs.len(), 8);
        assert!(outputs.iter().all(|o| o.stats.phis_inserted == 1));
        assert!(functions.iter().all(|f| !has_phi(f)));
    }
}
