//! Dead code elimination pass.
//!
//! Removes definitions whose value is never read and whose evaluation cannot be
//! observed. Removing one definition releases the reads it made, which can make the
//! definitions feeding it dead in turn, so the pass runs a worklist until nothing
//! else becomes unused.
//!
//! # Example
//!
//! Before:
//! ```text
//! t4 = 1 + 2       // never read
//! t5 = t6.length   // never read, but may run a getter
//! return t0
//! ```
//!
//! After:
//! ```text
//! t5 = t6.length
//! return t0
//! ```
//!
//! # Side effects
//!
//! The classification over-approximates: name lookups other than `this`, member and
//! element accesses, calls, `new` and increment/decrement all count as observable.
//! Only arithmetic, comparisons, literals, temp reads and closure creation are pure.

use tracing::debug;

use crate::{
    compiler::{Pass, PassContext},
    ir::{AluOp, Expr, ExprKind, Function, Name, Stmt, StmtKind},
    ssa::DefUses,
    Result,
};

/// Dead code elimination pass.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the pass, keeping `defuses` in sync with every removal.
    ///
    /// # Arguments
    ///
    /// * `function` - The function in SSA form.
    /// * `defuses` - Its def/use index.
    ///
    /// # Returns
    ///
    /// The number of statements removed.
    pub fn run(&self, function: &mut Function, defuses: &mut DefUses) -> usize {
        let mut worklist = defuses.defined_vars();
        let mut removed = 0;

        while let Some(var) = worklist.pop() {
            if !defuses.contains(var) || !defuses.is_unused(var) {
                continue;
            }

            let Some(at) = defuses.def_site(var) else {
                defuses.remove(var);
                continue;
            };

            let Some(stmt) = function.stmt(at) else {
                defuses.remove(var);
                continue;
            };
            if stmt_has_side_effect(stmt) {
                continue;
            }

            function.remove_stmt(at);
            worklist.extend(defuses.remove_statement(at));
            defuses.remove(var);
            removed += 1;
        }

        if removed > 0 {
            debug!(function = %function.name, removed, "eliminated dead definitions");
        }
        removed
    }
}

impl Pass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run_on_function(&mut self, function: &mut Function, ctx: &mut PassContext) -> Result<bool> {
        let removed = self.run(function, &mut ctx.defuses);
        ctx.stats.statements_removed += removed;
        Ok(removed > 0)
    }
}

/// Returns true if evaluating the definition `stmt` may be observable.
fn stmt_has_side_effect(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Move { source, .. } => has_side_effect(source),
        StmtKind::Phi { .. } => false,
        _ => true,
    }
}

/// Returns true if evaluating `expr` may be observable.
#[must_use]
pub fn has_side_effect(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Temp(_)
        | ExprKind::Const(_)
        | ExprKind::String(_)
        | ExprKind::RegExp { .. }
        | ExprKind::Closure(_)
        | ExprKind::Name(Name::This) => false,
        ExprKind::Name(Name::Identifier(_))
        | ExprKind::Call(..)
        | ExprKind::New(..)
        | ExprKind::Subscript(..)
        | ExprKind::Member(..) => true,
        ExprKind::Unop(AluOp::Increment | AluOp::Decrement, _) => true,
        ExprKind::Unop(_, operand) => has_side_effect(operand),
        ExprKind::Binop(_, left, right) => has_side_effect(left) || has_side_effect(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_classification() {
        assert!(!has_side_effect(&Expr::binop(
            AluOp::Add,
            Expr::temp(1),
            Expr::number(2.0)
        )));
        assert!(!has_side_effect(&Expr::this()));
        assert!(!has_side_effect(&Expr::closure(3)));
        assert!(has_side_effect(&Expr::name("print")));
        assert!(has_side_effect(&Expr::member(Expr::temp(0), "x")));
        assert!(has_side_effect(&Expr::unop(AluOp::Increment, Expr::temp(0))));
        assert!(has_side_effect(&Expr::binop(
            AluOp::Add,
            Expr::number(1.0),
            Expr::call(Expr::name("f"), vec![])
        )));
    }

    #[test]
    fn test_removes_dead_chain() {
        // t2 = 1 + 2; t3 = t2 * t2; t4 = g(); return t0
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        b.move_to(
            entry,
            Expr::temp(2),
            Expr::binop(AluOp::Add, Expr::number(1.0), Expr::number(2.0)),
        )
        .unwrap();
        b.move_to(
            entry,
            Expr::temp(3),
            Expr::binop(AluOp::Mul, Expr::temp(2), Expr::temp(2)),
        )
        .unwrap();
        b.move_to(entry, Expr::temp(4), Expr::call(Expr::name("g"), vec![]))
            .unwrap();
        b.ret(entry, Expr::temp(0)).unwrap();
        let mut function = b.build().unwrap();
        let mut defuses = DefUses::build(&function);

        let removed = DeadCodeEliminationPass::new().run(&mut function, &mut defuses);
        assert_eq!(removed, 2);
        assert_eq!(function.block(entry).stmts.len(), 2);
        assert!(defuses.contains(4));
        assert!(!defuses.contains(2));
        assert!(!defuses.contains(3));
    }

    #[test]
    fn test_keeps_used_definition() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.move_to(entry, Expr::temp(0), Expr::number(4.0)).unwrap();
        b.ret(entry, Expr::temp(0)).unwrap();
        let mut function = b.build().unwrap();
        let mut defuses = DefUses::build(&function);

        assert_eq!(DeadCodeEliminationPass::new().run(&mut function, &mut defuses), 0);
        assert_eq!(function.stmt_count(), 2);
    }
}
