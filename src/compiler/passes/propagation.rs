//! Type propagation pass.
//!
//! Pushes the type a consumer expects down into its operands after inference. The
//! only rewrite it performs is on numeric constants: a literal used where a specific
//! number representation is expected takes that representation, so instruction
//! selection can load it without a conversion.
//!
//! ```text
//! t3 = t2 - 1        // 1: int, expected double
//! t3 = t2 - 1.0      // after propagation
//! ```
//!
//! The pass is advisory: later stages are correct with or without it.

use tracing::debug;

use crate::{
    compiler::{passes::TypeEnv, Pass, PassContext},
    ir::{Expr, ExprKind, Function, IrType, StmtKind},
    Result,
};

/// Type propagation pass.
pub struct TypePropagationPass;

impl Default for TypePropagationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePropagationPass {
    /// Creates a new type propagation pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the pass over every statement of `function`.
    ///
    /// # Returns
    ///
    /// The number of constants whose type changed.
    pub fn run(&self, function: &mut Function, env: &TypeEnv) -> usize {
        let mut retyped = 0;

        for block in &mut function.blocks {
            for stmt in &mut block.stmts {
                match &mut stmt.kind {
                    StmtKind::Move { target, source } => {
                        let required = target.ty;
                        push(target, IrType::UNKNOWN, &mut retyped);
                        push(source, required, &mut retyped);
                    }
                    StmtKind::Phi { target, incoming } => {
                        let required = env.temp_type(*target);
                        for expr in incoming {
                            push(expr, required, &mut retyped);
                        }
                    }
                    StmtKind::CJump { cond, .. } => push(cond, IrType::BOOL, &mut retyped),
                    StmtKind::Ret { expr } | StmtKind::Exp { expr } => {
                        push(expr, IrType::UNKNOWN, &mut retyped);
                    }
                    StmtKind::Jump { .. } | StmtKind::Try { .. } => {}
                }
            }
        }

        if retyped > 0 {
            debug!(function = %function.name, retyped, "propagated types");
        }
        retyped
    }
}

impl Pass for TypePropagationPass {
    fn name(&self) -> &'static str {
        "type-propagation"
    }

    fn should_run(&self, _function: &Function, ctx: &PassContext) -> bool {
        ctx.types.is_some()
    }

    fn run_on_function(&mut self, function: &mut Function, ctx: &mut PassContext) -> Result<bool> {
        let Some(env) = ctx.types.as_ref() else {
            return Ok(false);
        };
        let retyped = self.run(function, env);
        ctx.stats.constants_retyped += retyped;
        Ok(retyped > 0)
    }
}

/// Returns true if `ty` names exactly one numeric representation.
fn is_single_number(ty: IrType) -> bool {
    ty == IrType::SINT32 || ty == IrType::UINT32 || ty == IrType::DOUBLE
}

fn push(expr: &mut Expr, required: IrType, retyped: &mut usize) {
    let own = expr.ty;
    match &mut expr.kind {
        ExprKind::Const(value) => {
            if matches!(value, crate::ir::ConstValue::Number(_))
                && is_single_number(required)
                && expr.ty != required
            {
                expr.ty = required;
                *retyped += 1;
            }
        }
        ExprKind::Unop(_, operand) => push(operand, own, retyped),
        ExprKind::Binop(_, left, right) => {
            push(left, own, retyped);
            push(right, own, retyped);
        }
        ExprKind::Call(base, args) | ExprKind::New(base, args) => {
            push(base, IrType::UNKNOWN, retyped);
            for arg in args {
                push(arg, IrType::UNKNOWN, retyped);
            }
        }
        ExprKind::Subscript(base, index) => {
            push(base, IrType::UNKNOWN, retyped);
            push(index, IrType::UNKNOWN, retyped);
        }
        ExprKind::Member(base, _) => push(base, IrType::UNKNOWN, retyped),
        ExprKind::Temp(_)
        | ExprKind::String(_)
        | ExprKind::RegExp { .. }
        | ExprKind::Name(_)
        | ExprKind::Closure(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::{passes::TypeInferencePass, PipelineStats},
        ir::{AluOp, FunctionBuilder},
        ssa::DefUses,
    };

    #[test]
    fn test_constant_takes_required_number_type() {
        // t1 = t2 - 1 where t2 is a double; the literal 1 starts out as int
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.move_to(entry, Expr::temp(2), Expr::number(0.5)).unwrap();
        b.move_to(
            entry,
            Expr::temp(1),
            Expr::binop(AluOp::Sub, Expr::temp(2), Expr::number(1.0)),
        )
        .unwrap();
        b.ret(entry, Expr::temp(1)).unwrap();
        let mut function = b.build().unwrap();
        let defuses = DefUses::build(&function);
        let env = TypeInferencePass::new().run(&mut function, &defuses);

        assert_eq!(TypePropagationPass::new().run(&mut function, &env), 1);
        match &function.block(entry).stmts[1].kind {
            StmtKind::Move { source, .. } => match &source.kind {
                ExprKind::Binop(_, _, right) => assert_eq!(right.ty, IrType::DOUBLE),
                _ => panic!("expected binop"),
            },
            _ => panic!("expected move"),
        }
    }

    #[test]
    fn test_condition_constants_untouched() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let exit = b.new_block();
        b.cjump(entry, Expr::number(1.0), exit, exit).unwrap();
        b.ret(exit, Expr::undefined()).unwrap();
        let mut function = b.build().unwrap();
        let env = TypeEnv::default();

        assert_eq!(TypePropagationPass::new().run(&mut function, &env), 0);
    }

    #[test]
    fn test_runs_after_inference_through_pass_trait() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.move_to(entry, Expr::temp(2), Expr::number(0.5)).unwrap();
        b.move_to(
            entry,
            Expr::temp(1),
            Expr::binop(AluOp::Sub, Expr::temp(2), Expr::number(1.0)),
        )
        .unwrap();
        b.ret(entry, Expr::temp(1)).unwrap();
        let mut function = b.build().unwrap();
        let mut ctx = PassContext::new(DefUses::build(&function), PipelineStats::default());

        let mut propagation = TypePropagationPass::new();
        assert!(!propagation.should_run(&function, &ctx));

        let mut inference = TypeInferencePass::new();
        assert!(inference.run_on_function(&mut function, &mut ctx).unwrap());
        assert_eq!(ctx.stats.inference_iterations, inference.iterations());
        assert!(propagation.should_run(&function, &ctx));
        assert!(propagation.run_on_function(&mut function, &mut ctx).unwrap());
        assert_eq!(ctx.stats.constants_retyped, 1);
    }
}
