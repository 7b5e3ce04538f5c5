//! Flow-sensitive type inference over SSA form.
//!
//! Every SSA name gets an [`IrType`], the set of runtime types it may hold. The
//! analysis is a worklist fixpoint over statements: evaluating a definition joins
//! the type of its right-hand side into the recorded type of its target, and any
//! change re-enqueues the statements reading that target.
//!
//! # Convergence
//!
//! Recorded types are only ever joined, never replaced, so each name's type grows
//! monotonically in a lattice of finite height. Every statement is re-enqueued at
//! most once per change of one of its operands, which bounds the work.
//!
//! # Pinned temps
//!
//! Scoped temps and the formal and local slots themselves (reads that no definition
//! reaches, or slots excluded from SSA because they escape) are always
//! [`IrType::OBJECT`]: their value is not under the function's control.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::{
    compiler::{Pass, PassContext},
    ir::{
        AluOp, BlockId, Expr, ExprKind, Function, IrType, JoinSemiLattice, Stmt, StmtKind, StmtRef,
        Temp,
    },
    ssa::DefUses,
    utils::graph::algorithms::reverse_postorder,
    Result,
};

/// Types inferred for the SSA names of one function.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    types: HashMap<u32, IrType>,
    slot_count: u32,
}

impl TypeEnv {
    fn new(function: &Function) -> Self {
        TypeEnv {
            types: HashMap::new(),
            slot_count: function.slot_count(),
        }
    }

    /// The type of a read of `temp`.
    #[must_use]
    pub fn temp_type(&self, temp: Temp) -> IrType {
        if temp.is_scoped() || temp.index < self.slot_count {
            return IrType::OBJECT;
        }
        self.types.get(&temp.index).copied().unwrap_or(IrType::UNKNOWN)
    }

    /// Number of names with a recorded type.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Joins `ty` into the recorded type of `index`, returning the old and new type
    /// on change.
    fn record(&mut self, index: u32, ty: IrType) -> Option<(IrType, IrType)> {
        let old = self.types.get(&index).copied().unwrap_or(IrType::UNKNOWN);
        let new = old.join(&ty);
        if new == old {
            return None;
        }
        self.types.insert(index, new);
        Some((old, new))
    }

    /// Evaluates the type of `expr` bottom-up.
    #[must_use]
    pub fn expr_type(&self, expr: &Expr) -> IrType {
        match &expr.kind {
            ExprKind::Temp(temp) => self.temp_type(*temp),
            ExprKind::Const(value) => value.ir_type(),
            ExprKind::String(_) => IrType::STRING,
            ExprKind::RegExp { .. }
            | ExprKind::Name(_)
            | ExprKind::Closure(_)
            | ExprKind::Call(..)
            | ExprKind::New(..)
            | ExprKind::Subscript(..)
            | ExprKind::Member(..) => IrType::OBJECT,
            ExprKind::Unop(op, _) => unop_type(*op),
            ExprKind::Binop(op, left, right) => {
                binop_type(*op, self.expr_type(left), self.expr_type(right))
            }
        }
    }
}

/// Result type of a unary operator.
#[must_use]
pub fn unop_type(op: AluOp) -> IrType {
    match op {
        AluOp::Not => IrType::BOOL,
        AluOp::Compl => IrType::SINT32,
        AluOp::UMinus | AluOp::UPlus | AluOp::Increment | AluOp::Decrement => IrType::DOUBLE,
        _ => IrType::UNKNOWN,
    }
}

/// Result type of a binary operator given its operand types.
#[must_use]
pub fn binop_type(op: AluOp, left: IrType, right: IrType) -> IrType {
    match op {
        AluOp::Add => {
            if left.contains(IrType::STRING) || right.contains(IrType::STRING) {
                IrType::STRING
            } else if !left.is_unknown() && !right.is_unknown() {
                IrType::DOUBLE
            } else {
                IrType::UNKNOWN
            }
        }
        AluOp::Sub | AluOp::Mul | AluOp::Div | AluOp::Mod => IrType::DOUBLE,
        AluOp::BitAnd | AluOp::BitOr | AluOp::BitXor | AluOp::LShift | AluOp::RShift => {
            IrType::SINT32
        }
        AluOp::URShift => IrType::UINT32,
        AluOp::Instanceof | AluOp::In | AluOp::And | AluOp::Or => IrType::BOOL,
        op if op.is_comparison() => IrType::BOOL,
        _ => IrType::UNKNOWN,
    }
}

/// Type inference pass.
///
/// Holds the worklist so that callers can inspect how many statements were
/// evaluated after a run.
#[derive(Default)]
pub struct TypeInferencePass {
    worklist: VecDeque<StmtRef>,
    queued: HashSet<StmtRef>,
    iterations: usize,
}

impl TypeInferencePass {
    /// Creates a new type inference pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of statement evaluations performed by the last run.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Infers the type of every SSA name, then writes the result onto every
    /// expression of `function`.
    ///
    /// # Arguments
    ///
    /// * `function` - The function in SSA form, without unreachable blocks.
    /// * `defuses` - Its def/use index, used to find the readers of a name.
    ///
    /// # Returns
    ///
    /// The inferred types.
    pub fn run(&mut self, function: &mut Function, defuses: &DefUses) -> TypeEnv {
        let env = self.solve(function, defuses, |index, old, new| {
            trace!(temp = index, %old, %new, "widened type");
        });

        for block in &mut function.blocks {
            for stmt in &mut block.stmts {
                annotate_stmt(&env, stmt);
            }
        }

        debug!(
            function = %function.name,
            typed = env.len(),
            iterations = self.iterations,
            "inferred types"
        );
        env
    }

    /// Runs the worklist to a fixpoint without touching `function`.
    ///
    /// `on_change` is called with the name, old type and new type every time a
    /// recorded type grows.
    fn solve(
        &mut self,
        function: &Function,
        defuses: &DefUses,
        mut on_change: impl FnMut(u32, IrType, IrType),
    ) -> TypeEnv {
        let mut env = TypeEnv::new(function);
        self.worklist.clear();
        self.queued.clear();
        self.iterations = 0;

        for node in reverse_postorder(function, function.entry_node()) {
            let block = BlockId::from(node);
            if block != function.entry() && function.block(block).preds.is_empty() {
                continue;
            }
            for stmt in &function.block(block).stmts {
                self.enqueue(StmtRef { block, id: stmt.id });
            }
        }

        while let Some(at) = self.worklist.pop_front() {
            self.queued.remove(&at);
            self.iterations += 1;

            let Some(stmt) = function.stmt(at) else {
                continue;
            };
            let Some((target, ty)) = evaluate(&env, function, stmt) else {
                continue;
            };
            if let Some((old, new)) = env.record(target, ty) {
                on_change(target, old, new);
                for &user in defuses.uses_of(target) {
                    self.enqueue(user);
                }
            }
        }
        env
    }

    fn enqueue(&mut self, at: StmtRef) {
        if self.queued.insert(at) {
            self.worklist.push_back(at);
        }
    }
}

impl Pass for TypeInferencePass {
    fn name(&self) -> &'static str {
        "type-inference"
    }

    fn run_on_function(&mut self, function: &mut Function, ctx: &mut PassContext) -> Result<bool> {
        let env = self.run(function, &ctx.defuses);
        ctx.stats.inference_iterations += self.iterations;
        let typed = !env.is_empty();
        ctx.types = Some(env);
        Ok(typed)
    }
}

/// Computes the type a definition contributes to its target.
fn evaluate(env: &TypeEnv, function: &Function, stmt: &Stmt) -> Option<(u32, IrType)> {
    let (target, ty) = match &stmt.kind {
        StmtKind::Move { target, source } => (target.as_temp()?, env.expr_type(source)),
        StmtKind::Phi { target, incoming } => {
            let joined = incoming
                .iter()
                .map(|expr| env.expr_type(expr))
                .fold(IrType::UNKNOWN, |acc, ty| acc.join(&ty));
            (*target, joined.collapse_phi())
        }
        StmtKind::Try { exception, .. } => (*exception, IrType::OBJECT),
        _ => return None,
    };

    if !function.is_collectible(target) || target.index < function.slot_count() {
        return None;
    }
    Some((target.index, ty))
}

fn annotate(env: &TypeEnv, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Unop(_, operand) => annotate(env, operand),
        ExprKind::Binop(_, left, right) | ExprKind::Subscript(left, right) => {
            annotate(env, left);
            annotate(env, right);
        }
        ExprKind::Call(base, args) | ExprKind::New(base, args) => {
            annotate(env, base);
            for arg in args {
                annotate(env, arg);
            }
        }
        ExprKind::Member(base, _) => annotate(env, base),
        _ => {}
    }
    expr.ty = env.expr_type(expr);
}

fn annotate_stmt(env: &TypeEnv, stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::Move { target, source } => {
            annotate(env, target);
            annotate(env, source);
        }
        StmtKind::Phi { incoming, .. } => {
            for expr in incoming {
                annotate(env, expr);
            }
        }
        StmtKind::CJump { cond: expr, .. } | StmtKind::Ret { expr } | StmtKind::Exp { expr } => {
            annotate(env, expr);
        }
        StmtKind::Jump { .. } | StmtKind::Try { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_operator_table() {
        assert_eq!(unop_type(AluOp::Not), IrType::BOOL);
        assert_eq!(unop_type(AluOp::Compl), IrType::SINT32);
        assert_eq!(unop_type(AluOp::Increment), IrType::DOUBLE);
        assert_eq!(
            binop_type(AluOp::Add, IrType::SINT32, IrType::STRING),
            IrType::STRING
        );
        assert_eq!(
            binop_type(AluOp::Add, IrType::SINT32, IrType::BOOL),
            IrType::DOUBLE
        );
        assert_eq!(
            binop_type(AluOp::Add, IrType::SINT32, IrType::UNKNOWN),
            IrType::UNKNOWN
        );
        assert_eq!(
            binop_type(AluOp::URShift, IrType::UNKNOWN, IrType::UNKNOWN),
            IrType::UINT32
        );
        assert_eq!(
            binop_type(AluOp::StrictEqual, IrType::OBJECT, IrType::NULL),
            IrType::BOOL
        );
    }

    // L0: t1 = 0; jump L1
    // L1: t2 = phi(t1, t3); cjump t2 < 10 ? L2 : L3
    // L2: t3 = <step>; jump L1
    // L3: return t2
    fn loop_function(step: Expr) -> Function {
        let mut function = Function::new("f", 0, 0);
        let entry = function.entry();
        let header = function.add_block();
        let body = function.add_block();
        let exit = function.add_block();
        let stmts = [
            (
                entry,
                StmtKind::Move {
                    target: Expr::temp(1),
                    source: Expr::number(0.0),
                },
            ),
            (entry, StmtKind::Jump { target: header }),
            (
                header,
                StmtKind::Phi {
                    target: Temp::new(2),
                    incoming: vec![Expr::temp(1), Expr::temp(3)],
                },
            ),
            (
                header,
                StmtKind::CJump {
                    cond: Expr::binop(AluOp::Lt, Expr::temp(2), Expr::number(10.0)),
                    iftrue: body,
                    iffalse: exit,
                },
            ),
            (
                body,
                StmtKind::Move {
                    target: Expr::temp(3),
                    source: step,
                },
            ),
            (body, StmtKind::Jump { target: header }),
            (exit, StmtKind::Ret { expr: Expr::temp(2) }),
        ];
        for (block, kind) in stmts {
            let stmt = function.make_stmt(kind);
            function.block_mut(block).stmts.push(stmt);
        }
        function.add_edge(entry, header);
        function.add_edge(header, body);
        function.add_edge(header, exit);
        function.add_edge(body, header);
        function.temp_count = 4;
        function
    }

    #[test]
    fn test_infers_through_loop() {
        let mut function =
            loop_function(Expr::binop(AluOp::Add, Expr::temp(2), Expr::number(1.0)));
        let exit = BlockId::new(3);

        let defuses = DefUses::build(&function);
        let mut pass = TypeInferencePass::new();
        let env = pass.run(&mut function, &defuses);

        assert_eq!(env.temp_type(Temp::new(1)), IrType::SINT32);
        assert_eq!(env.temp_type(Temp::new(2)), IrType::DOUBLE);
        assert_eq!(env.temp_type(Temp::new(3)), IrType::DOUBLE);
        assert!(pass.iterations() >= function.stmt_count());

        match &function.block(exit).stmts[0].kind {
            StmtKind::Ret { expr } => assert_eq!(expr.ty, IrType::DOUBLE),
            _ => panic!("expected ret"),
        }
    }

    #[test]
    fn test_types_only_widen() {
        // The back edge brings an object into the phi after the header was first
        // evaluated with only the number from the entry.
        let function = loop_function(Expr::member(Expr::temp(2), "next"));
        let defuses = DefUses::build(&function);

        let mut last: HashMap<u32, IrType> = HashMap::new();
        let mut revisits = 0;
        let env = TypeInferencePass::new().solve(&function, &defuses, |index, old, new| {
            let previous = last.insert(index, new);
            if previous.is_some() {
                revisits += 1;
            }
            assert_eq!(old, previous.unwrap_or(IrType::UNKNOWN));
            assert!(new.contains(old), "t{index} went from {old} to {new}");
            assert_ne!(new, old);
        });

        assert!(revisits >= 1);
        assert_eq!(last[&2], IrType::DOUBLE | IrType::OBJECT);
        for (index, ty) in last {
            assert_eq!(env.temp_type(Temp::new(index)), ty);
        }
    }

    #[test]
    fn test_pinned_temps() {
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        b.move_to(entry, Expr::temp(1), Expr::string("s")).unwrap();
        b.ret(entry, Expr::binop(AluOp::Add, Expr::temp(0), Expr::scoped(0, 1)))
            .unwrap();
        let mut function = b.build().unwrap();
        let defuses = DefUses::build(&function);
        let env = TypeInferencePass::new().run(&mut function, &defuses);

        assert_eq!(env.temp_type(Temp::new(0)), IrType::OBJECT);
        assert_eq!(env.temp_type(Temp::scoped(0, 1)), IrType::OBJECT);
        assert_eq!(env.temp_type(Temp::new(1)), IrType::STRING);
    }
}
