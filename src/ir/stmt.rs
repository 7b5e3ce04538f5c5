//! Statements.
//!
//! A block is a list of [`Stmt`]s whose last element is a terminator
//! ([`StmtKind::Jump`], [`StmtKind::CJump`], [`StmtKind::Ret`] or [`StmtKind::Try`]).
//! Phi nodes, when present, always form a prefix of the block.

use std::fmt;

use crate::ir::{BlockId, Expr, Temp};

/// Identity of a statement, unique within its function.
///
/// Statements move between positions as passes insert and delete around them, so
/// analyses refer to statements by id rather than by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub(crate) u32);

impl StmtId {
    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Location of a statement: its owning block and its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtRef {
    /// The block containing the statement.
    pub block: BlockId,
    /// The statement id.
    pub id: StmtId,
}

/// The shape of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `target = source`. The target is a temp, a name, a member or a subscript.
    Move {
        /// Destination of the assignment.
        target: Expr,
        /// Value assigned.
        source: Expr,
    },
    /// `target = phi(incoming...)`, one operand per predecessor in the order of the
    /// block's predecessor list.
    Phi {
        /// The temp defined by the phi.
        target: Temp,
        /// Incoming values, correlated with the owning block's predecessors.
        incoming: Vec<Expr>,
    },
    /// Unconditional jump.
    Jump {
        /// Jump target.
        target: BlockId,
    },
    /// Conditional jump.
    CJump {
        /// The condition.
        cond: Expr,
        /// Taken when the condition is true.
        iftrue: BlockId,
        /// Taken when the condition is false.
        iffalse: BlockId,
    },
    /// Return from the function.
    Ret {
        /// The returned value.
        expr: Expr,
    },
    /// Evaluate an expression for its effect only.
    Exp {
        /// The evaluated expression.
        expr: Expr,
    },
    /// Enter a protected region. Functions containing one are never put into SSA form.
    Try {
        /// First block of the protected region.
        body: BlockId,
        /// First block of the handler.
        handler: BlockId,
        /// The temp receiving the thrown value in the handler.
        exception: Temp,
    },
}

/// A statement with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Identity of the statement within its function.
    pub id: StmtId,
    /// The statement itself.
    pub kind: StmtKind,
}

impl Stmt {
    /// Returns true if the statement ends a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Jump { .. }
                | StmtKind::CJump { .. }
                | StmtKind::Ret { .. }
                | StmtKind::Try { .. }
        )
    }

    /// Returns true for phi nodes.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, StmtKind::Phi { .. })
    }

    /// Returns the successor blocks named by this terminator, in edge order.
    ///
    /// Non-terminators and `Ret` have no successors.
    #[must_use]
    pub fn targets(&self) -> Vec<BlockId> {
        match self.kind {
            StmtKind::Jump { target } => vec![target],
            StmtKind::CJump { iftrue, iffalse, .. } => vec![iftrue, iffalse],
            StmtKind::Try { body, handler, .. } => vec![body, handler],
            _ => Vec::new(),
        }
    }

    /// Returns the temp defined by this statement, if any.
    #[must_use]
    pub fn defined_temp(&self) -> Option<Temp> {
        match &self.kind {
            StmtKind::Move { target, .. } => target.as_temp(),
            StmtKind::Phi { target, .. } => Some(*target),
            StmtKind::Try { exception, .. } => Some(*exception),
            _ => None,
        }
    }

    /// Calls `f` for every temp read by this statement.
    ///
    /// The destination of a `Move` to a temp is a definition, not a use, but the base
    /// and index of a member or subscript destination are uses.
    pub fn for_each_use(&self, f: &mut impl FnMut(Temp)) {
        match &self.kind {
            StmtKind::Move { target, source } => {
                source.for_each_temp(f);
                if target.as_temp().is_none() {
                    target.for_each_temp(f);
                }
            }
            StmtKind::Phi { incoming, .. } => {
                for expr in incoming {
                    expr.for_each_temp(f);
                }
            }
            StmtKind::CJump { cond: expr, .. }
            | StmtKind::Ret { expr }
            | StmtKind::Exp { expr } => expr.for_each_temp(f),
            StmtKind::Jump { .. } | StmtKind::Try { .. } => {}
        }
    }

    /// Calls `f` for every temp read by this statement outside of phi operands,
    /// allowing it to be rewritten.
    pub fn for_each_use_mut(&mut self, f: &mut impl FnMut(&mut Temp)) {
        match &mut self.kind {
            StmtKind::Move { target, source } => {
                source.for_each_temp_mut(f);
                if target.as_temp().is_none() {
                    target.for_each_temp_mut(f);
                }
            }
            StmtKind::CJump { cond: expr, .. }
            | StmtKind::Ret { expr }
            | StmtKind::Exp { expr } => expr.for_each_temp_mut(f),
            StmtKind::Phi { .. } | StmtKind::Jump { .. } | StmtKind::Try { .. } => {}
        }
    }

    /// Returns a mutable reference to the defined temp, if any.
    pub fn defined_temp_mut(&mut self) -> Option<&mut Temp> {
        match &mut self.kind {
            StmtKind::Move { target, .. } => match &mut target.kind {
                crate::ir::ExprKind::Temp(temp) => Some(temp),
                _ => None,
            },
            StmtKind::Phi { target, .. } => Some(target),
            StmtKind::Try { exception, .. } => Some(exception),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::AluOp;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { id: StmtId(0), kind }
    }

    #[test]
    fn test_move_to_member_uses_base() {
        let s = stmt(StmtKind::Move {
            target: Expr::member(Expr::temp(4), "x"),
            source: Expr::temp(5),
        });
        let mut uses = Vec::new();
        s.for_each_use(&mut |t| uses.push(t.index));
        assert_eq!(uses, vec![5, 4]);
        assert_eq!(s.defined_temp(), None);
    }

    #[test]
    fn test_move_to_temp_defines() {
        let mut s = stmt(StmtKind::Move {
            target: Expr::temp(2),
            source: Expr::binop(AluOp::Add, Expr::temp(2), Expr::number(1.0)),
        });
        let mut uses = Vec::new();
        s.for_each_use(&mut |t| uses.push(t.index));
        assert_eq!(uses, vec![2]);
        assert_eq!(s.defined_temp(), Some(Temp::new(2)));

        if let Some(temp) = s.defined_temp_mut() {
            temp.index = 9;
        }
        assert_eq!(s.defined_temp(), Some(Temp::new(9)));
    }

    #[test]
    fn test_targets() {
        let s = stmt(StmtKind::CJump {
            cond: Expr::temp(0),
            iftrue: BlockId::new(1),
            iffalse: BlockId::new(2),
        });
        assert!(s.is_terminator());
        assert_eq!(s.targets(), vec![BlockId::new(1), BlockId::new(2)]);
        assert!(stmt(StmtKind::Ret { expr: Expr::undefined() }).targets().is_empty());
    }
}
