//! Textual rendering of the IR, used in logs and test failure output.
//!
//! ```text
//! function f(formals: 1, locals: 1, temps: 4)
//! L0:
//!     s0: if ($t0) goto L1 else goto L2
//! L1:
//!     s1: $t2 = 1
//!     s2: goto L3
//! ```

use std::fmt;

use crate::ir::{ConstValue, Expr, ExprKind, Function, Name, Stmt, StmtKind, Temp};

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scoped() {
            write!(f, "$t{}@{}", self.index, self.scope)
        } else {
            write!(f, "$t{}", self.index)
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Undefined => f.write_str("undefined"),
            ConstValue::Null => f.write_str("null"),
            ConstValue::Bool(value) => write!(f, "{value}"),
            ConstValue::Number(value) => write!(f, "{value}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Temp(temp) => write!(f, "{temp}"),
            ExprKind::Const(value) => write!(f, "{value}"),
            ExprKind::String(value) => write!(f, "{value:?}"),
            ExprKind::RegExp { pattern, flags } => write!(f, "/{pattern}/{:x}", flags.bits()),
            ExprKind::Name(Name::This) => f.write_str("this"),
            ExprKind::Name(Name::Identifier(id)) => f.write_str(id),
            ExprKind::Closure(index) => write!(f, "closure#{index}"),
            ExprKind::Unop(op, expr) => write!(f, "{}{expr}", op.symbol()),
            ExprKind::Binop(op, left, right) => write!(f, "{left} {} {right}", op.symbol()),
            ExprKind::Call(base, args) => {
                write!(f, "{base}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::New(base, args) => {
                write!(f, "new {base}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Subscript(base, index) => write!(f, "{base}[{index}]"),
            ExprKind::Member(base, name) => write!(f, "{base}.{name}"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        match &self.kind {
            StmtKind::Move { target, source } => write!(f, "{target} = {source}"),
            StmtKind::Phi { target, incoming } => {
                write!(f, "{target} = phi(")?;
                write_list(f, incoming)?;
                f.write_str(")")
            }
            StmtKind::Jump { target } => write!(f, "goto {target}"),
            StmtKind::CJump {
                cond,
                iftrue,
                iffalse,
            } => write!(f, "if ({cond}) goto {iftrue} else goto {iffalse}"),
            StmtKind::Ret { expr } => write!(f, "return {expr}"),
            StmtKind::Exp { expr } => write!(f, "{expr}"),
            StmtKind::Try {
                body,
                handler,
                exception,
            } => write!(f, "try {body} catch({exception}) {handler}"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "function {}(formals: {}, locals: {}, temps: {})",
            self.name, self.formal_count, self.local_count, self.temp_count
        )?;
        for id in self.block_ids() {
            writeln!(f, "{id}:")?;
            for stmt in &self.block(id).stmts {
                writeln!(f, "    {stmt}")?;
            }
        }
        Ok(())
    }
}
