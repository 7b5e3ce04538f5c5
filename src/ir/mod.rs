//! # Key Components
//!
//! - [`Function`] / [`BasicBlock`] / [`BlockId`] - The block arena and its handles
//! - [`Stmt`] / [`StmtKind`] / [`StmtRef`] - Statements and their stable locations
//! - [`Expr`] / [`ExprKind`] / [`Temp`] - Expressions and temporaries
//! - [`IrType`] - The type lattice
//! - [`FunctionBuilder`] - Checked construction of functions

mod builder;
mod display;
mod expr;
mod function;
mod stmt;
mod types;

pub use builder::FunctionBuilder;
pub use expr::{
    AluOp, ConstValue, Expr, ExprKind, Name, RegExpFlags, Temp, FALSE_BITS, NULL_BITS,
    UNDEFINED_BITS,
};
pub use function::{BasicBlock, BlockId, Function};
pub use stmt::{Stmt, StmtId, StmtKind, StmtRef};
pub use types::{IrType, JoinSemiLattice};
