//! Incremental construction of [`Function`]s.
//!
//! The builder appends statements block by block and keeps the predecessor and
//! successor lists in sync with the terminators it emits, so a finished function
//! always satisfies the arena invariants the passes rely on.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use ssair::ir::{Expr, FunctionBuilder};
//!
//! let mut b = FunctionBuilder::new("id", 1, 0);
//! let entry = b.entry();
//! b.ret(entry, Expr::temp(0))?;
//! let function = b.build()?;
//! assert_eq!(function.block_count(), 1);
//! # Ok::<(), ssair::Error>(())
//! ```

use crate::{
    ir::{BlockId, Expr, Function, StmtKind, Temp},
    Error, Result,
};

/// Builds a [`Function`] one statement at a time.
pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    /// Starts a function with the given numbers of formals and locals.
    #[must_use]
    pub fn new(name: impl Into<String>, formal_count: u32, local_count: u32) -> Self {
        FunctionBuilder {
            function: Function::new(name, formal_count, local_count),
        }
    }

    /// The entry block, created up front.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.function.entry()
    }

    /// Appends a new empty block.
    pub fn new_block(&mut self) -> BlockId {
        self.function.add_block()
    }

    /// Allocates a fresh compiler temporary.
    pub fn new_temp(&mut self) -> Temp {
        Temp::new(self.function.alloc_temp())
    }

    /// Marks formals and locals as possibly captured by closures.
    pub fn set_variables_can_escape(&mut self, value: bool) -> &mut Self {
        self.function.variables_can_escape = value;
        self
    }

    /// Appends `target = source`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if the block is unknown or already
    /// terminated, or if `target` is not assignable.
    pub fn move_to(&mut self, block: BlockId, target: Expr, source: Expr) -> Result<()> {
        use crate::ir::ExprKind;
        if !matches!(
            target.kind,
            ExprKind::Temp(_) | ExprKind::Name(_) | ExprKind::Member(..) | ExprKind::Subscript(..)
        ) {
            return Err(Error::SsaError(format!(
                "invalid assignment target in block {block}"
            )));
        }
        self.append(block, StmtKind::Move { target, source })
    }

    /// Appends an expression statement.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if the block is unknown or terminated.
    pub fn exp(&mut self, block: BlockId, expr: Expr) -> Result<()> {
        self.append(block, StmtKind::Exp { expr })
    }

    /// Terminates `block` with a jump to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if either block is unknown or `block` is
    /// already terminated.
    pub fn jump(&mut self, block: BlockId, target: BlockId) -> Result<()> {
        self.terminate(block, StmtKind::Jump { target })
    }

    /// Terminates `block` with a conditional jump.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if a block is unknown or `block` is
    /// already terminated.
    pub fn cjump(
        &mut self,
        block: BlockId,
        cond: Expr,
        iftrue: BlockId,
        iffalse: BlockId,
    ) -> Result<()> {
        self.terminate(
            block,
            StmtKind::CJump {
                cond,
                iftrue,
                iffalse,
            },
        )
    }

    /// Terminates `block` with a return.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if the block is unknown or terminated.
    pub fn ret(&mut self, block: BlockId, expr: Expr) -> Result<()> {
        self.terminate(block, StmtKind::Ret { expr })
    }

    /// Terminates `block` by entering a protected region starting at `body`, with
    /// `handler` receiving the thrown value in `exception`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] if a block is unknown or `block` is
    /// already terminated.
    pub fn try_block(
        &mut self,
        block: BlockId,
        body: BlockId,
        handler: BlockId,
        exception: Temp,
    ) -> Result<()> {
        self.function.has_try = true;
        self.terminate(
            block,
            StmtKind::Try {
                body,
                handler,
                exception,
            },
        )
    }

    /// Finishes the function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SsaError`] naming the first block without a terminator.
    pub fn build(mut self) -> Result<Function> {
        for id in self.function.block_ids() {
            if self.function.block(id).terminator().is_none() {
                return Err(Error::SsaError(format!(
                    "block {id} of {} has no terminator",
                    self.function.name
                )));
            }
        }

        let mut max_temp = self.function.temp_count;
        for (_, stmt) in self.function.stmts() {
            let mut bump = |temp: Temp| {
                if !temp.is_scoped() {
                    max_temp = max_temp.max(temp.index + 1);
                }
            };
            stmt.for_each_use(&mut bump);
            if let Some(def) = stmt.defined_temp() {
                bump(def);
            }
        }
        self.function.temp_count = max_temp;

        Ok(self.function)
    }

    fn check_open(&self, block: BlockId) -> Result<()> {
        match self.function.blocks.get(block.index()) {
            None => Err(Error::SsaError(format!("unknown block {block}"))),
            Some(b) if b.terminator().is_some() => {
                Err(Error::SsaError(format!("block {block} is already terminated")))
            }
            Some(_) => Ok(()),
        }
    }

    fn append(&mut self, block: BlockId, kind: StmtKind) -> Result<()> {
        self.check_open(block)?;
        let stmt = self.function.make_stmt(kind);
        self.function.block_mut(block).stmts.push(stmt);
        Ok(())
    }

    fn terminate(&mut self, block: BlockId, kind: StmtKind) -> Result<()> {
        self.check_open(block)?;
        let stmt = self.function.make_stmt(kind);
        let targets = stmt.targets();
        if let Some(bad) = targets
            .iter()
            .find(|t| t.index() >= self.function.block_count())
        {
            return Err(Error::SsaError(format!("unknown jump target {bad}")));
        }

        self.function.block_mut(block).stmts.push(stmt);
        for target in targets {
            self.function.add_edge(block, target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::AluOp;

    #[test]
    fn test_diamond_edges() {
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

        let function = b.build().unwrap();
        assert_eq!(function.block(entry).succs, vec![then_bb, else_bb]);
        assert_eq!(function.block(exit).preds, vec![then_bb, else_bb]);
        assert_eq!(function.temp_count, 2);
    }

    #[test]
    fn test_temp_count_covers_uses() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.ret(
            entry,
            Expr::binop(AluOp::Add, Expr::temp(7), Expr::scoped(40, 1)),
        )
        .unwrap();
        assert_eq!(b.build().unwrap().temp_count, 8);
    }

    #[test]
    fn test_rejects_double_terminator() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.ret(entry, Expr::undefined()).unwrap();
        assert!(b.jump(entry, entry).is_err());
        assert!(b.exp(entry, Expr::temp(0)).is_err());
    }

    #[test]
    fn test_rejects_unterminated_block() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let _dangling = b.new_block();
        let entry = b.entry();
        b.ret(entry, Expr::undefined()).unwrap();
        assert!(matches!(b.build(), Err(Error::SsaError(_))));
    }

    #[test]
    fn test_rejects_unknown_target_and_bad_lvalue() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        assert!(b.jump(entry, BlockId::new(5)).is_err());
        assert!(b.move_to(entry, Expr::number(1.0), Expr::temp(0)).is_err());
    }

    #[test]
    fn test_try_marks_function() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let body = b.new_block();
        let handler = b.new_block();
        let exception = b.new_temp();
        b.try_block(entry, body, handler, exception).unwrap();
        b.ret(body, Expr::undefined()).unwrap();
        b.ret(handler, Expr::from_temp(exception)).unwrap();
        let function = b.build().unwrap();
        assert!(function.has_try);
        assert_eq!(function.block(entry).succs, vec![body, handler]);
    }
}
