//! Functions and their basic-block arena.
//!
//! Blocks live in a `Vec` owned by the [`Function`] and refer to each other through
//! dense [`BlockId`] handles, so passes can freely rewrite edges without fighting the
//! borrow checker over a pointer graph. The function implements the traits of
//! [`crate::utils::graph`] directly, so dominator and traversal algorithms run on it
//! without building a separate graph.
//!
//! # Temp layout
//!
//! ```text
//! 0 .. formal_count                          formals (arguments)
//! formal_count .. formal_count + local_count locals
//! formal_count + local_count .. temp_count   compiler temporaries and SSA names
//! ```

use std::fmt;

use crate::{
    ir::{Stmt, StmtId, StmtKind, StmtRef, Temp},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
};

/// Handle of a basic block within its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a handle from a raw arena position.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the arena position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<BlockId> for NodeId {
    fn from(block: BlockId) -> Self {
        NodeId::new(block.0)
    }
}

impl From<NodeId> for BlockId {
    fn from(node: NodeId) -> Self {
        BlockId(node.index())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A basic block.
///
/// `preds` and `succs` mirror the control flow encoded by the terminators. The order
/// of `succs` is the terminator's target order, and the order of `preds` is the
/// operand order of every phi in the block.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// The statements, terminator last.
    pub stmts: Vec<Stmt>,
    /// Predecessor blocks (incoming edges).
    pub preds: Vec<BlockId>,
    /// Successor blocks (outgoing edges).
    pub succs: Vec<BlockId>,
    /// Position in the final block order, assigned by linearization.
    pub index: usize,
}

impl BasicBlock {
    /// Returns the terminator, if the block has one.
    #[must_use]
    pub fn terminator(&self) -> Option<&Stmt> {
        self.stmts.last().filter(|stmt| stmt.is_terminator())
    }

    /// Returns the terminator mutably, if the block has one.
    pub fn terminator_mut(&mut self) -> Option<&mut Stmt> {
        self.stmts.last_mut().filter(|stmt| stmt.is_terminator())
    }

    /// Iterates the leading phi statements.
    pub fn phis(&self) -> impl Iterator<Item = &Stmt> {
        self.stmts.iter().take_while(|stmt| stmt.is_phi())
    }

    /// Returns the position of the statement with the given id.
    #[must_use]
    pub fn position_of(&self, id: StmtId) -> Option<usize> {
        self.stmts.iter().position(|stmt| stmt.id == id)
    }
}

/// A function: the unit of optimization and instruction selection.
#[derive(Debug, Clone)]
pub struct Function {
    /// Name used in logs and in the compiled unit.
    pub name: String,
    /// The block arena. Block 0 is the entry.
    pub blocks: Vec<BasicBlock>,
    /// Number of formal parameters.
    pub formal_count: u32,
    /// Number of declared local variables.
    pub local_count: u32,
    /// One past the highest temp index in use; grows as renaming allocates names.
    pub temp_count: u32,
    /// Whether formals and locals may be captured by closures. When set they are
    /// excluded from SSA form.
    pub variables_can_escape: bool,
    /// Whether the function contains a protected region.
    pub has_try: bool,
    next_stmt_id: u32,
}

impl Function {
    /// Creates a function with a single empty entry block.
    #[must_use]
    pub fn new(name: impl Into<String>, formal_count: u32, local_count: u32) -> Self {
        Function {
            name: name.into(),
            blocks: vec![BasicBlock::default()],
            formal_count,
            local_count,
            temp_count: formal_count + local_count,
            variables_can_escape: false,
            has_try: false,
            next_stmt_id: 0,
        }
    }

    /// The entry block.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Number of blocks in the arena.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates all block handles in arena order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId)
    }

    /// Returns a block.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this function.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    /// Returns a block mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this function.
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    /// Appends an empty block to the arena.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock {
            index: id.0,
            ..BasicBlock::default()
        });
        id
    }

    /// Records the edge `from -> to` in both adjacency lists.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.0].succs.push(to);
        self.blocks[to.0].preds.push(from);
    }

    /// Wraps a statement kind with a fresh id.
    pub fn make_stmt(&mut self, kind: StmtKind) -> Stmt {
        let id = StmtId(self.next_stmt_id);
        self.next_stmt_id += 1;
        Stmt { id, kind }
    }

    /// Allocates a fresh temp index.
    pub fn alloc_temp(&mut self) -> u32 {
        let index = self.temp_count;
        self.temp_count += 1;
        index
    }

    /// Number of formal and local slots.
    #[must_use]
    pub fn slot_count(&self) -> u32 {
        self.formal_count + self.local_count
    }

    /// Returns true if the temp may be put into SSA form.
    ///
    /// Scoped temps never are. Formals and locals are excluded too when variables can
    /// escape, since a closure could observe them between definitions.
    #[must_use]
    pub fn is_collectible(&self, temp: Temp) -> bool {
        if temp.is_scoped() {
            return false;
        }
        !(self.variables_can_escape && temp.index < self.slot_count())
    }

    /// Looks up a statement by reference.
    #[must_use]
    pub fn stmt(&self, at: StmtRef) -> Option<&Stmt> {
        self.blocks
            .get(at.block.0)?
            .stmts
            .iter()
            .find(|stmt| stmt.id == at.id)
    }

    /// Looks up a statement mutably by reference.
    pub fn stmt_mut(&mut self, at: StmtRef) -> Option<&mut Stmt> {
        self.blocks
            .get_mut(at.block.0)?
            .stmts
            .iter_mut()
            .find(|stmt| stmt.id == at.id)
    }

    /// Removes a statement, returning it if it was present.
    pub fn remove_stmt(&mut self, at: StmtRef) -> Option<Stmt> {
        let block = self.blocks.get_mut(at.block.0)?;
        let position = block.position_of(at.id)?;
        Some(block.stmts.remove(position))
    }

    /// Inserts a statement right before the block's terminator, or at the end if the
    /// block is not terminated.
    pub fn insert_before_terminator(&mut self, block: BlockId, stmt: Stmt) {
        let block = &mut self.blocks[block.0];
        let position = if block.terminator().is_some() {
            block.stmts.len() - 1
        } else {
            block.stmts.len()
        };
        block.stmts.insert(position, stmt);
    }

    /// Total number of statements across all blocks.
    #[must_use]
    pub fn stmt_count(&self) -> usize {
        self.blocks.iter().map(|block| block.stmts.len()).sum()
    }

    /// Iterates `(location, statement)` pairs in block order.
    pub fn stmts(&self) -> impl Iterator<Item = (StmtRef, &Stmt)> {
        self.blocks.iter().enumerate().flat_map(|(index, block)| {
            block.stmts.iter().map(move |stmt| {
                (
                    StmtRef {
                        block: BlockId(index),
                        id: stmt.id,
                    },
                    stmt,
                )
            })
        })
    }

    /// The entry block as a graph node.
    #[must_use]
    pub fn entry_node(&self) -> NodeId {
        self.entry().into()
    }
}

impl GraphBase for Function {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for Function {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.blocks[node.index()].succs.iter().map(|&b| b.into())
    }
}

impl Predecessors for Function {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.blocks[node.index()].preds.iter().map(|&b| b.into())
    }
}

impl RootedGraph for Function {
    fn entry(&self) -> NodeId {
        self.entry_node()
    }
}
