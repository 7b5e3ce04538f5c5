//! Critical-edge splitting.
//!
//! An edge is critical when its source has several successors and its target has
//! several predecessors. Copies placed for a phi at the end of such a source would
//! also run on its other outgoing edges, so each critical edge gets a block of its
//! own holding nothing but a jump.
//!
//! ```text
//!     A                 A
//!    / \               / \
//!   B   |    ==>      B   N
//!    \ /               \ /
//!     D                 D
//! ```

use tracing::debug;

use crate::ir::{BlockId, Function, StmtKind};

/// Splits every critical edge of `function` in place.
///
/// The new block replaces the old endpoint in both the source's successor list and
/// the target's predecessor list, at the same positions, so phi operand order is
/// preserved. New blocks are appended to the arena.
///
/// # Returns
///
/// The number of edges split.
pub fn split_critical_edges(function: &mut Function) -> usize {
    let original_count = function.block_count();
    let mut split = 0;

    for index in 0..original_count {
        let bb = BlockId::new(index);
        if function.block(bb).preds.len() <= 1 {
            continue;
        }

        for in_idx in 0..function.block(bb).preds.len() {
            let pred = function.block(bb).preds[in_idx];
            if function.block(pred).succs.len() <= 1 {
                continue;
            }

            let Some(out_idx) = function.block(pred).succs.iter().position(|&s| s == bb) else {
                continue;
            };

            let nb = function.add_block();
            let jump = function.make_stmt(StmtKind::Jump { target: bb });
            {
                let new_block = function.block_mut(nb);
                new_block.stmts.push(jump);
                new_block.preds.push(pred);
                new_block.succs.push(bb);
            }

            function.block_mut(pred).succs[out_idx] = nb;
            function.block_mut(bb).preds[in_idx] = nb;
            retarget_terminator(function, pred, out_idx, nb);
            split += 1;
        }
    }

    if split > 0 {
        debug!(function = %function.name, split, "split critical edges");
    }
    split
}

/// Points the `out_idx`-th target of `block`'s terminator at `target`.
fn retarget_terminator(function: &mut Function, block: BlockId, out_idx: usize, target: BlockId) {
    let Some(terminator) = function.block_mut(block).terminator_mut() else {
        return;
    };

    match (&mut terminator.kind, out_idx) {
        (StmtKind::Jump { target: t }, 0)
        | (StmtKind::CJump { iftrue: t, .. }, 0)
        | (StmtKind::CJump { iffalse: t, .. }, 1)
        | (StmtKind::Try { body: t, .. }, 0)
        | (StmtKind::Try { handler: t, .. }, 1) => *t = target,
        _ => {}
    }
}

/// Returns the first critical edge of `function`, if any.
#[must_use]
pub fn find_critical_edge(function: &Function) -> Option<(BlockId, BlockId)> {
    function.block_ids().find_map(|b| {
        let block = function.block(b);
        if block.succs.len() <= 1 {
            return None;
        }
        block
            .succs
            .iter()
            .find(|&&s| function.block(s).preds.len() > 1)
            .map(|&s| (b, s))
    })
}

/// Asserts that `function` has no critical edges.
///
/// # Panics
///
/// Panics naming the offending edge if one survived splitting.
pub fn check_critical_edges(function: &Function) {
    if let Some((from, to)) = find_critical_edge(function) {
        panic!(
            "critical edge {from} -> {to} survived splitting in {}",
            function.name
        );
    }
}
