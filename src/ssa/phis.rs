//! Semi-pruned phi placement over iterated dominance frontiers.
//!
//! For every non-local temp `a`, the blocks defining `a` seed a worklist. Each block
//! popped contributes its dominance frontier: a frontier block without a phi for `a`
//! gets one, and becomes a definition site itself (so it is pushed in turn) unless it
//! already defined `a`.
//!
//! Every placed phi starts with one placeholder operand per predecessor, each reading
//! `a` itself. Operand `j` belongs to `block.preds[j]`; the renamer relies on the
//! placeholder still naming the original temp when it patches that operand.

use std::collections::{BTreeSet, HashSet};

use tracing::trace;

use crate::{
    ir::{BlockId, Expr, Function, StmtKind, Temp},
    ssa::VariableCollector,
    utils::graph::NodeId,
};

/// Inserts phi nodes for the non-local temps found by `collector`.
///
/// # Arguments
///
/// * `function` - The function, already pruned of unreachable blocks
/// * `collector` - Definition sites and non-local temps of `function`
/// * `frontiers` - Dominance frontiers indexed by block
///
/// # Returns
///
/// The number of phi nodes inserted.
pub fn place_phis(
    function: &mut Function,
    collector: &VariableCollector,
    frontiers: &[BTreeSet<NodeId>],
) -> usize {
    let mut has_phi: HashSet<(BlockId, u32)> = HashSet::new();
    let mut inserted = 0;

    for var in collector.non_locals() {
        let mut worklist: Vec<BlockId> = collector.defsites(var).collect();

        while let Some(n) = worklist.pop() {
            let Some(frontier) = frontiers.get(n.index()) else {
                continue;
            };

            for &y in frontier {
                let y = BlockId::from(y);
                if !has_phi.insert((y, var)) {
                    continue;
                }

                insert_phi(function, y, var);
                inserted += 1;
                trace!(block = %y, temp = var, "placed phi");

                if !collector.defines(y, var) {
                    worklist.push(y);
                }
            }
        }
    }

    inserted
}

fn insert_phi(function: &mut Function, block: BlockId, var: u32) {
    let operand_count = function.block(block).preds.len();
    let stmt = function.make_stmt(StmtKind::Phi {
        target: Temp::new(var),
        incoming: vec![Expr::temp(var); operand_count],
    });

    let block = function.block_mut(block);
    let position = block.phis().count();
    block.stmts.insert(position, stmt);
}
