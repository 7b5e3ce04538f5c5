//! Leaving SSA form: phi nodes become copies on their incoming edges.
//!
//! For `t = phi(v0, v1, ...)` in block `Y`, the copy `t = vi` is placed at the end of
//! `Y.preds[i]`, right before its terminator. Critical edges must be split first,
//! otherwise the copy would also execute on the predecessor's other edges.
//!
//! When the statement right before the predecessor's terminator is `vi = e` and the
//! phi is the only reader of `vi`, that statement is retargeted to `t = e` instead of
//! adding a copy. Renaming never makes one phi's operand the target of another phi in
//! the same block, so the early write cannot be observed.

use std::collections::HashMap;

use tracing::debug;

use crate::ir::{BlockId, Expr, ExprKind, Function, StmtKind, Temp};

/// Counters reported by [`deconstruct_ssa`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeconstructStats {
    /// Phi nodes removed.
    pub phis_removed: usize,
    /// Copies inserted at the end of predecessors.
    pub moves_inserted: usize,
    /// Definitions retargeted onto the phi target instead of copied.
    pub moves_coalesced: usize,
}

/// Replaces every phi of `function` by copies in its predecessors.
///
/// # Panics
///
/// Panics if a phi's operand count differs from its block's predecessor count.
pub fn deconstruct_ssa(function: &mut Function) -> DeconstructStats {
    let use_counts = count_uses(function);
    let mut stats = DeconstructStats::default();

    for index in 0..function.block_count() {
        let y = BlockId::new(index);

        while function.block(y).stmts.first().is_some_and(|s| s.is_phi()) {
            let phi = function.block_mut(y).stmts.remove(0);
            let StmtKind::Phi { target, incoming } = phi.kind else {
                unreachable!("checked by is_phi");
            };
            let preds = function.block(y).preds.clone();
            assert_eq!(
                incoming.len(),
                preds.len(),
                "phi for {target} in {y} of {} has {} operands for {} predecessors",
                function.name,
                incoming.len(),
                preds.len()
            );
            stats.phis_removed += 1;

            for (value, pred) in incoming.into_iter().zip(preds) {
                if let Some(temp) = value.as_temp() {
                    if use_counts.get(&temp) == Some(&1) && coalesce(function, pred, temp, target) {
                        stats.moves_coalesced += 1;
                        continue;
                    }
                }

                let copy = function.make_stmt(StmtKind::Move {
                    target: Expr::from_temp(target),
                    source: value,
                });
                function.insert_before_terminator(pred, copy);
                stats.moves_inserted += 1;
            }
        }
    }

    debug!(
        function = %function.name,
        phis = stats.phis_removed,
        moves = stats.moves_inserted,
        coalesced = stats.moves_coalesced,
        "deconstructed SSA"
    );
    stats
}

/// Retargets `value = e` right before `pred`'s terminator to `target = e`.
fn coalesce(function: &mut Function, pred: BlockId, value: Temp, target: Temp) -> bool {
    if value.is_scoped() {
        return false;
    }

    let block = function.block_mut(pred);
    let len = block.stmts.len();
    if len < 2 || block.terminator().is_none() {
        return false;
    }

    match &mut block.stmts[len - 2].kind {
        StmtKind::Move {
            target: Expr {
                kind: ExprKind::Temp(defined),
                ..
            },
            ..
        } if *defined == value => {
            *defined = target;
            true
        }
        _ => false,
    }
}

fn count_uses(function: &Function) -> HashMap<Temp, usize> {
    let mut counts: HashMap<Temp, usize> = HashMap::new();
    for (_, stmt) in function.stmts() {
        stmt.for_each_use(&mut |temp| *counts.entry(temp).or_default() += 1);
    }
    counts
}
