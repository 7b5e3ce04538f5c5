//! Unreachable-block pruning and final block ordering.
//!
//! Blocks not reachable from the entry are deleted, along with their edges into the
//! surviving blocks (and the matching phi operands). The arena is then compacted so
//! that `BlockId`s are dense again, and every block's `index` is set to its position,
//! which is the order instruction selection emits blocks in.
//!
//! Reachability is decided by a depth-first walk rather than by repeatedly deleting
//! predecessor-less blocks, so dead cycles disappear too.

use tracing::debug;

use crate::{
    ir::{BlockId, Function, StmtKind},
    utils::graph::algorithms::dfs,
};

/// Removes unreachable blocks and renumbers the rest.
///
/// # Returns
///
/// The number of blocks removed.
pub fn linearize(function: &mut Function) -> usize {
    let block_count = function.block_count();
    let mut reachable = vec![false; block_count];
    for node in dfs(&*function, function.entry_node()) {
        reachable[node.index()] = true;
    }

    let removed = reachable.iter().filter(|&&r| !r).count();
    if removed > 0 {
        detach_unreachable(function, &reachable);
        compact(function, &reachable);
    }

    for (index, block) in function.blocks.iter_mut().enumerate() {
        block.index = index;
    }

    if removed > 0 {
        debug!(
            function = %function.name,
            removed,
            blocks = function.block_count(),
            "pruned blocks"
        );
    }
    removed
}

/// Drops the edges leaving dead blocks, with the phi operands they fed.
fn detach_unreachable(function: &mut Function, reachable: &[bool]) {
    for index in 0..function.block_count() {
        if !reachable[index] {
            continue;
        }

        let preds = function.block(BlockId::new(index)).preds.clone();
        let dead: Vec<usize> = preds
            .iter()
            .enumerate()
            .filter(|(_, p)| !reachable[p.index()])
            .map(|(j, _)| j)
            .collect();
        if dead.is_empty() {
            continue;
        }

        let block = function.block_mut(BlockId::new(index));
        for &j in dead.iter().rev() {
            block.preds.remove(j);
            for stmt in &mut block.stmts {
                if let StmtKind::Phi { incoming, .. } = &mut stmt.kind {
                    if j < incoming.len() {
                        incoming.remove(j);
                    }
                }
            }
        }
    }
}

/// Deletes dead blocks from the arena and rewrites every handle.
fn compact(function: &mut Function, reachable: &[bool]) {
    let mut remap: Vec<Option<BlockId>> = vec![None; reachable.len()];
    let mut next = 0;
    for (index, &live) in reachable.iter().enumerate() {
        if live {
            remap[index] = Some(BlockId::new(next));
            next += 1;
        }
    }

    let map = |id: BlockId| remap[id.index()].unwrap_or(id);

    let blocks = std::mem::take(&mut function.blocks);
    function.blocks = blocks
        .into_iter()
        .enumerate()
        .filter(|(index, _)| reachable[*index])
        .map(|(_, mut block)| {
            block.preds = block.preds.iter().map(|&p| map(p)).collect();
            block.succs = block.succs.iter().map(|&s| map(s)).collect();
            if let Some(terminator) = block.terminator_mut() {
                match &mut terminator.kind {
                    StmtKind::Jump { target } => *target = map(*target),
                    StmtKind::CJump {
                        iftrue, iffalse, ..
                    } => {
                        *iftrue = map(*iftrue);
                        *iffalse = map(*iffalse);
                    }
                    StmtKind::Try { body, handler, .. } => {
                        *body = map(*body);
                        *handler = map(*handler);
                    }
                    _ => {}
                }
            }
            block
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, FunctionBuilder, Temp};

    #[test]
    fn test_removes_dead_chain_and_cycle() {
        // L0 -> L2 (live), L1 -> L3 (dead chain), L4 <-> L5 (dead cycle)
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let dead = b.new_block();
        let exit = b.new_block();
        let dead_tail = b.new_block();
        let c1 = b.new_block();
        let c2 = b.new_block();
        b.jump(entry, exit).unwrap();
        b.jump(dead, dead_tail).unwrap();
        b.ret(exit, Expr::undefined()).unwrap();
        b.jump(dead_tail, exit).unwrap();
        b.jump(c1, c2).unwrap();
        b.jump(c2, c1).unwrap();
        let mut function = b.build().unwrap();

        assert_eq!(linearize(&mut function), 4);
        assert_eq!(function.block_count(), 2);
        let new_exit = BlockId::new(1);
        assert_eq!(function.block(entry).succs, vec![new_exit]);
        assert_eq!(function.block(new_exit).preds, vec![entry]);
        assert_eq!(function.block(new_exit).index, 1);
        match function.block(entry).terminator().map(|t| &t.kind) {
            Some(StmtKind::Jump { target }) => assert_eq!(*target, new_exit),
            other => panic!("unexpected terminator {other:?}"),
        }
    }

    #[test]
    fn test_drops_phi_operands_of_dead_preds() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let dead = b.new_block();
        let join = b.new_block();
        b.jump(entry, join).unwrap();
        b.jump(dead, join).unwrap();
        b.ret(join, Expr::temp(7)).unwrap();
        let mut function = b.build().unwrap();

        let phi = function.make_stmt(StmtKind::Phi {
            target: Temp::new(7),
            incoming: vec![Expr::temp(5), Expr::temp(6)],
        });
        function.block_mut(join).stmts.insert(0, phi);

        assert_eq!(linearize(&mut function), 1);
        let join = BlockId::new(1);
        match &function.block(join).stmts[0].kind {
            StmtKind::Phi { incoming, .. } => assert_eq!(incoming, &vec![Expr::temp(5)]),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_noop_on_reachable_function() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        b.ret(entry, Expr::undefined()).unwrap();
        let mut function = b.build().unwrap();
        assert_eq!(linearize(&mut function), 0);
        assert_eq!(function.block(entry).index, 0);
    }
}
