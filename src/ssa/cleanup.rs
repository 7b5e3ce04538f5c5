//! Removal of phi webs that feed nothing but other phis.
//!
//! Phi placement is semi-pruned, so a loop can end up with phis that only ever
//! read each other. Such a web is dead as a whole even though every member has a
//! use, which plain dead-code elimination never discovers.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    ir::{Function, StmtKind},
    ssa::DefUses,
};

/// Deletes every phi whose value only reaches other deletable phis.
///
/// Runs to a fixpoint: releasing the operands of a removed web can make the phis
/// feeding it removable in turn.
///
/// # Returns
///
/// The number of phi nodes removed.
pub fn cleanup_phis(function: &mut Function, defuses: &mut DefUses) -> usize {
    let mut worklist: Vec<u32> = defuses
        .defined_vars()
        .into_iter()
        .filter(|&var| is_phi_def(function, defuses, var))
        .collect();
    let mut removed = 0;

    while let Some(var) = worklist.pop() {
        if !is_phi_def(function, defuses, var) {
            continue;
        }
        let Some(web) = phi_only_closure(function, defuses, var) else {
            continue;
        };

        for member in web {
            let Some(at) = defuses.def_site(member) else {
                continue;
            };
            function.remove_stmt(at);
            for operand in defuses.remove_statement(at) {
                worklist.push(operand);
            }
            defuses.remove(member);
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(function = %function.name, removed, "removed phi-only webs");
    }
    removed
}

fn is_phi_def(function: &Function, defuses: &DefUses, var: u32) -> bool {
    defuses
        .def_site(var)
        .and_then(|at| function.stmt(at))
        .is_some_and(|stmt| stmt.is_phi())
}

/// Collects the phis reachable from `root` through uses, or `None` as soon as one
/// of them is read by anything but a phi.
fn phi_only_closure(function: &Function, defuses: &DefUses, root: u32) -> Option<BTreeSet<u32>> {
    let mut web = BTreeSet::new();
    let mut stack = vec![root];

    while let Some(var) = stack.pop() {
        if !web.insert(var) {
            continue;
        }
        for &at in defuses.uses_of(var) {
            match function.stmt(at).map(|stmt| &stmt.kind) {
                Some(StmtKind::Phi { target, .. }) => stack.push(target.index),
                _ => return None,
            }
        }
    }

    Some(web)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, Temp};

    // Builds by hand:
    //
    //   L0: jump L1
    //   L1: t1 = phi(t0, t2)       <- loop header
    //       cjump t0 ? L2 : L3
    //   L2: t2 = phi(t1)           <- only feeds t1
    //       jump L1
    //   L3: return t0
    fn phi_loop(extra_use: bool) -> crate::ir::Function {
        let mut function = Function::new("f", 1, 0);
        let entry = function.entry();
        let header = function.add_block();
        let body = function.add_block();
        let exit = function.add_block();

        let jump = function.make_stmt(StmtKind::Jump { target: header });
        function.block_mut(entry).stmts.push(jump);
        function.add_edge(entry, header);

        let phi = function.make_stmt(StmtKind::Phi {
            target: Temp::new(1),
            incoming: vec![Expr::temp(0), Expr::temp(2)],
        });
        let cjump = function.make_stmt(StmtKind::CJump {
            cond: Expr::temp(0),
            iftrue: body,
            iffalse: exit,
        });
        function.block_mut(header).stmts.extend([phi, cjump]);
        function.add_edge(header, body);
        function.add_edge(header, exit);

        let inner = function.make_stmt(StmtKind::Phi {
            target: Temp::new(2),
            incoming: vec![Expr::temp(1)],
        });
        let back = function.make_stmt(StmtKind::Jump { target: header });
        function.block_mut(body).stmts.extend([inner, back]);
        function.add_edge(body, header);

        let ret = function.make_stmt(StmtKind::Ret {
            expr: if extra_use { Expr::temp(1) } else { Expr::temp(0) },
        });
        function.block_mut(exit).stmts.push(ret);
        function.temp_count = 3;
        function
    }

    #[test]
    fn test_removes_self_feeding_web() {
        let mut function = phi_loop(false);
        let mut defuses = DefUses::build(&function);

        assert_eq!(cleanup_phis(&mut function, &mut defuses), 2);
        assert!(function.stmts().all(|(_, stmt)| !stmt.is_phi()));
        assert!(defuses.is_empty());
    }

    #[test]
    fn test_keeps_web_with_real_use() {
        let mut function = phi_loop(true);
        let mut defuses = DefUses::build(&function);

        assert_eq!(cleanup_phis(&mut function, &mut defuses), 0);
        assert_eq!(function.stmts().filter(|(_, stmt)| stmt.is_phi()).count(), 2);
    }
}
