//! SSA renaming over the dominator tree.
//!
//! Each collectible temp keeps a stack of the SSA names currently live for it. A
//! block rewrites its uses to the top of the stacks, pushes a fresh name for every
//! definition, patches the operands of its successors' phis, recurses into its
//! dominator-tree children and finally pops what it pushed. A use with no dominating
//! definition reads the temp's original name, because every stack starts out holding
//! the identity name.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    ir::{BlockId, ExprKind, Function, StmtKind, Temp},
    utils::graph::{algorithms::DominatorTree, NodeId},
};

/// Renames every collectible definition and use of `function` into SSA form.
///
/// Phi nodes must already be placed, with placeholder operands still reading the
/// original temps.
///
/// # Returns
///
/// The mapping from each fresh SSA name back to the formal or local slot it stands
/// for. Names of compiler temporaries are absent.
pub fn rename(function: &mut Function, dom_tree: &DominatorTree) -> HashMap<u32, u32> {
    let mut renamer = Renamer {
        stacks: HashMap::new(),
        mapping: HashMap::new(),
        seen: HashSet::new(),
        next_temp: function.temp_count,
        slot_count: function.slot_count(),
        variables_can_escape: function.variables_can_escape,
    };

    let before = function.temp_count;
    let entry = function.entry();
    renamer.rename_block(function, dom_tree, entry);
    function.temp_count = renamer.next_temp;

    debug!(
        function = %function.name,
        fresh = function.temp_count - before,
        mapped = renamer.mapping.len(),
        "renamed"
    );
    renamer.mapping
}

struct Renamer {
    stacks: HashMap<u32, Vec<u32>>,
    mapping: HashMap<u32, u32>,
    seen: HashSet<BlockId>,
    next_temp: u32,
    slot_count: u32,
    variables_can_escape: bool,
}

impl Renamer {
    fn is_collectible(&self, temp: Temp) -> bool {
        !temp.is_scoped() && !(self.variables_can_escape && temp.index < self.slot_count)
    }

    fn top(&mut self, orig: u32) -> u32 {
        let stack = self.stacks.entry(orig).or_insert_with(|| vec![orig]);
        stack.last().copied().unwrap_or(orig)
    }

    fn push_fresh(&mut self, orig: u32) -> u32 {
        let fresh = self.next_temp;
        self.next_temp += 1;

        if orig < self.slot_count {
            self.mapping.insert(fresh, orig);
        } else if let Some(&slot) = self.mapping.get(&orig) {
            self.mapping.insert(fresh, slot);
        }

        self.stacks
            .entry(orig)
            .or_insert_with(|| vec![orig])
            .push(fresh);
        fresh
    }

    fn rename_block(&mut self, function: &mut Function, dom_tree: &DominatorTree, n: BlockId) {
        if !self.seen.insert(n) {
            return;
        }

        // Originals whose stacks grew while processing this block
        let mut pushed: Vec<u32> = Vec::new();

        // Step 1: rewrite uses, then give every definition a fresh name
        let stmt_count = function.block(n).stmts.len();
        for i in 0..stmt_count {
            let stmt = &mut function.block_mut(n).stmts[i];

            if !stmt.is_phi() {
                stmt.for_each_use_mut(&mut |temp| {
                    if self.is_collectible(*temp) {
                        temp.index = self.top(temp.index);
                    }
                });
            }

            if let Some(def) = stmt.defined_temp_mut() {
                if self.is_collectible(*def) {
                    let orig = def.index;
                    def.index = self.push_fresh(orig);
                    pushed.push(orig);
                }
            }
        }

        // Step 2: patch the operand belonging to this block in each successor phi
        let successors = function.block(n).succs.clone();
        let mut patched: HashSet<BlockId> = HashSet::new();
        for y in successors {
            if !patched.insert(y) {
                continue;
            }
            let positions: Vec<usize> = function
                .block(y)
                .preds
                .iter()
                .enumerate()
                .filter(|(_, p)| **p == n)
                .map(|(j, _)| j)
                .collect();

            let phi_count = function.block(y).phis().count();
            for p in 0..phi_count {
                for &j in &positions {
                    let StmtKind::Phi { incoming, .. } = &mut function.block_mut(y).stmts[p].kind
                    else {
                        continue;
                    };
                    let Some(operand) = incoming.get_mut(j) else {
                        continue;
                    };
                    if let ExprKind::Temp(temp) = &mut operand.kind {
                        if self.is_collectible(*temp) {
                            temp.index = self.top(temp.index);
                        }
                    }
                }
            }
        }

        // Step 3: recurse into dominated children
        let children: Vec<NodeId> = dom_tree.children(n.into()).to_vec();
        for child in children {
            self.rename_block(function, dom_tree, child.into());
        }

        // Step 4: pop what this block pushed
        for orig in pushed {
            if let Some(stack) = self.stacks.get_mut(&orig) {
                stack.pop();
            }
        }
    }
}
