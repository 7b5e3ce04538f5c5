//! Collection of SSA-eligible variables and their definition sites.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{BlockId, Function};

/// Definition sites of every collectible temp, plus the set of temps that are live
/// across block boundaries.
///
/// Only the non-local temps need phi nodes: a temp that is always read in the same
/// block that defined it can never observe two reaching definitions.
#[derive(Debug, Default)]
pub struct VariableCollector {
    defsites: BTreeMap<u32, BTreeSet<BlockId>>,
    block_defs: Vec<BTreeSet<u32>>,
    non_locals: BTreeSet<u32>,
}

impl VariableCollector {
    /// Walks every statement of `function` once.
    #[must_use]
    pub fn collect(function: &Function) -> Self {
        let mut collector = VariableCollector {
            block_defs: vec![BTreeSet::new(); function.block_count()],
            ..VariableCollector::default()
        };

        for block_id in function.block_ids() {
            let mut killed: BTreeSet<u32> = BTreeSet::new();

            for stmt in &function.block(block_id).stmts {
                stmt.for_each_use(&mut |temp| {
                    if function.is_collectible(temp) && !killed.contains(&temp.index) {
                        collector.non_locals.insert(temp.index);
                    }
                });

                if let Some(def) = stmt.defined_temp() {
                    if function.is_collectible(def) {
                        killed.insert(def.index);
                        collector
                            .defsites
                            .entry(def.index)
                            .or_default()
                            .insert(block_id);
                        collector.block_defs[block_id.index()].insert(def.index);
                    }
                }
            }
        }

        collector
    }

    /// Blocks defining `temp`, empty if it is never defined.
    pub fn defsites(&self, temp: u32) -> impl Iterator<Item = BlockId> + '_ {
        self.defsites.get(&temp).into_iter().flatten().copied()
    }

    /// Returns true if `block` originally defines `temp`.
    #[must_use]
    pub fn defines(&self, block: BlockId, temp: u32) -> bool {
        self.block_defs
            .get(block.index())
            .is_some_and(|defs| defs.contains(&temp))
    }

    /// Temps read in some block before being defined there, in ascending order.
    pub fn non_locals(&self) -> impl Iterator<Item = u32> + '_ {
        self.non_locals.iter().copied()
    }

    /// Returns true if `temp` is live across a block boundary.
    #[must_use]
    pub fn is_non_local(&self, temp: u32) -> bool {
        self.non_locals.contains(&temp)
    }

    /// Number of distinct collectible temps with at least one definition.
    #[must_use]
    pub fn defined_count(&self) -> usize {
        self.defsites.len()
    }
}
