//! Def/use index over an SSA function.
//!
//! [`DefUses`] maps every collectible SSA name to its single defining statement and
//! to the statements reading it, and keeps the reverse view (which names a
//! statement reads) so that deleting a statement can release its operands.
//!
//! Statements are recorded as [`StmtRef`]s, which stay valid while other statements
//! are inserted or removed around them.
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use ssair::ssa::DefUses;
//!
//! let defuses = DefUses::build(&function);
//! for var in defuses.defined_vars() {
//!     if defuses.is_unused(var) {
//!         println!("t{var} is dead");
//!     }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::ir::{Function, StmtId, StmtRef};

/// Definition and uses of one SSA name.
#[derive(Debug, Clone, Default)]
pub struct DefUse {
    /// The defining statement, `None` if the name is read but never defined.
    pub def: Option<StmtRef>,
    /// Statements reading the name, once per read.
    pub uses: Vec<StmtRef>,
}

/// Bidirectional def/use index.
#[derive(Debug, Clone, Default)]
pub struct DefUses {
    values: BTreeMap<u32, DefUse>,
    uses_per_statement: HashMap<StmtId, Vec<u32>>,
}

impl DefUses {
    /// Builds the index in a single pass over `function`.
    ///
    /// Names that are read but never defined (formals and locals without an
    /// assignment, placeholders left by over-eager phi placement) are dropped from
    /// the value map. Their reads are still listed per statement.
    #[must_use]
    pub fn build(function: &Function) -> Self {
        let mut index = DefUses::default();

        for (at, stmt) in function.stmts() {
            if let Some(def) = stmt.defined_temp() {
                if function.is_collectible(def) {
                    index.values.entry(def.index).or_default().def = Some(at);
                }
            }

            stmt.for_each_use(&mut |temp| {
                if function.is_collectible(temp) {
                    index.values.entry(temp.index).or_default().uses.push(at);
                    index
                        .uses_per_statement
                        .entry(at.id)
                        .or_default()
                        .push(temp.index);
                }
            });
        }

        index.values.retain(|_, record| record.def.is_some());
        index
    }

    /// Returns true if `var` has a record.
    #[must_use]
    pub fn contains(&self, var: u32) -> bool {
        self.values.contains_key(&var)
    }

    /// Number of recorded names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no name is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Recorded names in ascending order.
    #[must_use]
    pub fn defined_vars(&self) -> Vec<u32> {
        self.values.keys().copied().collect()
    }

    /// The statement defining `var`.
    #[must_use]
    pub fn def_site(&self, var: u32) -> Option<StmtRef> {
        self.values.get(&var).and_then(|record| record.def)
    }

    /// The statements reading `var`.
    #[must_use]
    pub fn uses_of(&self, var: u32) -> &[StmtRef] {
        self.values
            .get(&var)
            .map_or(&[][..], |record| record.uses.as_slice())
    }

    /// Number of reads of `var`.
    #[must_use]
    pub fn use_count(&self, var: u32) -> usize {
        self.uses_of(var).len()
    }

    /// Returns true if `var` is never read.
    #[must_use]
    pub fn is_unused(&self, var: u32) -> bool {
        self.use_count(var) == 0
    }

    /// Returns true if `var` is read exactly once.
    #[must_use]
    pub fn is_single_use(&self, var: u32) -> bool {
        self.use_count(var) == 1
    }

    /// The collectible names read by statement `id`.
    #[must_use]
    pub fn uses_at(&self, id: StmtId) -> &[u32] {
        self.uses_per_statement
            .get(&id)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Forgets one read of `var` by `at`.
    pub fn remove_use(&mut self, var: u32, at: StmtRef) {
        if let Some(record) = self.values.get_mut(&var) {
            if let Some(position) = record.uses.iter().position(|&u| u == at) {
                record.uses.swap_remove(position);
            }
        }
    }

    /// Removes the statement `at` from the index, releasing its operands.
    ///
    /// # Returns
    ///
    /// The names the statement read, once per read.
    pub fn remove_statement(&mut self, at: StmtRef) -> Vec<u32> {
        let operands = self.uses_per_statement.remove(&at.id).unwrap_or_default();
        for &var in &operands {
            self.remove_use(var, at);
        }
        operands
    }

    /// Drops the record of `var`.
    pub fn remove(&mut self, var: u32) -> Option<DefUse> {
        self.values.remove(&var)
    }
}
