//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! The dominator tree drives SSA construction: phi nodes are placed on dominance
//! frontiers and the renamer walks the tree top-down so that every use sees the
//! definition that dominates it.
//!
//! # Theory
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` (idom(n)) is the
//! unique node that strictly dominates `n` but does not strictly dominate any
//! other dominator of `n`.
//!
//! The **dominance frontier** of `n` is the set of nodes `w` such that `n` dominates
//! a predecessor of `w` but does not strictly dominate `w` itself.
//!
//! # Algorithm
//!
//! Depth-first numbering, semi-dominators with `ancestor`/`best` path compression,
//! one bucket per semi-dominator, and a final pass that resolves deferred immediate
//! dominators through the same-dominator shortcut. Frontiers are computed bottom-up
//! over the finished tree:
//!
//! ```text
//! DF[n] = { y ∈ succ(n) : idom(y) ≠ n }
//!       ∪ { w ∈ DF[c] : c ∈ children(n), ¬(n strictly dominates w) }
//! ```
//!
//! # Precondition
//!
//! Every node must be reachable from the entry. Unreachable nodes are not covered by
//! the depth-first numbering, so prune them first
//! (see [`crate::ssa::linearize`]). A violation is a bug in the caller and panics.

use std::collections::BTreeSet;

use crate::utils::graph::{NodeId, Predecessors, RootedGraph, Successors};

/// Result of dominator tree computation.
///
/// Each node except the entry has exactly one immediate dominator. Children lists
/// are precomputed so top-down walks do not rescan the whole tree.
///
/// # Examples
///
/// ```rust,ignore
/// use ssair::utils::graph::algorithms::compute_dominators;
///
/// // Diamond: entry -> a, entry -> b, a -> exit, b -> exit
/// let dom_tree = compute_dominators(&function, function.entry_node());
/// assert_eq!(dom_tree.immediate_dominator(exit), Some(entry));
/// assert!(!dom_tree.dominates(a, exit));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: NodeId,
    idom: Vec<NodeId>,
    children: Vec<Vec<NodeId>>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of `node`, or `None` for the entry.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if node == self.entry {
            None
        } else {
            Some(self.idom[node.index()])
        }
    }

    /// Checks if `a` dominates `b`. Every node dominates itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }

        let mut current = b;
        while current != self.entry {
            let idom = self.idom[current.index()];
            if idom == a {
                return true;
            }
            current = idom;
        }

        // Only the entry can dominate the entry
        a == self.entry
    }

    /// Checks if `a` strictly dominates `b`: `a` dominates `b` and `a != b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over all dominators of `node`, from `node` itself up to
    /// the entry.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: Some(node),
        }
    }

    /// Returns the depth of `node` in the tree. The entry has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while current != self.entry {
            current = self.idom[current.index()];
            depth += 1;
        }
        depth
    }

    /// Returns the nodes immediately dominated by `node`, in ascending index order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.children[node.index()]
    }

    /// Returns the tree nodes in pre-order (parents before children).
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.idom.len());
        if self.idom.is_empty() {
            return order;
        }

        let mut stack = vec![self.entry];
        while let Some(node) = stack.pop() {
            order.push(node);
            for &child in self.children(node).iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Returns the tree nodes in post-order (children before parents).
    #[must_use]
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = self.preorder();
        // Reversed pre-order puts every child before its parent.
        order.reverse();
        order
    }

    /// Returns the number of nodes covered by the tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Iterator over the dominators of a node, walking up the tree.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
///
/// # Arguments
///
/// * `graph` - The graph to analyze
/// * `entry` - The entry node, which must not have predecessors that matter for
///   dominance (the entry is never dominated by anything else)
///
/// # Panics
///
/// Panics if some node is unreachable from `entry`.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();

    if node_count == 0 {
        return DominatorTree {
            entry,
            idom: Vec::new(),
            children: Vec::new(),
        };
    }

    let mut lt = LengauerTarjan::new(node_count, entry);
    lt.compute(graph);

    let mut children = vec![Vec::new(); node_count];
    for (index, &idom) in lt.idom.iter().enumerate() {
        let node = NodeId::new(index);
        if node != entry {
            children[idom.index()].push(node);
        }
    }

    DominatorTree {
        entry,
        idom: lt.idom,
        children,
    }
}

/// Computes the dominator tree of a rooted graph, starting from its entry.
///
/// # Panics
///
/// Panics if some node is unreachable from the entry.
pub fn compute_dominators_rooted<G>(graph: &G) -> DominatorTree
where
    G: RootedGraph + Predecessors,
{
    compute_dominators(graph, graph.entry())
}

const UNDEFINED: NodeId = NodeId::new(usize::MAX);

/// Working state of the Lengauer-Tarjan algorithm.
///
/// `dfnum` is 1-based so that 0 can mean "not visited yet".
struct LengauerTarjan {
    entry: NodeId,
    dfnum: Vec<usize>,
    vertex: Vec<NodeId>,
    parent: Vec<NodeId>,
    semi: Vec<NodeId>,
    idom: Vec<NodeId>,
    samedom: Vec<NodeId>,
    ancestor: Vec<NodeId>,
    best: Vec<NodeId>,
    bucket: Vec<Vec<NodeId>>,
    dfs_counter: usize,
}

impl LengauerTarjan {
    fn new(n: usize, entry: NodeId) -> Self {
        Self {
            entry,
            dfnum: vec![0; n],
            vertex: vec![UNDEFINED; n],
            parent: vec![UNDEFINED; n],
            semi: vec![UNDEFINED; n],
            idom: vec![UNDEFINED; n],
            samedom: vec![UNDEFINED; n],
            ancestor: vec![UNDEFINED; n],
            best: (0..n).map(NodeId::new).collect(),
            bucket: vec![Vec::new(); n],
            dfs_counter: 0,
        }
    }

    fn compute<G: Successors + Predecessors>(&mut self, graph: &G) {
        // Phase 1: DFS numbering
        self.dfs(graph);
        assert_eq!(
            self.dfs_counter,
            self.dfnum.len(),
            "dominator computation requires every block to be reachable from the entry"
        );

        // Process nodes in reverse DFS order (excluding entry)
        for i in (1..self.dfs_counter).rev() {
            let n = self.vertex[i];
            let p = self.parent[n.index()];

            // Phase 2: semi-dominator of n
            let mut s = p;
            for v in graph.predecessors(n) {
                let candidate = if self.dfnum[v.index()] <= self.dfnum[n.index()] {
                    v
                } else {
                    let best = self.eval(v);
                    self.semi[best.index()]
                };
                if self.dfnum[candidate.index()] < self.dfnum[s.index()] {
                    s = candidate;
                }
            }
            self.semi[n.index()] = s;
            self.bucket[s.index()].push(n);
            self.link(p, n);

            // Phase 3: everything semi-dominated by p gets its idom, or a deferred one
            let bucket = std::mem::take(&mut self.bucket[p.index()]);
            for v in bucket {
                let y = self.eval(v);
                if self.semi[y.index()] == self.semi[v.index()] {
                    self.idom[v.index()] = p;
                } else {
                    self.samedom[v.index()] = y;
                }
            }
        }

        // Phase 4: resolve deferred immediate dominators in DFS order
        for i in 1..self.dfs_counter {
            let n = self.vertex[i];
            let same = self.samedom[n.index()];
            if same != UNDEFINED {
                self.idom[n.index()] = self.idom[same.index()];
            }
        }

        // Entry node dominates itself
        self.idom[self.entry.index()] = self.entry;
    }

    fn dfs<G: Successors>(&mut self, graph: &G) {
        let mut stack = vec![(self.entry, UNDEFINED)];

        while let Some((node, parent)) = stack.pop() {
            let idx = node.index();
            if self.dfnum[idx] != 0 {
                continue;
            }

            self.dfnum[idx] = self.dfs_counter + 1;
            self.vertex[self.dfs_counter] = node;
            self.parent[idx] = parent;
            self.dfs_counter += 1;

            let successors: Vec<NodeId> = graph.successors(node).collect();
            for &succ in successors.iter().rev() {
                if self.dfnum[succ.index()] == 0 {
                    stack.push((succ, node));
                }
            }
        }
    }

    fn link(&mut self, p: NodeId, n: NodeId) {
        self.ancestor[n.index()] = p;
        self.best[n.index()] = n;
    }

    /// Returns the node with the lowest-numbered semi-dominator on the forest path
    /// from `v` up to (but excluding) its root.
    fn eval(&mut self, v: NodeId) -> NodeId {
        if self.ancestor[v.index()] == UNDEFINED {
            return v;
        }

        self.compress(v);
        self.best[v.index()]
    }

    fn compress(&mut self, v: NodeId) {
        let a = self.ancestor[v.index()];
        if self.ancestor[a.index()] == UNDEFINED {
            return;
        }

        self.compress(a);

        let best_a = self.best[a.index()];
        let best_v = self.best[v.index()];
        let semi_a = self.semi[best_a.index()];
        let semi_v = self.semi[best_v.index()];
        if self.dfnum[semi_a.index()] < self.dfnum[semi_v.index()] {
            self.best[v.index()] = best_a;
        }
        self.ancestor[v.index()] = self.ancestor[a.index()];
    }
}

/// Computes the dominance frontier of every node.
///
/// The result is indexed by node; sets are ordered so that consumers inserting phi
/// nodes produce the same IR on every run.
///
/// # Arguments
///
/// * `graph` - The graph the tree was computed for
/// * `dom_tree` - Its dominator tree
pub fn compute_dominance_frontiers<G>(graph: &G, dom_tree: &DominatorTree) -> Vec<BTreeSet<NodeId>>
where
    G: Successors,
{
    let mut frontiers: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); graph.node_count()];

    for node in dom_tree.postorder() {
        let mut frontier = BTreeSet::new();

        for succ in graph.successors(node) {
            if dom_tree.immediate_dominator(succ) != Some(node) {
                frontier.insert(succ);
            }
        }

        for &child in dom_tree.children(node) {
            for &w in &frontiers[child.index()] {
                if !dom_tree.strictly_dominates(node, w) {
                    frontier.insert(w);
                }
            }
        }

        frontiers[node.index()] = frontier;
    }

    frontiers
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::utils::graph::{
        algorithms::dominators::{
            compute_dominance_frontiers, compute_dominators, compute_dominators_rooted,
        },
        testing::TestGraph,
        NodeId,
    };

    fn n(index: usize) -> NodeId {
        NodeId::new(index)
    }

    fn set(nodes: &[usize]) -> BTreeSet<NodeId> {
        nodes.iter().map(|&i| NodeId::new(i)).collect()
    }

    #[test]
    fn test_dominator_empty_graph() {
        let graph = TestGraph::new(0, &[]);
        let dom_tree = compute_dominators(&graph, n(0));
        assert_eq!(dom_tree.node_count(), 0);
        assert!(dom_tree.preorder().is_empty());
    }

    #[test]
    fn test_dominator_single_node() {
        let graph = TestGraph::new(1, &[]);
        let dom_tree = compute_dominators_rooted(&graph);

        assert_eq!(dom_tree.entry(), n(0));
        assert_eq!(dom_tree.immediate_dominator(n(0)), None);
        assert!(dom_tree.dominates(n(0), n(0)));
        assert!(!dom_tree.strictly_dominates(n(0), n(0)));
        assert_eq!(dom_tree.depth(n(0)), 0);
    }

    #[test]
    fn test_dominator_linear_chain() {
        // 0 -> 1 -> 2 -> 3
        let graph = TestGraph::new(4, &[(0, 1), (1, 2), (2, 3)]);
        let dom_tree = compute_dominators(&graph, n(0));

        assert_eq!(dom_tree.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(dom_tree.immediate_dominator(n(2)), Some(n(1)));
        assert_eq!(dom_tree.immediate_dominator(n(3)), Some(n(2)));
        assert_eq!(dom_tree.depth(n(3)), 3);
        assert_eq!(
            dom_tree.dominators(n(3)).collect::<Vec<_>>(),
            vec![n(3), n(2), n(1), n(0)]
        );
    }

    #[test]
    fn test_dominator_diamond() {
        //       0
        //      / \
        //     1   2
        //      \ /
        //       3
        let graph = TestGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let dom_tree = compute_dominators(&graph, n(0));

        assert_eq!(dom_tree.immediate_dominator(n(3)), Some(n(0)));
        assert!(!dom_tree.dominates(n(1), n(3)));
        assert!(!dom_tree.dominates(n(2), n(3)));
        assert_eq!(dom_tree.children(n(0)), &[n(1), n(2), n(3)]);

        let frontiers = compute_dominance_frontiers(&graph, &dom_tree);
        assert_eq!(frontiers[0], set(&[]));
        assert_eq!(frontiers[1], set(&[3]));
        assert_eq!(frontiers[2], set(&[3]));
        assert_eq!(frontiers[3], set(&[]));
    }

    #[test]
    fn test_dominator_loop() {
        //   0 -> 1 -> 2 -> 3
        //        ^    |
        //        +----+
        let graph = TestGraph::new(4, &[(0, 1), (1, 2), (2, 1), (2, 3)]);
        let dom_tree = compute_dominators(&graph, n(0));

        assert_eq!(dom_tree.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(dom_tree.immediate_dominator(n(2)), Some(n(1)));
        assert_eq!(dom_tree.immediate_dominator(n(3)), Some(n(2)));

        let frontiers = compute_dominance_frontiers(&graph, &dom_tree);
        // The loop header is in its own frontier via the back edge.
        assert_eq!(frontiers[1], set(&[1]));
        assert_eq!(frontiers[2], set(&[1]));
        assert_eq!(frontiers[3], set(&[]));
    }

    #[test]
    fn test_dominator_needs_semidominator_shortcut() {
        // Classic Lengauer-Tarjan example where idom(4) differs from semi(4):
        //
        //   0 -> 1 -> 2 -> 3 -> 4
        //   0 -> 5 -> 3
        //   1 -> 4
        let graph = TestGraph::new(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (0, 5), (5, 3), (1, 4)]);
        let dom_tree = compute_dominators(&graph, n(0));

        assert_eq!(dom_tree.immediate_dominator(n(1)), Some(n(0)));
        assert_eq!(dom_tree.immediate_dominator(n(2)), Some(n(1)));
        assert_eq!(dom_tree.immediate_dominator(n(3)), Some(n(0)));
        assert_eq!(dom_tree.immediate_dominator(n(4)), Some(n(0)));
        assert_eq!(dom_tree.immediate_dominator(n(5)), Some(n(0)));
    }

    #[test]
    fn test_dominance_frontier_properties() {
        //        0
        //       / \
        //      1   2
        //     / \   \
        //    3   4   |
        //     \ /    |
        //      5 <---+
        //      |
        //      6 -> 1 (back edge)
        let edges = [
            (0, 1),
            (0, 2),
            (1, 3),
            (1, 4),
            (3, 5),
            (4, 5),
            (2, 5),
            (5, 6),
            (6, 1),
        ];
        let graph = TestGraph::new(7, &edges);
        let dom_tree = compute_dominators(&graph, n(0));
        let frontiers = compute_dominance_frontiers(&graph, &dom_tree);

        for (index, frontier) in frontiers.iter().enumerate() {
            let node = n(index);
            for &w in frontier {
                assert!(
                    !dom_tree.strictly_dominates(node, w),
                    "{node} strictly dominates {w} but has it in its frontier"
                );
                let dominated_pred = edges
                    .iter()
                    .filter(|(_, to)| *to == w.index())
                    .any(|&(from, _)| dom_tree.dominates(node, n(from)));
                assert!(dominated_pred, "{node} dominates no predecessor of {w}");
            }
        }
        assert_eq!(frontiers[3], set(&[5]));
        assert_eq!(frontiers[1], set(&[5]));
        assert_eq!(frontiers[5], set(&[1]));
        assert_eq!(frontiers[6], set(&[1]));
    }

    #[test]
    #[should_panic(expected = "reachable")]
    fn test_dominator_unreachable_node_panics() {
        // 0 -> 1, node 2 is unreachable
        let graph = TestGraph::new(3, &[(0, 1), (2, 1)]);
        let _ = compute_dominators(&graph, n(0));
    }
}
