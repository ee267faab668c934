//! MCTS search graph with arena allocation and a transposition table.
//!
//! Nodes are stored in a contiguous Vec and referenced by NodeId indices.
//! A hash table keyed by the game's state key lets different move orders
//! that reach the same position share one node.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use engine_core::Player;

use crate::node::{MctsNode, NodeId};

/// One step of a selection path: the node and the edge taken out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub node: NodeId,
    pub edge: usize,
}

/// MCTS graph with arena-based node storage.
#[derive(Debug)]
pub struct MctsTree<S> {
    /// Arena storing all nodes
    nodes: Vec<MctsNode<S>>,

    /// State key -> node, shared by all paths reaching the same position
    table: FxHashMap<u64, NodeId>,

    /// Root node index (always 0 after construction or re-rooting)
    root: NodeId,
}

impl<S> MctsTree<S> {
    /// Create a new tree holding only `root`.
    pub fn new(root: MctsNode<S>) -> Self {
        let mut table = FxHashMap::default();
        table.insert(root.key, NodeId(0));
        Self {
            nodes: vec![root],
            table,
            root: NodeId(0),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode<S> {
        &self.nodes[id.index()]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode<S> {
        &mut self.nodes[id.index()]
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (never true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the arena slice for read access.
    #[inline]
    pub fn arena(&self) -> &[MctsNode<S>] {
        &self.nodes
    }

    /// Node already holding the position with this key.
    #[inline]
    pub fn lookup(&self, key: u64) -> Option<NodeId> {
        self.table.get(&key).copied()
    }

    /// Allocate a node and register it in the transposition table.
    pub fn insert(&mut self, node: MctsNode<S>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.table.insert(node.key, id);
        self.nodes.push(node);
        id
    }

    /// Pick the edge to descend through using PUCT.
    ///
    /// The first unvisited edge wins outright. Among visited edges the
    /// first maximal score wins.
    pub fn select_edge(&self, node_id: NodeId, c_puct: f32) -> Option<usize> {
        let node = self.get(node_id);
        let parent_visits_sqrt = (node.visit_count as f32).sqrt();

        let mut best: Option<(usize, f32)> = None;
        for (i, edge) in node.edges.iter().enumerate() {
            if edge.visits == 0 {
                return Some(i);
            }
            let score = edge.ucb_score(parent_visits_sqrt, c_puct);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Back a value up along `path`.
    ///
    /// `value` is from the perspective of the player to move at `leaf`. It
    /// flips sign only across edges where the mover changes, so a capture
    /// taken by the same player keeps its sign.
    pub fn backpropagate(&mut self, path: &[PathStep], leaf: NodeId, value: f32) {
        let mut value = value;
        let mut below: Player = self.get(leaf).to_play;

        if !path.iter().any(|step| step.node == leaf) {
            self.get_mut(leaf).visit_count += 1;
        }

        for step in path.iter().rev() {
            let parent = self.get_mut(step.node);
            if parent.to_play != below {
                value = -value;
            }
            let edge = &mut parent.edges[step.edge];
            edge.visits += 1;
            edge.value_sum += value;
            parent.visit_count += 1;
            below = parent.to_play;
        }
    }

    /// Most visited root action; lowest action index wins ties.
    pub fn best_action(&self) -> Option<(usize, u32)> {
        self.get(self.root)
            .best_edge_by_visits()
            .map(|e| (e.action as usize, e.visits))
    }

    /// Visit-weighted mean value of the root edges for the root mover.
    pub fn root_value(&self) -> f32 {
        let root = self.get(self.root);
        let visits = root.edge_visits();
        if visits == 0 {
            return 0.0;
        }
        root.edges.iter().map(|e| e.value_sum).sum::<f32>() / visits as f32
    }

    /// Visit distribution at the root.
    ///
    /// * temperature 0: all mass on the most visited action
    /// * temperature 1: proportional to visits
    /// * otherwise: visits^(1/t), renormalized
    ///
    /// With no visits at all the distribution is uniform over legal actions.
    pub fn root_policy(&self, num_actions: usize, temperature: f32) -> Vec<f32> {
        let root = self.get(self.root);
        let mut policy = vec![0.0; num_actions];

        if root.edge_visits() == 0 {
            let count = root.legal.count();
            if count > 0 {
                for action in root.legal.iter_ones().filter(|&a| a < num_actions) {
                    policy[action] = 1.0 / count as f32;
                }
            }
            return policy;
        }

        if temperature < 1e-6 {
            // Greedy: all mass on best action
            if let Some((action, _)) = self.best_action() {
                policy[action] = 1.0;
            }
            return policy;
        }

        // Scale relative to the max count so small temperatures don't overflow
        let max_visits = root.edges.iter().map(|e| e.visits).max().unwrap_or(0) as f64;
        let weights: Vec<f64> = root
            .edges
            .iter()
            .map(|e| {
                let v = e.visits as f64;
                if (temperature - 1.0).abs() < 1e-6 {
                    v
                } else {
                    (v / max_visits).powf(1.0 / temperature as f64)
                }
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for (edge, w) in root.edges.iter().zip(weights) {
                policy[edge.action as usize] = (w / total) as f32;
            }
        }
        policy
    }

    /// Make the child reached by `action` the new root, keeping only the
    /// part of the graph reachable from it.
    ///
    /// Returns false when that child was never materialized; the caller
    /// should start a fresh tree.
    pub fn reroot(&mut self, action: usize) -> bool {
        let root = self.get(self.root);
        let new_root = match root.edge_for(action).map(|i| root.edges[i].child) {
            Some(child) if child.is_some() => child,
            _ => return false,
        };

        let order = self.reachable_from(new_root);
        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for (new_index, &old) in order.iter().enumerate() {
            remap.insert(old, NodeId(new_index as u32));
        }

        let mut old_nodes: Vec<Option<MctsNode<S>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.table.clear();

        for old in order {
            let Some(mut node) = old_nodes[old.index()].take() else {
                continue;
            };
            for edge in &mut node.edges {
                if edge.child.is_some() {
                    edge.child = remap.get(&edge.child).copied().unwrap_or(NodeId::NONE);
                }
            }
            self.table.insert(node.key, NodeId(self.nodes.len() as u32));
            self.nodes.push(node);
        }

        self.root = NodeId(0);
        true
    }

    /// Node ids reachable from `start` in breadth-first order.
    fn reachable_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for edge in &self.get(id).edges {
                if edge.child.is_some() && seen.insert(edge.child) {
                    queue.push_back(edge.child);
                }
            }
        }
        order
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_value: self.root_value(),
            max_depth: self.compute_max_depth(),
        }
    }

    /// Deepest shortest-path distance from the root.
    fn compute_max_depth(&self) -> u32 {
        let mut depth: FxHashMap<NodeId, u32> = FxHashMap::default();
        let mut queue = VecDeque::from([self.root]);
        depth.insert(self.root, 0);
        let mut max_depth = 0;

        while let Some(id) = queue.pop_front() {
            let d = depth[&id];
            max_depth = max_depth.max(d);
            for edge in &self.get(id).edges {
                if edge.child.is_some() && !depth.contains_key(&edge.child) {
                    depth.insert(edge.child, d + 1);
                    queue.push_back(edge.child);
                }
            }
        }
        max_depth
    }
}

/// Statistics about an MCTS tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_value: f32,
    pub max_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Edge;
    use engine_core::ActionMask;

    fn node(key: u64, to_play: Player, legal: &[usize]) -> MctsNode<u64> {
        MctsNode::new(
            key,
            key,
            to_play,
            ActionMask::from_actions(9, legal.iter().copied()),
            None,
        )
    }

    fn expand(tree: &mut MctsTree<u64>, id: NodeId, priors: &[(u16, f32)]) {
        let n = tree.get_mut(id);
        n.edges = priors.iter().map(|&(a, p)| Edge::new(a, p)).collect();
        n.expanded = true;
    }

    #[test]
    fn test_new_tree() {
        let tree = MctsTree::new(node(7, Player::One, &[0, 1]));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert_eq!(tree.lookup(7), Some(NodeId(0)));
        assert_eq!(tree.lookup(8), None);
    }

    #[test]
    fn test_insert_registers_key() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let id = tree.insert(node(2, Player::Two, &[1]));
        assert_eq!(id, NodeId(1));
        assert_eq!(tree.lookup(2), Some(id));
    }

    #[test]
    fn test_select_unvisited_first_in_order() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0, 1, 2]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 0.1), (1, 0.8), (2, 0.1)]);

        // Unvisited edges win regardless of prior
        assert_eq!(tree.select_edge(root, 1.5), Some(0));

        tree.get_mut(root).edges[0].visits = 1;
        assert_eq!(tree.select_edge(root, 1.5), Some(1));
    }

    #[test]
    fn test_select_by_puct_after_all_visited() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0, 1]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 0.3), (1, 0.7)]);
        {
            let r = tree.get_mut(root);
            r.visit_count = 2;
            for e in &mut r.edges {
                e.visits = 1;
            }
        }
        // Equal Q, higher prior wins
        assert_eq!(tree.select_edge(root, 1.0), Some(1));
    }

    #[test]
    fn test_backpropagate_alternating_movers() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 1.0)]);
        let child = tree.insert(node(2, Player::Two, &[1]));
        tree.get_mut(root).edges[0].child = child;
        expand(&mut tree, child, &[(1, 1.0)]);
        let grandchild = tree.insert(node(3, Player::One, &[]));
        tree.get_mut(child).edges[0].child = grandchild;

        let path = [
            PathStep { node: root, edge: 0 },
            PathStep { node: child, edge: 0 },
        ];
        // Good for Player::One at the grandchild
        tree.backpropagate(&path, grandchild, 1.0);

        assert_eq!(tree.get(grandchild).visit_count, 1);
        assert_eq!(tree.get(child).visit_count, 1);
        assert_eq!(tree.get(root).visit_count, 1);

        // Child edge is seen by Player::Two: bad
        assert!((tree.get(child).edges[0].value_sum + 1.0).abs() < 1e-6);
        // Root edge is seen by Player::One: good
        assert!((tree.get(root).edges[0].value_sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_backpropagate_same_mover_keeps_sign() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 1.0)]);
        // Same player moves again (capture after closing a mill)
        let child = tree.insert(node(2, Player::One, &[]));
        tree.get_mut(root).edges[0].child = child;

        tree.backpropagate(&[PathStep { node: root, edge: 0 }], child, 0.5);
        assert!((tree.get(root).edges[0].value_sum - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_backpropagate_cycle_leaf_not_double_counted() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 1.0)]);
        tree.get_mut(root).edges[0].child = root;

        tree.backpropagate(&[PathStep { node: root, edge: 0 }], root, 0.0);
        assert_eq!(tree.get(root).visit_count, 1);
        assert_eq!(tree.get(root).edges[0].visits, 1);
    }

    #[test]
    fn test_root_policy() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0, 1]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 0.5), (1, 0.5)]);
        tree.get_mut(root).edges[0].visits = 30;
        tree.get_mut(root).edges[1].visits = 70;

        // Temperature 1.0: proportional to visits
        let policy = tree.root_policy(9, 1.0);
        assert!((policy[0] - 0.3).abs() < 1e-6);
        assert!((policy[1] - 0.7).abs() < 1e-6);
        for p in policy.iter().skip(2) {
            assert!(p.abs() < 1e-6);
        }

        // Temperature 0.0: greedy
        let greedy = tree.root_policy(9, 0.0);
        assert!(greedy[0].abs() < 1e-6);
        assert!((greedy[1] - 1.0).abs() < 1e-6);

        // Temperature 0.5 sharpens: 30^2 : 70^2
        let sharp = tree.root_policy(9, 0.5);
        let expected = 900.0 / (900.0 + 4900.0);
        assert!((sharp[0] - expected).abs() < 1e-5);
        let sum: f32 = sharp.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_root_policy_greedy_tie_prefers_lowest_action() {
        let mut tree = MctsTree::new(node(1, Player::One, &[2, 5]));
        let root = tree.root();
        expand(&mut tree, root, &[(2, 0.5), (5, 0.5)]);
        tree.get_mut(root).edges[0].visits = 4;
        tree.get_mut(root).edges[1].visits = 4;

        let greedy = tree.root_policy(9, 0.0);
        assert!((greedy[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_root_policy_without_visits_is_uniform_over_legal() {
        let tree = MctsTree::new(node(1, Player::One, &[1, 3, 4, 8]));
        let policy = tree.root_policy(9, 0.0);
        for a in [1, 3, 4, 8] {
            assert!((policy[a] - 0.25).abs() < 1e-6);
        }
        assert!(policy[0].abs() < 1e-6);
    }

    #[test]
    fn test_root_value_is_visit_weighted() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0, 1]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 0.5), (1, 0.5)]);
        {
            let edges = &mut tree.get_mut(root).edges;
            edges[0].visits = 3;
            edges[0].value_sum = 3.0;
            edges[1].visits = 1;
            edges[1].value_sum = -1.0;
        }
        assert!((tree.root_value() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reroot_keeps_subgraph() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0, 1]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 0.5), (1, 0.5)]);
        let a = tree.insert(node(2, Player::Two, &[0]));
        let b = tree.insert(node(3, Player::Two, &[0]));
        tree.get_mut(root).edges[0].child = a;
        tree.get_mut(root).edges[1].child = b;
        expand(&mut tree, b, &[(0, 1.0)]);
        let c = tree.insert(node(4, Player::One, &[]));
        tree.get_mut(b).edges[0].child = c;

        assert!(tree.reroot(1));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(tree.root()).key, 3);
        assert_eq!(tree.lookup(3), Some(NodeId(0)));
        assert_eq!(tree.lookup(4), Some(NodeId(1)));
        assert_eq!(tree.lookup(1), None);
        assert_eq!(tree.get(tree.root()).edges[0].child, NodeId(1));
    }

    #[test]
    fn test_reroot_unmaterialized_child_fails() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 1.0)]);
        assert!(!tree.reroot(0));
        assert!(!tree.reroot(5));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_tree_stats_with_cycle() {
        let mut tree = MctsTree::new(node(1, Player::One, &[0]));
        let root = tree.root();
        expand(&mut tree, root, &[(0, 1.0)]);
        let child = tree.insert(node(2, Player::Two, &[0]));
        tree.get_mut(root).edges[0].child = child;
        expand(&mut tree, child, &[(0, 1.0)]);
        tree.get_mut(child).edges[0].child = root;

        let stats = tree.stats();
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.max_depth, 1);
    }
}
