//! MCTS node and edge representation.
//!
//! Nodes are stored in an arena (Vec) and referenced by index for cache
//! efficiency. Statistics live on edges so that a node reached through
//! several move orders keeps separate Q values for each incoming move.

use engine_core::{ActionMask, Player};

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A legal move out of a node together with its search statistics.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Action index in the game's action space.
    pub action: u16,

    /// Prior from the evaluator after masking and renormalization.
    pub base_prior: f32,

    /// Prior used by selection. Equal to `base_prior` except at a root
    /// that received exploration noise.
    pub prior: f32,

    /// Child node, materialized on first traversal.
    pub child: NodeId,

    /// Number of simulations that took this edge.
    pub visits: u32,

    /// Sum of backed-up values from the perspective of the player moving
    /// at the parent.
    pub value_sum: f32,
}

impl Edge {
    pub fn new(action: u16, prior: f32) -> Self {
        Self {
            action,
            base_prior: prior,
            prior,
            child: NodeId::NONE,
            visits: 0,
            value_sum: 0.0,
        }
    }

    /// Q(s,a); 0 for an unvisited edge.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f32
        }
    }

    /// PUCT score: `Q + c * P * sqrt(N_parent) / (1 + N)`.
    ///
    /// Unvisited edges score infinity so every legal move is tried once
    /// before any is revisited.
    #[inline]
    pub fn ucb_score(&self, parent_visits_sqrt: f32, c_puct: f32) -> f32 {
        if self.visits == 0 {
            return f32::INFINITY;
        }
        let exploration = c_puct * self.prior * parent_visits_sqrt / (1.0 + self.visits as f32);
        self.mean_value() + exploration
    }
}

/// A position in the search graph.
#[derive(Debug, Clone)]
pub struct MctsNode<S> {
    /// Game state at this node.
    pub state: S,

    /// Transposition key of `state`.
    pub key: u64,

    /// Player to move at this node.
    pub to_play: Player,

    /// Legal actions. Empty for terminal nodes.
    pub legal: ActionMask,

    /// Simulations that reached this node.
    pub visit_count: u32,

    /// Outgoing edges in ascending action order. Empty until expanded.
    pub edges: Vec<Edge>,

    /// Whether the evaluator has produced priors for this node.
    pub expanded: bool,

    /// Exact value for `to_play` when the state is terminal.
    pub terminal_value: Option<f32>,
}

impl<S> MctsNode<S> {
    pub fn new(
        state: S,
        key: u64,
        to_play: Player,
        legal: ActionMask,
        terminal_value: Option<f32>,
    ) -> Self {
        Self {
            state,
            key,
            to_play,
            legal,
            visit_count: 0,
            edges: Vec::new(),
            expanded: false,
            terminal_value,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal_value.is_some()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        !self.expanded
    }

    /// Edge index for `action`, if the node has been expanded with it.
    pub fn edge_for(&self, action: usize) -> Option<usize> {
        self.edges
            .binary_search_by_key(&action, |e| e.action as usize)
            .ok()
    }

    /// Total visits over outgoing edges.
    pub fn edge_visits(&self) -> u32 {
        self.edges.iter().map(|e| e.visits).sum()
    }

    /// Edge with the highest visit count; lowest action wins ties.
    pub fn best_edge_by_visits(&self) -> Option<&Edge> {
        let mut best: Option<&Edge> = None;
        for edge in &self.edges {
            if best.map_or(true, |b| edge.visits > b.visits) {
                best = Some(edge);
            }
        }
        best
    }
}
