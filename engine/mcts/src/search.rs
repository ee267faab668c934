//! MCTS search implementation.
//!
//! Implements the core MCTS algorithm:
//! 1. Selection: Traverse the graph using PUCT, materializing children lazily
//! 2. Expansion: Create edges for every legal action using the policy prior
//! 3. Evaluation: Get value estimate from evaluator
//! 4. Backpropagation: Update edge statistics along the recorded path
//!
//! A search object keeps its graph between moves. After [`MctsSearch::advance`]
//! the subtree under the chosen action becomes the new root, and the next
//! [`MctsSearch::run`] picks it up if it matches the position it is given.

use std::time::{Duration, Instant};

use engine_core::{ActionMask, Game, GameError};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::MctsConfig;
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::node::{Edge, MctsNode, NodeId};
use crate::tree::{MctsTree, PathStep};

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// An edge carried an action the game refused. The tree and the rules
    /// disagree; this is never recovered from.
    #[error("Illegal action {action}: {source}")]
    IllegalAction {
        action: usize,
        #[source]
        source: GameError,
    },

    #[error("Evaluator error")]
    EvaluatorError(#[from] EvaluatorError),

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SearchError {
    /// True for failures that only spoil the current episode.
    pub fn is_evaluator_failure(&self) -> bool {
        matches!(self, SearchError::EvaluatorError(_))
    }
}

/// Counters and timings collected while searching.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub searches: u64,
    pub simulations: u64,
    pub evaluations: u64,
    pub terminal_hits: u64,
    pub transposition_hits: u64,
    pub cycle_cutoffs: u64,
    pub depth_cutoffs: u64,
    /// Nodes in the graph at the end of the last search
    pub nodes: usize,
    pub select_time: Duration,
    pub eval_time: Duration,
    pub backup_time: Duration,
    pub total_time: Duration,
}

impl SearchStats {
    /// Fold another set of counters into this one.
    pub fn merge(&mut self, other: &SearchStats) {
        self.searches += other.searches;
        self.simulations += other.simulations;
        self.evaluations += other.evaluations;
        self.terminal_hits += other.terminal_hits;
        self.transposition_hits += other.transposition_hits;
        self.cycle_cutoffs += other.cycle_cutoffs;
        self.depth_cutoffs += other.depth_cutoffs;
        self.nodes = self.nodes.max(other.nodes);
        self.select_time += other.select_time;
        self.eval_time += other.eval_time;
        self.backup_time += other.backup_time;
        self.total_time += other.total_time;
    }
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Chosen action (sampled or greedy depending on temperature)
    pub action: usize,

    /// Policy distribution over actions (visit counts normalized)
    pub policy: Vec<f32>,

    /// Visit-weighted value at the root, for the side to move
    pub value: f32,

    /// Number of simulations performed
    pub simulations: u32,

    /// Counters for this search only
    pub stats: SearchStats,
}

/// MCTS search state, reusable across the moves of one game.
#[derive(Debug)]
pub struct MctsSearch<G: Game> {
    config: MctsConfig,
    tree: Option<MctsTree<G::State>>,
    stats: SearchStats,
}

impl<G: Game> MctsSearch<G> {
    pub fn new(config: MctsConfig) -> Self {
        Self {
            config,
            tree: None,
            stats: SearchStats::default(),
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Change the move-selection temperature for subsequent searches.
    /// The graph is kept.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.config.temperature = temperature;
    }

    /// Get the search graph (for inspection/debugging).
    pub fn tree(&self) -> Option<&MctsTree<G::State>> {
        self.tree.as_ref()
    }

    /// Counters accumulated over every search since construction.
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Drop the graph; the next search starts from scratch.
    pub fn reset(&mut self) {
        self.tree = None;
    }

    /// Re-root on the child reached by `action`, or reset when that child
    /// was never built.
    pub fn advance(&mut self, action: usize) {
        if let Some(mut tree) = self.tree.take() {
            if tree.reroot(action) {
                self.tree = Some(tree);
            }
        }
    }

    /// Run the configured number of simulations from `state`.
    ///
    /// On error the graph keeps every fully backed-up simulation; the
    /// failing simulation leaves no statistics behind.
    pub fn run<E: Evaluator + ?Sized>(
        &mut self,
        game: &G,
        evaluator: &E,
        state: &G::State,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult, SearchError> {
        let key = game.state_key(state);
        let mut tree = match self.tree.take() {
            Some(tree) if tree.get(tree.root()).key == key => tree,
            _ => MctsTree::new(new_node(game, state.clone(), key)),
        };

        let mut stats = SearchStats::default();
        let result = self.search(game, evaluator, &mut tree, &mut stats, rng);

        stats.nodes = tree.len();
        self.tree = Some(tree);
        self.stats.merge(&stats);

        let mut result = result?;
        result.stats = stats;
        Ok(result)
    }

    fn search<E: Evaluator + ?Sized>(
        &self,
        game: &G,
        evaluator: &E,
        tree: &mut MctsTree<G::State>,
        stats: &mut SearchStats,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        let num_actions = game.capabilities().num_actions;
        let root_id = tree.root();

        let root = tree.get(root_id);
        if root.is_terminal() {
            return Err(SearchError::InvalidState(
                "search started from a terminal position".into(),
            ));
        }
        if root.legal.none() {
            return Err(SearchError::NoLegalMoves);
        }

        // First, expand the root if needed
        if !root.expanded {
            let eval_start = Instant::now();
            expand(game, evaluator, tree, root_id, num_actions)?;
            stats.evaluations += 1;
            stats.eval_time += eval_start.elapsed();
        }

        self.prepare_root_priors(tree, rng)?;

        for _ in 0..self.config.num_simulations {
            self.simulate(game, evaluator, tree, stats, num_actions)?;
            stats.simulations += 1;
        }

        let policy = tree.root_policy(num_actions, self.config.temperature);
        let action = if self.config.temperature < 1e-6 {
            tree.best_action()
                .map(|(a, _)| a)
                .ok_or(SearchError::NoLegalMoves)?
        } else {
            sample_action(&policy, rng)?
        };

        stats.searches += 1;
        stats.total_time += start.elapsed();

        let value = tree.root_value();
        debug!(
            action,
            value,
            nodes = tree.len(),
            evaluations = stats.evaluations,
            transpositions = stats.transposition_hits,
            "MCTS search complete"
        );

        Ok(SearchResult {
            action,
            policy,
            value,
            simulations: self.config.num_simulations,
            stats: SearchStats::default(),
        })
    }

    /// Reset root priors to the evaluator's and mix in fresh noise.
    fn prepare_root_priors(
        &self,
        tree: &mut MctsTree<G::State>,
        rng: &mut ChaCha20Rng,
    ) -> Result<(), SearchError> {
        let root_id = tree.root();
        let root = tree.get_mut(root_id);
        for edge in &mut root.edges {
            edge.prior = edge.base_prior;
        }

        if !self.config.noise_enabled() || root.edges.is_empty() {
            return Ok(());
        }

        let noise = dirichlet_noise(root.edges.len(), self.config.dirichlet_alpha, rng)?;
        let eps = self.config.dirichlet_epsilon;
        for (edge, n) in root.edges.iter_mut().zip(noise) {
            edge.prior = (1.0 - eps) * edge.base_prior + eps * n;
        }
        Ok(())
    }

    /// Run a single simulation (select -> expand -> evaluate -> backpropagate).
    fn simulate<E: Evaluator + ?Sized>(
        &self,
        game: &G,
        evaluator: &E,
        tree: &mut MctsTree<G::State>,
        stats: &mut SearchStats,
        num_actions: usize,
    ) -> Result<(), SearchError> {
        let descent = Instant::now();
        let mut eval_elapsed = Duration::ZERO;
        let mut path: Vec<PathStep> = Vec::new();
        let mut current = tree.root();
        let max_depth = self.config.max_depth.max(1) as usize;

        let value = loop {
            let node = tree.get(current);

            if let Some(v) = node.terminal_value {
                stats.terminal_hits += 1;
                break v;
            }

            if !node.expanded {
                let eval_start = Instant::now();
                let v = expand(game, evaluator, tree, current, num_actions)?;
                eval_elapsed = eval_start.elapsed();
                stats.evaluations += 1;
                break v;
            }

            if path.len() >= max_depth {
                stats.depth_cutoffs += 1;
                break 0.0;
            }

            let edge = tree
                .select_edge(current, self.config.c_puct)
                .ok_or(SearchError::NoLegalMoves)?;
            let child = materialize(game, tree, current, edge, stats)?;
            path.push(PathStep {
                node: current,
                edge,
            });
            current = child;

            // Position already on this path: back up a neutral value
            if path.iter().any(|step| step.node == child) {
                stats.cycle_cutoffs += 1;
                break 0.0;
            }
        };

        stats.eval_time += eval_elapsed;
        stats.select_time += descent.elapsed().saturating_sub(eval_elapsed);

        let backup_start = Instant::now();
        tree.backpropagate(&path, current, value);
        stats.backup_time += backup_start.elapsed();

        trace!(
            leaf = current.0,
            path_len = path.len(),
            value = value,
            "MCTS simulation complete"
        );

        Ok(())
    }
}

/// Build a node for `state`, caching legality and terminal status.
fn new_node<G: Game>(game: &G, state: G::State, key: u64) -> MctsNode<G::State> {
    let terminal_value = game.terminal_value(&state);
    let legal = if terminal_value.is_some() {
        ActionMask::new(game.capabilities().num_actions)
    } else {
        game.legal_mask(&state)
    };
    let to_play = game.to_play(&state);
    MctsNode::new(state, key, to_play, legal, terminal_value)
}

/// Follow an edge, creating or reusing the child it leads to.
fn materialize<G: Game>(
    game: &G,
    tree: &mut MctsTree<G::State>,
    parent: NodeId,
    edge: usize,
    stats: &mut SearchStats,
) -> Result<NodeId, SearchError> {
    let (action, child) = {
        let e = &tree.get(parent).edges[edge];
        (e.action as usize, e.child)
    };
    if child.is_some() {
        return Ok(child);
    }

    let next = game
        .apply(&tree.get(parent).state, action)
        .map_err(|source| SearchError::IllegalAction { action, source })?;
    let key = game.state_key(&next);

    let child = match tree.lookup(key) {
        Some(existing) => {
            stats.transposition_hits += 1;
            existing
        }
        None => tree.insert(new_node(game, next, key)),
    };
    tree.get_mut(parent).edges[edge].child = child;
    Ok(child)
}

/// Evaluate a leaf and give it one edge per legal action.
///
/// Nothing in the tree changes unless the evaluator output is usable.
fn expand<G: Game, E: Evaluator + ?Sized>(
    game: &G,
    evaluator: &E,
    tree: &mut MctsTree<G::State>,
    node_id: NodeId,
    num_actions: usize,
) -> Result<f32, SearchError> {
    let node = tree.get(node_id);
    let obs = game.observation(&node.state);
    let eval = evaluator
        .evaluate(&obs, &node.legal)?
        .validated(num_actions)?;

    let priors = masked_priors(&eval.policy, &node.legal);
    let edges: Vec<Edge> = node
        .legal
        .iter_ones()
        .zip(priors)
        .map(|(action, prior)| Edge::new(action as u16, prior))
        .collect();

    let node = tree.get_mut(node_id);
    node.edges = edges;
    node.expanded = true;
    Ok(eval.value.clamp(-1.0, 1.0))
}

/// Restrict a policy to the legal actions and renormalize.
///
/// Falls back to uniform when the legal mass is zero. The result is in
/// ascending action order, one entry per legal action.
pub fn masked_priors(policy: &[f32], legal: &ActionMask) -> Vec<f32> {
    let raw: Vec<f32> = legal
        .iter_ones()
        .map(|a| policy.get(a).copied().unwrap_or(0.0).max(0.0))
        .collect();
    let sum: f32 = raw.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        raw.iter().map(|p| p / sum).collect()
    } else {
        let uniform = 1.0 / raw.len().max(1) as f32;
        vec![uniform; raw.len()]
    }
}

/// Sample an action from a probability distribution.
pub fn sample_action(policy: &[f32], rng: &mut ChaCha20Rng) -> Result<usize, SearchError> {
    let r: f32 = rng.gen();
    let mut cumsum = 0.0;

    for (i, &p) in policy.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return Ok(i);
        }
    }

    // Fallback to last non-zero action (handles floating point issues)
    for (i, &p) in policy.iter().enumerate().rev() {
        if p > 0.0 {
            return Ok(i);
        }
    }

    Err(SearchError::NoLegalMoves)
}

/// Generate Dirichlet-distributed noise using Gamma variates.
pub fn dirichlet_noise(
    n: usize,
    alpha: f32,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<f32>, SearchError> {
    use rand_distr::{Distribution, Gamma};

    let gamma = Gamma::new(alpha as f64, 1.0)
        .map_err(|e| SearchError::InvalidState(format!("dirichlet alpha {alpha}: {e}")))?;
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    } else if n > 0 {
        samples.fill(1.0 / n as f32);
    }

    Ok(samples)
}

/// Convenience function to run a single MCTS search from scratch.
pub fn run_mcts<G: Game, E: Evaluator + ?Sized>(
    game: &G,
    evaluator: &E,
    config: MctsConfig,
    state: &G::State,
    rng: &mut ChaCha20Rng,
) -> Result<SearchResult, SearchError> {
    let mut search = MctsSearch::new(config);
    search.run(game, evaluator, state, rng)
}
