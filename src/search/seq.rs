use log::debug;

use crate::engine::{self, simulate, GameState, Move};

use super::arena::{offer, Best, NodeId, Tree};
use super::{BranchEval, SearchConfig, SearchOutcome, SearchStats, Weighting};

/// Single-threaded lookahead search.
pub struct Lookahead {
    cfg: SearchConfig,
    stats: SearchStats,
}

impl Lookahead {
    pub fn new() -> Self { Self::with_config(SearchConfig::default()) }

    pub fn with_config(cfg: SearchConfig) -> Self {
        engine::new();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }

    /// Best move at the configured default depth.
    #[inline]
    pub fn best_move(&mut self, state: &GameState) -> Option<Move> {
        self.best_move_to_depth(state, self.cfg.max_depth)
    }

    /// Best move searching at most `max_depth` moves ahead (capped by `depth_cap`).
    ///
    /// ```
    /// use ai_2048_worker::engine::{GameState, Move};
    /// use ai_2048_worker::search::Lookahead;
    /// // Only Down changes this grid.
    /// let state = GameState::from_rows([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]], 0).unwrap();
    /// assert_eq!(Lookahead::new().best_move_to_depth(&state, 1), Some(Move::Down));
    /// ```
    pub fn best_move_to_depth(&mut self, state: &GameState, max_depth: u32) -> Option<Move> {
        self.search(state, max_depth).best_move()
    }

    /// Best weighted score per root direction, in `[Up, Right, Down, Left]` order.
    pub fn branch_evals(&mut self, state: &GameState) -> [BranchEval; 4] {
        self.search(state, self.cfg.max_depth).branches
    }

    /// Run one full search and return the best node summary and per-branch scores.
    pub fn search(&mut self, state: &GameState, max_depth: u32) -> SearchOutcome {
        let depth = self.cfg.effective_depth(max_depth);
        let mut tree = Tree::new(*state);
        let mut best = None;
        let mut branches = Move::ALL.map(BranchEval::illegal);
        expand(&mut tree, Tree::ROOT, state.score, depth, self.cfg.weighting, &mut best, &mut branches);
        let nodes = tree.len() as u64;
        self.stats.nodes = nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
        debug!("lookahead depth={} nodes={} best={:?}", depth, nodes, best);
        SearchOutcome { best, branches, nodes }
    }

    /// Statistics collected from the last search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl Default for Lookahead { fn default() -> Self { Self::new() } }

/// Depth-first expansion of the subtree under `start`.
///
/// All children of a node are scored before any of them is expanded, and
/// siblings are expanded in `Move::ALL` order.
pub(super) fn expand(
    tree: &mut Tree,
    start: NodeId,
    root_score: u64,
    max_depth: u32,
    weighting: Weighting,
    best: &mut Option<Best>,
    branches: &mut [BranchEval; 4],
) {
    let mut stack = vec![start];
    let mut children = Vec::with_capacity(4);
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let depth = node.depth;
        if depth >= max_depth {
            continue;
        }
        let state = node.state;
        children.clear();
        for dir in Move::ALL {
            let out = simulate(&state, dir);
            if !out.moved {
                continue;
            }
            let gain = out.state.score.saturating_sub(root_score);
            let weighted = weighting.weigh(gain, depth, max_depth, &out.state);
            let child = tree.push_child(id, dir, out.state, weighted);
            record(tree, child, best, branches);
            children.push(child);
        }
        stack.extend(children.iter().rev());
    }
}

/// Score a freshly attached node against the running best and its branch.
pub(super) fn record(tree: &Tree, id: NodeId, best: &mut Option<Best>, branches: &mut [BranchEval; 4]) {
    let (root_move, hops) = tree.root_move(id);
    let Some(mv) = root_move else { return };
    let weighted = tree.node(id).weighted;
    offer(best, Best { score: weighted, hops, mv });
    let branch = &mut branches[mv.index()];
    if !branch.legal || weighted > branch.score {
        *branch = BranchEval { dir: mv, score: weighted, legal: true };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: [[u32; 4]; 4]) -> GameState { GameState::from_rows(rows, 0).unwrap() }

    #[test]
    fn single_legal_direction_at_depth_one() {
        // Only Left changes this grid.
        let s = state([[0, 0, 0, 2], [0, 0, 0, 4], [0, 0, 0, 8], [0, 0, 0, 16]]);
        let mut search = Lookahead::new();
        assert_eq!(search.best_move_to_depth(&s, 1), Some(Move::Left));
        let branches = search.branch_evals(&s);
        assert!(branches[Move::Left.index()].legal);
        assert_eq!(branches.iter().filter(|b| b.legal).count(), 1);
    }

    #[test]
    fn no_move_when_grid_is_stuck() {
        let s = state([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let mut search = Lookahead::new();
        assert_eq!(search.best_move(&s), None);
        assert_eq!(search.last_stats().nodes, 1);
    }

    #[test]
    fn depth_zero_never_leaves_the_root() {
        let s = state([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(Lookahead::new().best_move_to_depth(&s, 0), None);
    }

    #[test]
    fn prefers_the_merge() {
        // Left/Right merge the pair; Up/Down only slide.
        let s = state([[0; 4], [0; 4], [0; 4], [2, 2, 0, 0]]);
        let mv = Lookahead::new().best_move_to_depth(&s, 1);
        assert!(matches!(mv, Some(Move::Left) | Some(Move::Right)), "got {mv:?}");
    }

    #[test]
    fn depth_is_capped() {
        let cfg = SearchConfig { depth_cap: 2, ..SearchConfig::default() };
        let s = state([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut search = Lookahead::with_config(cfg);
        let capped = search.search(&s, 50).nodes;
        let two = Lookahead::new().search(&s, 2).nodes;
        assert_eq!(capped, two);
    }

    #[test]
    fn equal_scores_resolve_to_fewer_hops() {
        // A lone 2 can never merge: every weighted score is 0, so the first
        // depth-1 node (Right) is kept and deeper ties never replace it.
        let s = state([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let out = Lookahead::new().search(&s, 3);
        let best = out.best.unwrap();
        assert_eq!(best.hops, 1);
        assert_eq!(best.mv, Move::Right);
        assert_eq!(best.score, 0.0);
    }

    #[test]
    fn positional_weightings() {
        // The merged 4 lands in a bottom corner: multiplier 0.25 + 4 + 1.
        let s = state([[0; 4], [0; 4], [0; 4], [2, 2, 0, 0]]);
        let penalty = Lookahead::new().search(&s, 1);
        assert_eq!(penalty.best.unwrap().score, 4.0 / 5.25);
        let cfg = SearchConfig { weighting: Weighting::PositionalBonus, ..SearchConfig::default() };
        let bonus = Lookahead::with_config(cfg).search(&s, 1);
        assert_eq!(bonus.best.unwrap().score, 4.0 * 5.25);
    }

    #[test]
    fn depth_uniform_weighting_is_supported() {
        let cfg = SearchConfig { weighting: Weighting::DepthUniform, ..SearchConfig::default() };
        let s = state([[0; 4], [0; 4], [0; 4], [2, 2, 0, 0]]);
        let out = Lookahead::with_config(cfg).search(&s, 1);
        // gain 4 at depth 0 with max_depth 1: 4 / (1 / 2)
        assert_eq!(out.best.unwrap().score, 8.0);
    }
}
