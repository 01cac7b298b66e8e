use log::debug;
use rayon::prelude::*;

use crate::engine::{self, simulate, GameState, Move};

use super::arena::{offer, Best, Tree};
use super::seq::{expand, record};
use super::{BranchEval, SearchConfig, SearchOutcome, SearchStats};

/// Parallel lookahead: each legal root direction is expanded in its own arena on rayon.
///
/// Branch results are folded back in `Move::ALL` order with the same
/// tie-break as [`super::Lookahead`], so both pick the same move.
pub struct LookaheadParallel {
    cfg: SearchConfig,
    stats: SearchStats,
}

struct BranchResult {
    best: Option<Best>,
    eval: BranchEval,
    nodes: u64,
}

impl LookaheadParallel {
    pub fn new() -> Self { Self::with_config(SearchConfig::default()) }

    pub fn with_config(cfg: SearchConfig) -> Self {
        engine::new();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }

    #[inline]
    pub fn best_move(&mut self, state: &GameState) -> Option<Move> {
        self.best_move_to_depth(state, self.cfg.max_depth)
    }

    #[inline]
    pub fn best_move_to_depth(&mut self, state: &GameState, max_depth: u32) -> Option<Move> {
        self.search(state, max_depth).best_move()
    }

    pub fn branch_evals(&mut self, state: &GameState) -> [BranchEval; 4] {
        self.search(state, self.cfg.max_depth).branches
    }

    pub fn search(&mut self, state: &GameState, max_depth: u32) -> SearchOutcome {
        let depth = self.cfg.effective_depth(max_depth);
        let weighting = self.cfg.weighting;
        let results: Vec<BranchResult> = Move::ALL
            .par_iter()
            .map(|&dir| {
                if depth == 0 {
                    return BranchResult { best: None, eval: BranchEval::illegal(dir), nodes: 0 };
                }
                let out = simulate(state, dir);
                if !out.moved {
                    return BranchResult { best: None, eval: BranchEval::illegal(dir), nodes: 0 };
                }
                let mut tree = Tree::new(*state);
                let weighted = weighting.weigh(out.score_delta, 0, depth, &out.state);
                let child = tree.push_child(Tree::ROOT, dir, out.state, weighted);
                let mut best = None;
                let mut branches = Move::ALL.map(BranchEval::illegal);
                record(&tree, child, &mut best, &mut branches);
                expand(&mut tree, child, state.score, depth, weighting, &mut best, &mut branches);
                BranchResult { best, eval: branches[dir.index()], nodes: tree.len() as u64 - 1 }
            })
            .collect();

        // par_iter over an array preserves order on collect
        let mut best = None;
        let mut branches = Move::ALL.map(BranchEval::illegal);
        let mut nodes = 1u64;
        for (slot, result) in results.into_iter().enumerate() {
            if let Some(candidate) = result.best {
                offer(&mut best, candidate);
            }
            branches[slot] = result.eval;
            nodes += result.nodes;
        }
        self.stats.nodes = nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
        debug!("parallel lookahead depth={} nodes={} best={:?}", depth, nodes, best);
        SearchOutcome { best, branches, nodes }
    }

    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl Default for LookaheadParallel { fn default() -> Self { Self::new() } }
