//! Bounded lookahead search (single-threaded and parallel) for 2048.
//!
//! The search expands every grid-changing move up to a depth bound, weights
//! the score gained since the root by depth and by the positional heuristic,
//! and returns the root move leading to the best node found anywhere in the
//! tree. Equal weighted scores are broken in favour of the node reached in
//! fewer moves.
//!
//! Both variants share the same public surface and always agree on the
//! chosen move; [`LookaheadParallel`] only fans the four root branches out
//! over rayon.
//!
//! Quick start
//! ```
//! use ai_2048_worker::engine::{GameState, Move};
//! use ai_2048_worker::search::{Lookahead, LookaheadParallel};
//!
//! let state = GameState::from_rows([[2, 2, 4, 8], [0; 4], [0; 4], [0; 4]], 0).unwrap();
//! let mut search = Lookahead::new();
//! let mv = search.best_move(&state);
//! assert!(mv.is_some());
//! assert_eq!(LookaheadParallel::new().best_move(&state), mv);
//! ```

use crate::engine::{GameState, Move};

mod arena;
mod heuristic;
mod seq;
mod par;

pub use arena::{Best, NodeId, SearchNode, Tree};
pub use heuristic::{positional_multiplier, MAX_MULTIPLIER};
pub use par::LookaheadParallel;
pub use seq::Lookahead;

/// How a node's score gain is turned into a weighted score.
///
/// `d` is the depth of the node being expanded (its children sit at `d + 1`)
/// and `m` is [`positional_multiplier`] of the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// `gain / ((d + 1) * m)`.
    #[default]
    Positional,
    /// `gain * m / (d + 1)`: the multiplier as a bonus for corner/edge shapes.
    PositionalBonus,
    /// `gain / ((d + 1) / (max_depth + 1))`.
    DepthUniform,
}

impl Weighting {
    #[inline]
    pub(crate) fn weigh(self, gain: u64, depth: u32, max_depth: u32, child: &GameState) -> f64 {
        let gain = gain as f64;
        let steps = depth as f64 + 1.0;
        match self {
            Weighting::Positional => {
                let divisor = steps * heuristic::board_multiplier(child.board());
                gain / divisor.max(f64::MIN_POSITIVE)
            }
            Weighting::PositionalBonus => gain * heuristic::board_multiplier(child.board()) / steps,
            Weighting::DepthUniform => gain / (steps / (max_depth as f64 + 1.0)),
        }
    }
}

/// Configurable knobs for the lookahead search.
///
/// - `max_depth`: default depth bound when a request does not name one.
/// - `depth_cap`: absolute cap applied to every requested depth.
/// - `weighting`: score weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub max_depth: u32,
    pub depth_cap: u32,
    pub weighting: Weighting,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_depth: 3, depth_cap: 9, weighting: Weighting::Positional }
    }
}

impl SearchConfig {
    #[inline]
    pub fn effective_depth(&self, requested: u32) -> u32 { requested.min(self.depth_cap) }
}

/// Per-direction summary at the root.
///
/// - `score` is the best weighted score reached through `dir`.
/// - `legal` is false when `dir` does not change the root grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub score: f64,
    pub legal: bool,
}

impl BranchEval {
    pub(crate) fn illegal(dir: Move) -> Self { BranchEval { dir, score: 0.0, legal: false } }
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

/// Result of one full search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub best: Option<Best>,
    pub branches: [BranchEval; 4],
    pub nodes: u64,
}

impl SearchOutcome {
    #[inline]
    pub fn best_move(&self) -> Option<Move> { self.best.map(|b| b.mv) }
}

/// One-shot search with the default configuration and an explicit depth.
///
/// Returns `None` when no direction changes the grid.
pub fn best_move(state: &GameState, max_depth: u32) -> Option<Move> {
    Lookahead::new().best_move_to_depth(state, max_depth)
}
