//! Index-addressed search tree.
//!
//! Nodes live in one `Vec`; a child always sits at a later slot than its
//! parent, so parent links can never form a cycle and path reconstruction is
//! a bounded walk towards slot 0.

use crate::engine::{GameState, Move};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub state: GameState,
    /// Weighted score of the path from the root to this node.
    pub weighted: f64,
    pub parent: Option<NodeId>,
    /// Move that produced this node from its parent (`None` for the root).
    pub mv: Option<Move>,
    pub depth: u32,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<SearchNode>,
}

impl Tree {
    pub const ROOT: NodeId = 0;

    pub fn new(root: GameState) -> Self {
        Tree {
            nodes: vec![SearchNode {
                state: root,
                weighted: 0.0,
                parent: None,
                mv: None,
                depth: 0,
                children: Vec::new(),
            }],
        }
    }

    /// Append a child of `parent` reached by `mv`.
    pub fn push_child(&mut self, parent: NodeId, mv: Move, state: GameState, weighted: f64) -> NodeId {
        assert!(parent < self.nodes.len(), "parent {parent} is not in the arena");
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(SearchNode { state, weighted, parent: Some(parent), mv: Some(mv), depth, children: Vec::new() });
        self.nodes[parent].children.push(id);
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &SearchNode { &self.nodes[id] }

    #[inline]
    pub fn len(&self) -> usize { self.nodes.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// First move on the path from the root to `id`, and the number of hops walked.
    pub fn root_move(&self, id: NodeId) -> (Option<Move>, u32) {
        let mut current = id;
        let mut first = None;
        let mut hops = 0;
        while let Some(parent) = self.nodes[current].parent {
            debug_assert!(parent < current);
            first = self.nodes[current].mv;
            current = parent;
            hops += 1;
        }
        (first, hops)
    }
}

/// Best node seen so far with the fewest-hops tie-break.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Best {
    pub score: f64,
    pub hops: u32,
    pub mv: Move,
}

impl Best {
    /// Whether a candidate should replace the incumbent.
    ///
    /// A strictly higher score always wins. An equal score wins only with fewer
    /// hops, and never against an incumbent that sits at zero hops.
    #[inline]
    pub fn is_beaten_by(&self, score: f64, hops: u32) -> bool {
        if score > self.score {
            return true;
        }
        score == self.score && self.hops != 0 && hops < self.hops
    }
}

/// Fold a candidate into an optional incumbent.
#[inline]
pub fn offer(best: &mut Option<Best>, candidate: Best) -> bool {
    match best {
        Some(current) if !current.is_beaten_by(candidate.score, candidate.hops) => false,
        _ => {
            *best = Some(candidate);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState { GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap() }

    #[test]
    fn root_move_walks_to_depth_one() {
        let mut tree = Tree::new(state());
        let a = tree.push_child(Tree::ROOT, Move::Left, state(), 1.0);
        let b = tree.push_child(a, Move::Up, state(), 2.0);
        let c = tree.push_child(b, Move::Right, state(), 3.0);
        assert_eq!(tree.root_move(c), (Some(Move::Left), 3));
        assert_eq!(tree.root_move(a), (Some(Move::Left), 1));
        assert_eq!(tree.root_move(Tree::ROOT), (None, 0));
        assert_eq!(tree.node(c).depth, 3);
        assert_eq!(tree.node(a).children, vec![b]);
    }

    #[test]
    fn equal_score_prefers_fewer_hops() {
        let mut best = None;
        assert!(offer(&mut best, Best { score: 4.0, hops: 2, mv: Move::Up }));
        assert!(!offer(&mut best, Best { score: 4.0, hops: 2, mv: Move::Left }));
        assert!(offer(&mut best, Best { score: 4.0, hops: 1, mv: Move::Right }));
        assert!(!offer(&mut best, Best { score: 3.9, hops: 1, mv: Move::Down }));
        assert!(offer(&mut best, Best { score: 5.0, hops: 3, mv: Move::Down }));
        assert_eq!(best.map(|b| b.mv), Some(Move::Down));
    }

    #[test]
    fn zero_hop_incumbent_needs_strictly_higher_score() {
        let incumbent = Best { score: 1.0, hops: 0, mv: Move::Up };
        assert!(!incumbent.is_beaten_by(1.0, 0));
        assert!(incumbent.is_beaten_by(1.5, 4));
    }
}
