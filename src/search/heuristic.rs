use crate::engine::{Board, GameState};

const BASE: f64 = 0.25;
const CORNER_BONUS: f64 = 4.0;
const EDGE_BONUS: f64 = 1.0;
const THIRD_EDGE_BONUS: f64 = 0.5;

/// Largest value [`positional_multiplier`] can return.
pub const MAX_MULTIPLIER: f64 = BASE + CORNER_BONUS + EDGE_BONUS + EDGE_BONUS + THIRD_EDGE_BONUS;

/// Bonus for keeping the largest tiles pinned to corners and edges.
///
/// The highest tile earns +4 in a corner and +1 on any edge, the runner-up
/// +1 on an edge and the third +0.5 on an edge, on top of a 0.25 base.
/// Equal values are ranked by Manhattan distance to the highest cell.
///
/// ```
/// use ai_2048_worker::engine::GameState;
/// use ai_2048_worker::search::positional_multiplier;
/// let s = GameState::from_rows([[64, 32, 16, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
/// assert_eq!(positional_multiplier(&s), 6.75);
/// ```
pub fn positional_multiplier(state: &GameState) -> f64 { board_multiplier(state.board()) }

pub(crate) fn board_multiplier(board: Board) -> f64 {
    let ranked = rank_cells(board);
    let mut multiplier = BASE;
    if let Some(&(_, highest)) = ranked.first() {
        if is_corner(highest) { multiplier += CORNER_BONUS; }
        if is_edge(highest) { multiplier += EDGE_BONUS; }
    }
    if let Some(&(_, second)) = ranked.get(1) {
        if is_edge(second) { multiplier += EDGE_BONUS; }
    }
    if let Some(&(_, third)) = ranked.get(2) {
        if is_edge(third) { multiplier += THIRD_EDGE_BONUS; }
    }
    multiplier
}

/// Occupied cells as `(exponent, index)`, highest first.
///
/// The first (row-major) cell holding the maximum is the anchor; everything
/// else sorts by value descending, then distance to the anchor, then index.
fn rank_cells(board: Board) -> Vec<(u8, usize)> {
    let mut cells: Vec<(u8, usize)> = (0..16)
        .map(|idx| (board.exponent(idx), idx))
        .filter(|&(exp, _)| exp != 0)
        .collect();
    let Some(anchor) = cells.iter().copied().max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1))) else {
        return cells;
    };
    cells.sort_by(|a, b| {
        let a_key = (a.1 != anchor.1, std::cmp::Reverse(a.0), distance(a.1, anchor.1), a.1);
        let b_key = (b.1 != anchor.1, std::cmp::Reverse(b.0), distance(b.1, anchor.1), b.1);
        a_key.cmp(&b_key)
    });
    cells
}

#[inline]
fn distance(a: usize, b: usize) -> usize {
    let (ax, ay) = (a % 4, a / 4);
    let (bx, by) = (b % 4, b / 4);
    ax.abs_diff(bx) + ay.abs_diff(by)
}

#[inline]
fn is_corner(idx: usize) -> bool { matches!(idx, 0 | 3 | 12 | 15) }

#[inline]
fn is_edge(idx: usize) -> bool {
    let (x, y) = (idx % 4, idx / 4);
    x == 0 || x == 3 || y == 0 || y == 3
}
