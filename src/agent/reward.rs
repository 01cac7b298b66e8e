use crate::engine::{simulate, GameState, Move};

/// Tile exponent treated as the practical ceiling when scaling merge rewards.
const LIKELY_WONT_MAKE_IT_TO: f64 = 30.0;

/// Grid values in row-major order, empty cells as 0.
pub fn flatten(state: &GameState) -> [u32; 16] { state.board().values() }

/// Network input for a grid: `log2(value) / 16` per cell, 0 for empty slots.
pub fn encode(state: &GameState) -> Vec<f64> {
    (0..16).map(|idx| state.board().exponent(idx) as f64 / 16.0).collect()
}

/// Scalar reward for taking `mv` from `state`.
///
/// - `-1` if `mv` does not change the grid, unless the game already ended in a win (`+1`).
/// - `+1` if the move reaches the win tile, or ends a game that was won.
/// - `-1` if the move ends the game without a win.
/// - `tile_rank / 30` when the move creates a new highest tile.
/// - `1 - before / after` (kept below 1) when the score grows otherwise.
/// - `0` when nothing was gained.
///
/// ```
/// use ai_2048_worker::agent::calculate_reward;
/// use ai_2048_worker::engine::{GameState, Move};
/// let s = GameState::from_rows([[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
/// assert_eq!(calculate_reward(&s, Move::Left), 1.0);
/// ```
pub fn calculate_reward(state: &GameState, mv: Move) -> f64 {
    let out = simulate(state, mv);
    if !out.moved {
        return if state.over && state.won { 1.0 } else { -1.0 };
    }
    if out.state.over {
        return if out.state.won { 1.0 } else { -1.0 };
    }
    if out.state.won && !state.won {
        return 1.0;
    }
    let (before, after) = (state.tile_rank(), out.state.tile_rank());
    if after > before {
        return after as f64 / LIKELY_WONT_MAKE_IT_TO;
    }
    if out.state.score > state.score {
        let ratio = state.score as f64 / out.state.score as f64;
        return (1.0 - ratio).min(1.0 - f64::EPSILON);
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: [[u32; 4]; 4], score: u64) -> GameState { GameState::from_rows(rows, score).unwrap() }

    #[test]
    fn win_is_plus_one() {
        let s = state([[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]], 5000);
        assert_eq!(calculate_reward(&s, Move::Right), 1.0);
    }

    #[test]
    fn loss_is_minus_one() {
        let mut s = state([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]], 0);
        s.over = true;
        assert_eq!(calculate_reward(&s, Move::Right), -1.0);

        let stuck = state([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]], 10);
        assert_eq!(calculate_reward(&stuck, Move::Left), -1.0);
    }

    #[test]
    fn no_op_is_minus_one() {
        let s = state([[2, 4, 8, 16], [0; 4], [0; 4], [0; 4]], 0);
        assert_eq!(calculate_reward(&s, Move::Up), -1.0);
    }

    #[test]
    fn no_op_after_win_is_minus_one() {
        // Up changes nothing; the won flag carries over from the input.
        let s = state([[4096, 2, 4, 8], [0; 4], [0; 4], [0; 4]], 50_000);
        assert!(s.won);
        assert_eq!(calculate_reward(&s, Move::Up), -1.0);
    }

    #[test]
    fn play_after_win_is_rewarded_normally() {
        let s = state([[4096, 8, 8, 0], [0; 4], [0; 4], [0; 4]], 50_000);
        assert_eq!(calculate_reward(&s, Move::Left), 1.0 - 50_000.0 / 50_016.0);
        let s = state([[2048, 2048, 0, 0], [0; 4], [0; 4], [0; 4]], 50_000);
        assert_eq!(calculate_reward(&s, Move::Left), 12.0 / 30.0);
    }

    #[test]
    fn finished_won_game_is_plus_one() {
        let mut s = state([[2048, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]], 30_000);
        s.over = true;
        assert_eq!(calculate_reward(&s, Move::Left), 1.0);
    }

    #[test]
    fn new_highest_tile_scales_with_log2() {
        let s = state([[8, 8, 0, 0], [0; 4], [0; 4], [0; 4]], 0);
        assert_eq!(calculate_reward(&s, Move::Left), 4.0 / 30.0);
    }

    #[test]
    fn score_gain_without_new_max_is_fractional() {
        let s = state([[64, 2, 2, 0], [0; 4], [0; 4], [0; 4]], 100);
        let r = calculate_reward(&s, Move::Left);
        assert!(r > 0.0 && r < 1.0);
        assert_eq!(r, 1.0 - 100.0 / 104.0);
    }

    #[test]
    fn first_merge_from_zero_score_stays_below_one() {
        let s = state([[64, 2, 2, 0], [0; 4], [0; 4], [0; 4]], 0);
        let r = calculate_reward(&s, Move::Left);
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn plain_slide_is_zero() {
        let s = state([[0, 0, 0, 2], [0; 4], [0; 4], [0; 4]], 40);
        assert_eq!(calculate_reward(&s, Move::Left), 0.0);
    }

    #[test]
    fn flatten_is_row_major() {
        let s = state([[2, 0, 0, 0], [0, 4, 0, 0], [0; 4], [0, 0, 0, 8]], 0);
        let flat = flatten(&s);
        assert_eq!(flat[0], 2);
        assert_eq!(flat[5], 4);
        assert_eq!(flat[15], 8);
        assert_eq!(flat.iter().filter(|&&v| v == 0).count(), 13);
        assert_eq!(encode(&s)[15], 3.0 / 16.0);
    }
}
