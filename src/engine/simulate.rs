use super::{GameState, Grid, Move};

/// Result of applying one move to a copy of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub state: GameState,
    pub score_delta: u64,
    pub moved: bool,
}

/// Apply `dir` to a copy of `state`.
///
/// Pure: no random tile is spawned and the input is only borrowed. A terminal
/// (`over`) input, or a move that leaves every cell unchanged, yields
/// `moved == false`, `score_delta == 0` and an identical copy of the input.
///
/// ```
/// use ai_2048_worker::engine::{simulate, GameState, Move};
/// let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 0).unwrap();
/// let out = simulate(&state, Move::Left);
/// assert!(out.moved);
/// assert_eq!(out.score_delta, 4);
/// assert_eq!(out.state.grid.to_rows()[0], [4, 0, 0, 0]);
/// ```
pub fn simulate(state: &GameState, dir: Move) -> Outcome {
    let unchanged = Outcome { state: *state, score_delta: 0, moved: false };
    if state.over {
        return unchanged;
    }
    let board = state.board();
    let (next, gain) = board.shift_scored(dir);
    if next == board {
        return unchanged;
    }
    let grid = Grid::from_board(next);
    let score_delta = gain as u64;
    Outcome {
        state: GameState {
            grid,
            score: state.score + score_delta,
            over: next.is_game_over(),
            won: state.won || grid.highest_tile() >= GameState::WIN_VALUE,
        },
        score_delta,
        moved: true,
    }
}
