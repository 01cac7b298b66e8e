//! Host-facing game state: tiles, grid and the score/over/won flags.
//!
//! The JSON shape mirrors what a browser 2048 host stores for its saved game:
//! `{ "grid": { "size": 4, "cells": [[tile | null; 4]; 4] }, "score", "over", "won" }`
//! where `cells[x][y]` is column-major and a tile is `{ "position": { "x", "y" }, "value" }`.

use serde::{Deserialize, Serialize};

use super::{exponent_to_value, Board, MAX_EXPONENT};

/// Side length of the grid.
pub const GRID_SIZE: usize = 4;

/// A tile value plus its `(x, y)` position; `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub value: u32,
    pub x: usize,
    pub y: usize,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("tile value {0} is not a power of two >= 2")]
    InvalidValue(u32),
    #[error("tile value {0} exceeds the largest supported tile (32768)")]
    ValueTooLarge(u32),
    #[error("position ({x}, {y}) is outside the 4x4 grid")]
    OutOfBounds { x: usize, y: usize },
    #[error("more than one tile at ({x}, {y})")]
    DuplicatePosition { x: usize, y: usize },
    #[error("grid size {0} is not supported")]
    UnsupportedSize(usize),
}

/// Fixed 4x4 collection of optional tiles.
///
/// Backed by the packed [`Board`], so equality is an exact cell-by-cell value comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Grid {
    board: Board,
}

impl Grid {
    pub fn empty() -> Self { Grid { board: Board::EMPTY } }

    /// Build a grid from tiles; positions must be unique and in bounds.
    pub fn from_tiles<I: IntoIterator<Item = Tile>>(tiles: I) -> Result<Self, StateError> {
        let mut cells = [0u8; 16];
        for tile in tiles {
            if tile.x >= GRID_SIZE || tile.y >= GRID_SIZE {
                return Err(StateError::OutOfBounds { x: tile.x, y: tile.y });
            }
            let idx = tile.y * GRID_SIZE + tile.x;
            if cells[idx] != 0 {
                return Err(StateError::DuplicatePosition { x: tile.x, y: tile.y });
            }
            cells[idx] = value_to_exponent(tile.value)?;
        }
        Ok(Grid { board: Board::from_exponents(cells) })
    }

    /// Build a grid from row-major rows of values, 0 meaning an empty slot.
    ///
    /// ```
    /// use ai_2048_worker::engine::Grid;
    /// let grid = Grid::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(grid.cell(1, 0).map(|t| t.value), Some(2));
    /// assert!(grid.cell(2, 0).is_none());
    /// ```
    pub fn from_rows(rows: [[u32; GRID_SIZE]; GRID_SIZE]) -> Result<Self, StateError> {
        let tiles = rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, value)| **value != 0)
                .map(move |(x, &value)| Tile { value, x, y })
        });
        Self::from_tiles(tiles)
    }

    #[inline]
    pub fn from_board(board: Board) -> Self { Grid { board } }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    /// Tile at column `x`, row `y`, or `None` for an empty slot or out-of-bounds position.
    pub fn cell(&self, x: usize, y: usize) -> Option<Tile> {
        if x >= GRID_SIZE || y >= GRID_SIZE {
            return None;
        }
        self.board.tile_value(y * GRID_SIZE + x).map(|value| Tile { value, x, y })
    }

    /// Occupied cells in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..GRID_SIZE * GRID_SIZE).filter_map(move |idx| self.cell(idx % GRID_SIZE, idx / GRID_SIZE))
    }

    /// Row-major rows of values, empty cells as 0.
    pub fn to_rows(&self) -> [[u32; GRID_SIZE]; GRID_SIZE] {
        let mut rows = [[0u32; GRID_SIZE]; GRID_SIZE];
        for tile in self.tiles() {
            rows[tile.y][tile.x] = tile.value;
        }
        rows
    }

    #[inline]
    pub fn highest_tile(&self) -> u32 { self.board.highest_tile() }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Grid").field(&self.to_rows()).finish()
    }
}

/// Snapshot of a game: grid, score and terminal flags.
///
/// A plain value type; simulation always works on a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "GameStateRepr", into = "GameStateRepr")]
pub struct GameState {
    pub grid: Grid,
    pub score: u64,
    pub over: bool,
    pub won: bool,
}

impl GameState {
    /// Tile value that marks a won game.
    pub const WIN_VALUE: u32 = 2048;

    /// Build a state and derive `over`/`won` from the grid.
    pub fn new(grid: Grid, score: u64) -> Self {
        GameState {
            grid,
            score,
            over: grid.board().is_game_over(),
            won: grid.highest_tile() >= Self::WIN_VALUE,
        }
    }

    /// Convenience for tests and hosts that keep row-major value arrays.
    pub fn from_rows(rows: [[u32; GRID_SIZE]; GRID_SIZE], score: u64) -> Result<Self, StateError> {
        Ok(Self::new(Grid::from_rows(rows)?, score))
    }

    #[inline]
    pub fn board(&self) -> Board { self.grid.board() }

    #[inline]
    pub fn highest_tile(&self) -> u32 { self.grid.highest_tile() }

    /// log2 of the highest tile (2 -> 1, 2048 -> 11); 0 for an empty grid.
    #[inline]
    pub fn tile_rank(&self) -> u32 {
        match self.highest_tile() {
            0 => 0,
            v => v.trailing_zeros(),
        }
    }
}

fn value_to_exponent(value: u32) -> Result<u8, StateError> {
    if value < 2 || !value.is_power_of_two() {
        return Err(StateError::InvalidValue(value));
    }
    let exp = value.trailing_zeros();
    if exp > MAX_EXPONENT as u32 {
        return Err(StateError::ValueTooLarge(value));
    }
    debug_assert_eq!(exponent_to_value(exp as u8), value);
    Ok(exp as u8)
}

#[derive(Serialize, Deserialize)]
struct PositionRepr {
    x: usize,
    y: usize,
}

#[derive(Serialize, Deserialize)]
struct TileRepr {
    position: PositionRepr,
    value: u32,
}

#[derive(Serialize, Deserialize)]
struct GridRepr {
    size: usize,
    cells: Vec<Vec<Option<TileRepr>>>,
}

#[derive(Serialize, Deserialize)]
struct GameStateRepr {
    grid: GridRepr,
    #[serde(default)]
    score: u64,
    #[serde(default)]
    over: bool,
    #[serde(default)]
    won: bool,
}

impl TryFrom<GameStateRepr> for GameState {
    type Error = StateError;

    fn try_from(repr: GameStateRepr) -> Result<Self, Self::Error> {
        if repr.grid.size != GRID_SIZE {
            return Err(StateError::UnsupportedSize(repr.grid.size));
        }
        let tiles = repr
            .grid
            .cells
            .into_iter()
            .flatten()
            .flatten()
            .map(|t| Tile { value: t.value, x: t.position.x, y: t.position.y });
        let grid = Grid::from_tiles(tiles)?;
        Ok(GameState { grid, score: repr.score, over: repr.over, won: repr.won })
    }
}

impl From<GameState> for GameStateRepr {
    fn from(state: GameState) -> Self {
        let cells = (0..GRID_SIZE)
            .map(|x| {
                (0..GRID_SIZE)
                    .map(|y| {
                        state.grid.cell(x, y).map(|t| TileRepr {
                            position: PositionRepr { x: t.x, y: t.y },
                            value: t.value,
                        })
                    })
                    .collect()
            })
            .collect();
        GameStateRepr {
            grid: GridRepr { size: GRID_SIZE, cells },
            score: state.score,
            over: state.over,
            won: state.won,
        }
    }
}
