//! Packed 4x4 board, directional moves and the pure move simulator.
//!
//! The board keeps one 4-bit exponent per cell (0 = empty), so a whole grid
//! fits in a `u64` and copying a state is a plain value copy. Sliding and
//! merging go through per-line lookup tables that are built once on first use.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub mod simulate;
pub mod state;

pub use simulate::{simulate, Outcome};
pub use state::{GameState, Grid, StateError, Tile};

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Up,
    Right,
    Down,
    Left,
}

impl Move {
    /// All four directions in action-index order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    /// Action index used by the learning agent (`Up = 0 .. Left = 3`).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Right => 1,
            Move::Down => 2,
            Move::Left => 3,
        }
    }

    #[inline]
    pub fn from_index(idx: usize) -> Option<Move> { Move::ALL.get(idx).copied() }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Right => "right",
            Move::Down => "down",
            Move::Left => "left",
        };
        f.write_str(name)
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

/// Largest exponent a nibble can hold (2^15 = 32768). Two such tiles never merge.
pub const MAX_EXPONENT: u8 = 15;

struct Stores {
    shift_left: Box<[u64]>,
    shift_right: Box<[u64]>,
    shift_up: Box<[u64]>,
    shift_down: Box<[u64]>,
    gain_left: Box<[u32]>,
    gain_right: Box<[u32]>,
}

type BoardRaw = u64;
type Line = u64;
type Exponent = u64;
type Gain = u32;

/// Packed 4x4 board as 16 4-bit nibbles in a `u64`, row-major from the top-left cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }


    /// Build a board from per-cell exponents in row-major order.
    pub fn from_exponents(cells: [u8; 16]) -> Self {
        let raw = cells.iter().enumerate().fold(0u64, |acc, (idx, &exp)| {
            acc | (((exp & 0xf) as u64) << (60 - 4 * idx))
        });
        Board(raw)
    }

    /// Return the board resulting from sliding/merging tiles in `dir`.
    #[inline]
    pub fn shift(self, dir: Move) -> Self { self.shift_scored(dir).0 }

    /// Slide/merge in `dir` and also report the sum of tile values created by merges.
    ///
    /// ```
    /// use ai_2048_worker::engine::{self as GameEngine, Board, Move};
    /// GameEngine::new();
    /// let b = Board::from_raw(0x1100_0000_0000_0000);
    /// let (next, gain) = b.shift_scored(Move::Left);
    /// assert_eq!(next, Board::from_raw(0x2000_0000_0000_0000));
    /// assert_eq!(gain, 4);
    /// ```
    #[inline]
    pub fn shift_scored(self, dir: Move) -> (Self, Gain) {
        match dir {
            Move::Left | Move::Right => shift_rows(self, dir),
            Move::Up | Move::Down => shift_cols(self, dir),
        }
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = generate_random_tile(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Return true if no move in any direction changes the board.
    #[inline]
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| self.shift(dir) == self)
    }

    /// Highest tile value present on the board (0 for an empty board).
    #[inline]
    pub fn highest_tile(self) -> u32 {
        let max = (0..16).map(|idx| self.exponent(idx)).max().unwrap_or(0);
        exponent_to_value(max)
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 { 16 - count_non_empty(self) }

    /// Exponent stored at row-major index `idx` (0 when empty).
    #[inline]
    pub fn exponent(self, idx: usize) -> u8 { ((self.0 >> (60 - 4 * idx)) & 0xf) as u8 }

    /// Tile value at row-major index `idx`, or `None` for an empty slot.
    #[inline]
    pub fn tile_value(self, idx: usize) -> Option<u32> {
        match self.exponent(idx) {
            0 => None,
            exp => Some(1u32 << exp),
        }
    }

    /// Cell values in row-major order, empty cells as 0.
    pub fn values(self) -> [u32; 16] {
        let mut out = [0u32; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.tile_value(idx).unwrap_or(0);
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    STORES.get_or_init(create_stores);
}

#[inline]
pub(crate) fn exponent_to_value(exp: u8) -> u32 {
    if exp == 0 { 0 } else { 1u32 << exp }
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

pub(crate) fn line_to_vec(line: Line) -> Vec<Exponent> {
    (0..4).fold(Vec::new(), |mut tiles, tile_idx| {
        tiles.push(line >> ((3 - tile_idx) * 4) & 0xf);
        tiles
    })
}

static STORES: OnceLock<Stores> = OnceLock::new();

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut gain_left = vec![0u32; LINE_TABLE_SIZE];
    let mut gain_right = vec![0u32; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let line = val as u64;
        let (left, left_gain) = shift_line(line, Move::Left);
        let (right, right_gain) = shift_line(line, Move::Right);
        shift_left[val] = left;
        shift_right[val] = right;
        shift_up[val] = shift_line(line, Move::Up).0;
        shift_down[val] = shift_line(line, Move::Down).0;
        gain_left[val] = left_gain;
        gain_right[val] = right_gain;
    }

    Stores {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        gain_left: gain_left.into_boxed_slice(),
        gain_right: gain_right.into_boxed_slice(),
    }
}

#[inline(always)]
fn stores() -> &'static Stores { STORES.get_or_init(create_stores) }

#[inline(always)]
fn get_line_entry<T: Copy>(table: &[T], idx: u16) -> T {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    table[idx as usize]
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u64 { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn shift_rows(board: Board, move_dir: Move) -> (Board, Gain) {
    let s = stores();
    let (table, gains): (&[u64], &[u32]) = match move_dir {
        Move::Right => (&s.shift_right, &s.gain_right),
        _ => (&s.shift_left, &s.gain_left),
    };
    (0..4).fold((Board::EMPTY, 0), |(new_board, gain), row_idx| {
        let row_val = extract_line(board.0, row_idx) as u16;
        let new_row_val = get_line_entry(table, row_val);
        (
            Board(new_board.0 | (new_row_val << (48 - (16 * row_idx)))),
            gain + get_line_entry(gains, row_val),
        )
    })
}

fn shift_cols(board: Board, move_dir: Move) -> (Board, Gain) {
    let transpose_board = transpose(board.0);
    let s = stores();
    let (table, gains): (&[u64], &[u32]) = match move_dir {
        Move::Down => (&s.shift_down, &s.gain_right),
        _ => (&s.shift_up, &s.gain_left),
    };
    (0..4).fold((Board::EMPTY, 0), |(new_board, gain), col_idx| {
        let col_val = extract_line(transpose_board, col_idx) as u16;
        let new_col_val = get_line_entry(table, col_val);
        (
            Board(new_board.0 | (new_col_val << (12 - (4 * col_idx)))),
            gain + get_line_entry(gains, col_val),
        )
    })
}

fn shift_line(line: Line, direction: Move) -> (Line, Gain) {
    let tiles = line_to_vec(line);
    let (shifted, gain) = shift_vec(tiles, direction);
    match direction {
        Move::Left | Move::Right => (vec_to_row(shifted), gain),
        Move::Up | Move::Down => (vec_to_col(shifted), gain),
    }
}

fn vec_to_row(tiles: Vec<Exponent>) -> Line {
    tiles[0] << 12 | tiles[1] << 8 | tiles[2] << 4 | tiles[3]
}

fn vec_to_col(tiles: Vec<Exponent>) -> Line {
    tiles[0] << 48 | tiles[1] << 32 | tiles[2] << 16 | tiles[3]
}

fn shift_vec(vec: Vec<Exponent>, direction: Move) -> (Vec<Exponent>, Gain) {
    match direction {
        Move::Left | Move::Up => shift_vec_left(vec),
        Move::Right | Move::Down => shift_vec_right(vec),
    }
}

fn shift_vec_right(vec: Vec<Exponent>) -> (Vec<Exponent>, Gain) {
    let rev_vec: Vec<Exponent> = vec.into_iter().rev().collect();
    let (shifted, gain) = shift_vec_left(rev_vec);
    (shifted.into_iter().rev().collect(), gain)
}

fn shift_vec_left(mut vec: Vec<Exponent>) -> (Vec<Exponent>, Gain) {
    let mut gain = 0;
    for i in 0..4 {
        gain += calculate_left_shift(&mut vec[i..]);
    }
    (vec, gain)
}

/// Pull the next tile into `slice[0]`, merging it with the following equal tile.
/// Returns the value created by the merge, or 0.
fn calculate_left_shift(slice: &mut [Exponent]) -> Gain {
    let mut acc = 0;
    let mut merged = 0;
    for idx in 0..slice.len() {
        let val = slice[idx];
        if acc != 0 && acc == val && acc < MAX_EXPONENT as u64 {
            slice[idx] = 0;
            acc += 1;
            merged = 1 << acc;
            break;
        } else if acc != 0 && val != 0 {
            break;
        } else if acc == 0 && val != 0 {
            slice[idx] = 0;
            acc = val;
        };
    }
    slice[0] = acc;
    merged
}

fn count_non_empty(board: Board) -> u64 {
    let mut board_copy = board.0;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}
