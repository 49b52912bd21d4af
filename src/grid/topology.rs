//! Hex-offset grid topology
//!
//! Pure coordinate math, no state. Even rows hold `GRID_COLS` tokens, odd
//! rows one fewer, giving the staggered hex layout. Every function here is
//! deterministic given the viewport width, which the tests rely on.

use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// A grid cell address. Row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Number of columns in a row (even rows are full width)
#[inline]
pub fn cols_in_row(row: usize) -> usize {
    if row % 2 == 0 { GRID_COLS } else { GRID_COLS - 1 }
}

/// Whether the address exists in the staggered layout
#[inline]
pub fn is_valid_cell(cell: Cell) -> bool {
    cell.col < cols_in_row(cell.row)
}

/// Center pixel of a cell. Each row's pattern is centered horizontally, so
/// odd rows sit half a token to the right of even rows.
pub fn cell_to_pixel(cell: Cell, viewport_width: f32) -> Vec2 {
    let row_width = cols_in_row(cell.row) as f32 * TOKEN_RADIUS * 2.0;
    let left = (viewport_width - row_width) / 2.0;
    Vec2::new(
        left + TOKEN_RADIUS + cell.col as f32 * TOKEN_RADIUS * 2.0,
        TOKEN_RADIUS + cell.row as f32 * ROW_HEIGHT,
    )
}

/// The fixed projectile launch origin, centered below the playfield
pub fn anchor_pos(viewport_width: f32) -> Vec2 {
    Vec2::new(
        viewport_width / 2.0,
        TOKEN_RADIUS + PLAYFIELD_ROWS as f32 * ROW_HEIGHT + TOKEN_RADIUS * 3.0,
    )
}

/// Offset-hex adjacency. Same row: adjacent columns. Adjacent rows: the
/// column offset is keyed on the lower-index row's parity (odd row below
/// even row shifts the opposite way), matching the staggered pixel layout.
pub fn are_neighbors(a: Cell, b: Cell) -> bool {
    let dr = (a.row as i64 - b.row as i64).abs();
    if dr > 1 {
        return false;
    }
    if dr == 0 {
        return (a.col as i64 - b.col as i64).abs() == 1;
    }
    let (lo, hi) = if a.row < b.row { (a, b) } else { (b, a) };
    let d = hi.col as i64 - lo.col as i64;
    if lo.row % 2 == 1 {
        d == 0 || d == 1
    } else {
        d == -1 || d == 0
    }
}

/// All valid cells adjacent to `cell`, in (row, col) order
pub fn neighbor_cells(cell: Cell) -> Vec<Cell> {
    let r = cell.row as i64;
    let c = cell.col as i64;
    let mut out = Vec::with_capacity(6);

    for rr in [r - 1, r, r + 1] {
        if rr < 0 {
            continue;
        }
        let cols: [i64; 2] = if rr == r {
            [c - 1, c + 1]
        } else if r.min(rr) % 2 == 1 {
            // Lower row is odd: the wider row above/below shifts left
            if rr > r { [c, c + 1] } else { [c - 1, c] }
        } else if rr > r {
            [c - 1, c]
        } else {
            [c, c + 1]
        };
        for cc in cols {
            if cc < 0 {
                continue;
            }
            let cand = Cell::new(rr as usize, cc as usize);
            if is_valid_cell(cand) {
                out.push(cand);
            }
        }
    }

    out
}

/// Closest unoccupied cell to `pos`, scanning row-major up to the snap
/// ceiling. Ties go to the first cell in enumeration order, which keeps
/// landing resolution reproducible.
pub fn nearest_free_cell(
    pos: Vec2,
    viewport_width: f32,
    occupied: &HashSet<Cell>,
) -> Option<Cell> {
    let mut best: Option<(Cell, f32)> = None;
    for row in 0..SNAP_ROW_CEILING {
        for col in 0..cols_in_row(row) {
            let cell = Cell::new(row, col);
            if occupied.contains(&cell) {
                continue;
            }
            let d = cell_to_pixel(cell, viewport_width).distance_squared(pos);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((cell, d));
            }
        }
    }
    best.map(|(cell, _)| cell)
}
