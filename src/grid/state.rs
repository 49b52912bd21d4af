//! Live token grid
//!
//! Owns every placed token. Occupancy is kept in a cell-keyed index so
//! neighbor and flood-fill queries never rescan the whole collection.
//! Tokens are deactivated rather than removed so the presentation layer can
//! animate them out; the engine itself treats inactive tokens as absent.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::topology::{self, Cell};
use crate::consts::*;
use crate::palette::TokenColor;

/// A placed token. Created by row growth or landing resolution, deactivated
/// only by match resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: u32,
    pub cell: Cell,
    pub pos: Vec2,
    pub color: TokenColor,
    pub active: bool,
}

/// Rejected insert into an already occupied cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertError {
    pub cell: Cell,
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cell ({}, {}) is already occupied",
            self.cell.row, self.cell.col
        )
    }
}

impl std::error::Error for InsertError {}

/// The live collection of placed tokens
#[derive(Debug, Clone, Serialize)]
pub struct GridState {
    viewport_width: f32,
    /// All tokens, sorted by id (ids are allocated monotonically)
    tokens: Vec<Token>,
    /// Cell -> token id, active tokens only
    #[serde(skip)]
    index: HashMap<Cell, u32>,
    next_id: u32,
}

impl GridState {
    pub fn new(viewport_width: f32) -> Self {
        Self {
            viewport_width,
            tokens: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Cells currently holding an active token
    pub fn occupied_cells(&self) -> HashSet<Cell> {
        self.index.keys().copied().collect()
    }

    /// Insert a new token at `cell`. Rejects occupied cells; a correct
    /// caller never hits that path because free-cell snapping excludes them.
    pub fn insert(&mut self, cell: Cell, color: TokenColor) -> Result<u32, InsertError> {
        if !topology::is_valid_cell(cell) || self.index.contains_key(&cell) {
            return Err(InsertError { cell });
        }
        let id = self.alloc_id();
        self.tokens.push(Token {
            id,
            cell,
            pos: topology::cell_to_pixel(cell, self.viewport_width),
            color,
            active: true,
        });
        self.index.insert(cell, id);
        Ok(id)
    }

    /// Snap a pixel position to the nearest free cell and insert there.
    /// If the insert is somehow rejected the cell is excluded and the next
    /// nearest free cell is tried instead of crashing. Returns `None` only
    /// when the whole snap area is full.
    pub fn place_near(&mut self, pos: Vec2, color: TokenColor) -> Option<(u32, Cell)> {
        let mut excluded = self.occupied_cells();
        loop {
            let cell = topology::nearest_free_cell(pos, self.viewport_width, &excluded)?;
            match self.insert(cell, color) {
                Ok(id) => return Some((id, cell)),
                Err(err) => {
                    log::warn!("insert rejected at {:?}, retrying next nearest", err.cell);
                    let _ = excluded.insert(err.cell);
                }
            }
        }
    }

    pub fn token(&self, id: u32) -> Option<&Token> {
        self.tokens
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &self.tokens[i])
    }

    fn token_mut(&mut self, id: u32) -> Option<&mut Token> {
        self.tokens
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &mut self.tokens[i])
    }

    /// Active token at `cell`, if any
    pub fn token_at(&self, cell: Cell) -> Option<&Token> {
        self.index.get(&cell).and_then(|&id| self.token(id))
    }

    /// All active tokens in id order
    pub fn active_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.active)
    }

    pub fn active_count(&self) -> usize {
        self.index.len()
    }

    /// Ids of active tokens adjacent to the given token
    pub fn neighbors_of(&self, id: u32) -> Vec<u32> {
        let Some(token) = self.token(id) else {
            return Vec::new();
        };
        topology::neighbor_cells(token.cell)
            .into_iter()
            .filter_map(|cell| self.index.get(&cell).copied())
            .collect()
    }

    /// Mark a token as removed. Its cell becomes free immediately.
    pub fn deactivate(&mut self, id: u32) {
        if let Some(token) = self.token_mut(id) {
            if token.active {
                token.active = false;
                let cell = token.cell;
                self.index.remove(&cell);
            }
        }
    }

    /// Row index of the lowest active token, if any
    pub fn max_occupied_row(&self) -> Option<usize> {
        self.index.keys().map(|c| c.row).max()
    }

    /// Drop inactive tokens once the presentation layer is done with them
    pub fn sweep_inactive(&mut self) {
        self.tokens.retain(|t| t.active);
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for t in &self.tokens {
            if t.active && topology::is_valid_cell(t.cell) {
                self.index.insert(t.cell, t.id);
            }
        }
    }

    /// Shift every token down one row (row growth). Tokens whose column
    /// does not exist in the narrower target row are re-homed to the
    /// nearest free cell. Returns `true` when any active token ends up at
    /// or past the playfield ceiling - the terminal overflow condition.
    pub fn shift_rows_down(&mut self) -> bool {
        let mut displaced: Vec<u32> = Vec::new();
        for t in &mut self.tokens {
            if !t.active {
                continue;
            }
            t.cell.row += 1;
            if topology::is_valid_cell(t.cell) {
                t.pos = topology::cell_to_pixel(t.cell, self.viewport_width);
            } else {
                displaced.push(t.id);
            }
        }
        self.rebuild_index();

        for id in displaced {
            let Some(row) = self.token(id).map(|t| t.cell.row) else {
                continue;
            };
            let edge = Cell::new(row, topology::cols_in_row(row) - 1);
            let ideal = topology::cell_to_pixel(edge, self.viewport_width);
            let occupied = self.occupied_cells();
            match topology::nearest_free_cell(ideal, self.viewport_width, &occupied) {
                Some(cell) => {
                    self.index.insert(cell, id);
                    let vw = self.viewport_width;
                    if let Some(t) = self.token_mut(id) {
                        t.cell = cell;
                        t.pos = topology::cell_to_pixel(cell, vw);
                    }
                }
                None => {
                    log::warn!("no free cell for displaced token {id}, dropping it");
                    if let Some(t) = self.token_mut(id) {
                        t.active = false;
                    }
                }
            }
        }

        self.tokens
            .iter()
            .any(|t| t.active && t.cell.row >= PLAYFIELD_ROWS)
    }

    /// Fill the (vacated) top row with uniformly random palette colors
    pub fn spawn_row(&mut self, rng: &mut Pcg32) {
        for col in 0..topology::cols_in_row(0) {
            let color = TokenColor::ALL[rng.random_range(0..TokenColor::ALL.len())];
            if let Err(err) = self.insert(Cell::new(0, col), color) {
                log::warn!("spawn_row skipped occupied cell: {err}");
            }
        }
    }
}
