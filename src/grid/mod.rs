//! Hex-offset grid model
//!
//! `topology` is pure coordinate math (cell to pixel, snapping, adjacency);
//! `state` owns the live token collection built on top of it.

pub mod state;
pub mod topology;

pub use state::{GridState, InsertError, Token};
pub use topology::{
    Cell, anchor_pos, are_neighbors, cell_to_pixel, cols_in_row, is_valid_cell, nearest_free_cell,
    neighbor_cells,
};
