//! Simulation state and core types
//!
//! All per-round mutable state lives in [`SimulationState`], owned by the
//! round controller and passed into the tick function - no process-wide
//! singletons.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::grid::{self, Cell, GridState};
use crate::palette::TokenColor;
use crate::sim::scoring::AccuracyTier;

/// One pointer sample per tick from the external gesture tracker.
/// A `None` position means no hand was detected, treated as released.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSample {
    pub position: Option<Vec2>,
    pub pinching: bool,
}

/// Shot lifecycle as an explicit state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShotState {
    /// Ammo waiting at the anchor
    Idle,
    /// Pointer pinched and dragging; position clamped to the drag ceiling
    Aiming { pos: Vec2 },
    /// Projectile in flight. Color was fixed at launch.
    Flying {
        pos: Vec2,
        vel: Vec2,
        color: TokenColor,
        launch_tick: u64,
    },
    /// Collision declared; the landing folds into the grid next tick
    Resolving { pos: Vec2, color: TokenColor },
}

/// Difficulty parameters, immutable for the duration of a round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub starting_rows: usize,
    /// A new top row grows every this many resolved shots
    pub new_row_interval_shots: u32,
    pub score_multiplier: f32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            starting_rows: 3,
            new_row_interval_shots: 8,
            score_multiplier: 1.0,
        }
    }
}

/// Events emitted by the simulation tick, drained by the round controller
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    ShotLaunched {
        color: TokenColor,
    },
    /// A shot landed and was folded into the grid
    ShotResolved {
        landing: Cell,
        landing_pos: Vec2,
        score_delta: u64,
        accuracy: Option<AccuracyTier>,
        matched_count: usize,
    },
    /// Flight timed out (or the board was full); no token was placed
    ShotMissed,
    RowAdded,
    /// Row growth pushed a token past the playfield ceiling - round loss
    GridOverflow,
}

/// Complete simulation state (deterministic, snapshot-serializable)
#[derive(Debug, Clone, Serialize)]
pub struct SimulationState {
    /// Round seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    pub grid: GridState,
    pub config: RoundConfig,
    pub shot: ShotState,
    /// Fixed launch origin below the playfield
    pub anchor: Vec2,
    /// Color the next shot will carry
    pub selected_color: TokenColor,
    /// Aim point currently recommended by the advisor (or fallback)
    pub advisory_target: Option<Vec2>,
    /// Advisory target captured when the current shot launched
    pub launch_target: Option<Vec2>,
    pub score: u64,
    pub shots_fired: u32,
    pub time_ticks: u64,
}

impl SimulationState {
    /// Create a fresh round: seeded RNG, starting rows filled with random
    /// colors, ammo drawn, projectile idle at the anchor.
    pub fn new(seed: u64, viewport_width: f32, config: RoundConfig) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut grid = GridState::new(viewport_width);
        for row in 0..config.starting_rows {
            for col in 0..grid::cols_in_row(row) {
                let color = TokenColor::ALL[rng.random_range(0..TokenColor::ALL.len())];
                if let Err(err) = grid.insert(Cell::new(row, col), color) {
                    log::warn!("starting row fill skipped a cell: {err}");
                }
            }
        }
        let selected_color = TokenColor::ALL[rng.random_range(0..TokenColor::ALL.len())];

        Self {
            seed,
            rng,
            grid,
            config,
            shot: ShotState::Idle,
            anchor: grid::anchor_pos(viewport_width),
            selected_color,
            advisory_target: None,
            launch_target: None,
            score: 0,
            shots_fired: 0,
            time_ticks: 0,
        }
    }

    /// Draw a new ammo color for the next shot
    pub fn reload_ammo(&mut self) {
        self.selected_color = TokenColor::ALL[self.rng.random_range(0..TokenColor::ALL.len())];
    }

    /// Seconds elapsed since `tick` at the fixed timestep
    pub fn secs_since(&self, tick: u64) -> f32 {
        self.time_ticks.saturating_sub(tick) as f32 * crate::consts::SIM_DT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;

    #[test]
    fn test_new_round_fills_starting_rows() {
        let sim = SimulationState::new(1, 560.0, RoundConfig::default());
        let expected: usize = (0..3).map(grid::cols_in_row).sum();
        assert_eq!(sim.grid.active_count(), expected);
        assert_eq!(sim.shot, ShotState::Idle);
        assert_eq!(sim.score, 0);
    }

    #[test]
    fn test_same_seed_same_board() {
        let a = SimulationState::new(77, 560.0, RoundConfig::default());
        let b = SimulationState::new(77, 560.0, RoundConfig::default());
        for (ta, tb) in a.grid.active_tokens().zip(b.grid.active_tokens()) {
            assert_eq!(ta.cell, tb.cell);
            assert_eq!(ta.color, tb.color);
        }
        assert_eq!(a.selected_color, b.selected_color);
    }

    #[test]
    fn test_anchor_sits_below_playfield() {
        let sim = SimulationState::new(1, 560.0, RoundConfig::default());
        assert!(sim.anchor.y > TOKEN_RADIUS + (PLAYFIELD_ROWS - 1) as f32 * ROW_HEIGHT);
        assert_eq!(sim.anchor.x, 280.0);
    }
}
