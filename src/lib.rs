//! Hexpop - a hex-grid cluster-shooter simulation and decision engine
//!
//! Core modules:
//! - `grid`: Hex-offset topology and the live token grid
//! - `sim`: Deterministic simulation (aiming, flight, matching, scoring)
//! - `advisor`: Strategic-advisor protocol, normalization, local fallback
//! - `round`: Round lifecycle orchestration and the presentation-facing API
//!
//! Rendering, audio, and gesture capture live outside this crate; the engine
//! consumes a per-tick pointer sample and emits events for the presentation
//! layer to animate.

pub mod advisor;
pub mod grid;
pub mod palette;
pub mod round;
pub mod sim;

pub use advisor::{AdvisorClient, AdvisorError, AdvisorRequest, Advisory};
pub use palette::TokenColor;
pub use round::{Difficulty, RoundController, RoundEvent};
pub use sim::{PointerSample, ShotState, SimulationState};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz tick, display-synchronized)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Token radius in pixels; the pitch of the whole grid derives from it
    pub const TOKEN_RADIUS: f32 = 20.0;
    /// Vertical distance between row centers (radius * sqrt(3))
    pub const ROW_HEIGHT: f32 = TOKEN_RADIUS * 1.732_050_8;

    /// Columns in even rows; odd rows have one fewer (staggered layout)
    pub const GRID_COLS: usize = 14;
    /// Rows scanned when snapping a landing position to a free cell
    pub const SNAP_ROW_CEILING: usize = 18;
    /// A token shifted to or past this row ends the round
    pub const PLAYFIELD_ROWS: usize = 14;

    /// Distance below which a flying or sampled point touches a token
    pub const COLLISION_RADIUS: f32 = TOKEN_RADIUS * 1.8;
    /// Flight integration substep length (prevents tunneling)
    pub const FLIGHT_STEP: f32 = TOKEN_RADIUS * 0.8;
    /// Sampling step for the line-of-sight clearance test
    pub const PATH_SAMPLE_STEP: f32 = TOKEN_RADIUS * 0.5;
    /// Samples skipped at both ends of the clearance segment
    pub const PATH_ENDPOINT_SKIP: usize = 2;

    /// Maximum drag distance from the anchor while aiming
    pub const MAX_DRAG: f32 = 150.0;
    /// Releases below this stretch snap back instead of launching
    pub const MIN_LAUNCH_STRETCH: f32 = 25.0;
    /// Launch speed at full drag (pixels per second)
    pub const LAUNCH_SPEED: f32 = 900.0;
    /// Speed multiplier range for the quadratic drag curve
    pub const MIN_SPEED_MULT: f32 = 0.35;
    pub const MAX_SPEED_MULT: f32 = 1.0;
    /// Flights longer than this are aborted as a miss
    pub const FLIGHT_TIMEOUT_SECS: f32 = 5.0;

    /// Minimum connected same-color group size that pops
    pub const MATCH_MIN_SIZE: usize = 3;
    /// Multiplier applied to matches strictly larger than the minimum
    pub const BIG_MATCH_BONUS: f32 = 1.5;

    /// Accuracy tier boundaries (distance to the advisory aim point)
    pub const ACCURACY_CRITICAL_DIST: f32 = TOKEN_RADIUS;
    pub const ACCURACY_GREAT_DIST: f32 = TOKEN_RADIUS * 2.5;

    /// Rows at or past this mark the board as critical for the advisor
    pub const DANGER_ROW: usize = PLAYFIELD_ROWS - 3;
}

/// Clamp `pos` to within `max_dist` of `center` (preserves direction)
#[inline]
pub fn clamp_to_radius(pos: Vec2, center: Vec2, max_dist: f32) -> Vec2 {
    let offset = pos - center;
    let dist = offset.length();
    if dist > max_dist {
        center + offset * (max_dist / dist)
    } else {
        pos
    }
}
