//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by token ID)
//! - No rendering or platform dependencies

pub mod matching;
pub mod reach;
pub mod scoring;
pub mod state;
pub mod tick;

pub use matching::{MatchOutcome, resolve_match, same_color_cluster};
pub use reach::{ShotCandidate, enumerate_candidates, is_path_clear};
pub use scoring::{AccuracyTier, accuracy_bonus, match_points};
pub use state::{PointerSample, RoundConfig, ShotState, SimEvent, SimulationState};
pub use tick::{TickInput, tick};
