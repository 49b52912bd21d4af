//! Fixed timestep simulation tick
//!
//! Advances the shot state machine one step: aiming tracks the pointer,
//! flight integrates in substeps short enough that a projectile can never
//! tunnel through a token, and landings resolve into grid placement, match
//! detection, scoring and row growth.

use glam::Vec2;

use super::state::{PointerSample, ShotState, SimEvent, SimulationState};
use super::{matching, scoring};
use crate::clamp_to_radius;
use crate::consts::*;
use crate::palette::TokenColor;

/// Input for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    pub pointer: PointerSample,
    /// While locked, aiming is force-returned to the anchor and no new
    /// shot can start (skip confirmation pending, or advisor "thinking")
    pub input_locked: bool,
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimulationState, input: &TickInput, dt: f32) -> Vec<SimEvent> {
    let mut events = Vec::new();
    state.time_ticks += 1;

    match state.shot {
        ShotState::Idle => {
            if !input.input_locked {
                if let Some(pos) = input.pinching_at() {
                    state.shot = ShotState::Aiming {
                        pos: clamp_to_radius(pos, state.anchor, MAX_DRAG),
                    };
                }
            }
        }
        ShotState::Aiming { pos } => {
            if input.input_locked {
                // Snap back to the anchor without firing
                state.shot = ShotState::Idle;
            } else if let Some(p) = input.pinching_at() {
                state.shot = ShotState::Aiming {
                    pos: clamp_to_radius(p, state.anchor, MAX_DRAG),
                };
            } else {
                release(state, pos, &mut events);
            }
        }
        ShotState::Flying {
            pos,
            vel,
            color,
            launch_tick,
        } => fly(state, pos, vel, color, launch_tick, dt, &mut events),
        ShotState::Resolving { pos, color } => resolve_landing(state, pos, color, &mut events),
    }

    events
}

impl TickInput {
    /// Pointer position while actively pinching, if any
    fn pinching_at(&self) -> Option<Vec2> {
        if self.pointer.pinching {
            self.pointer.position
        } else {
            None
        }
    }
}

/// Pointer released while aiming: launch above the minimum stretch,
/// otherwise snap back to the anchor.
fn release(state: &mut SimulationState, pos: Vec2, events: &mut Vec<SimEvent>) {
    let stretch = pos.distance(state.anchor);
    if stretch < MIN_LAUNCH_STRETCH {
        state.shot = ShotState::Idle;
        return;
    }

    // Quadratic drag curve: short pulls are disproportionately weak
    let t = (stretch / MAX_DRAG).clamp(0.0, 1.0);
    let speed_factor = MIN_SPEED_MULT + (MAX_SPEED_MULT - MIN_SPEED_MULT) * t * t;
    let dir = (state.anchor - pos).normalize_or_zero();
    if dir == Vec2::ZERO {
        state.shot = ShotState::Idle;
        return;
    }

    let color = state.selected_color;
    state.launch_target = state.advisory_target;
    state.shots_fired += 1;
    // Anything still animating out from the previous shot is gone now
    state.grid.sweep_inactive();
    state.shot = ShotState::Flying {
        pos,
        vel: dir * LAUNCH_SPEED * speed_factor,
        color,
        launch_tick: state.time_ticks,
    };
    log::debug!(
        "shot {} launched, color {}, stretch {stretch:.1}",
        state.shots_fired,
        color.as_str()
    );
    events.push(SimEvent::ShotLaunched { color });
}

/// Integrate one tick of flight in fixed-length substeps
fn fly(
    state: &mut SimulationState,
    mut pos: Vec2,
    mut vel: Vec2,
    color: TokenColor,
    launch_tick: u64,
    dt: f32,
    events: &mut Vec<SimEvent>,
) {
    if state.secs_since(launch_tick) > FLIGHT_TIMEOUT_SECS {
        log::debug!("flight timed out, treating as miss");
        state.shot = ShotState::Idle;
        state.launch_target = None;
        events.push(SimEvent::ShotMissed);
        return;
    }

    let width = state.grid.viewport_width();
    let travel = vel.length() * dt;
    let substeps = (travel / FLIGHT_STEP).ceil().max(1.0) as u32;
    let step_len = travel / substeps as f32;

    for _ in 0..substeps {
        pos += vel.normalize_or_zero() * step_len;

        // Elastic wall bounce: mirror the position, invert horizontal speed
        if pos.x < TOKEN_RADIUS {
            pos.x = 2.0 * TOKEN_RADIUS - pos.x;
            vel.x = -vel.x;
        } else if pos.x > width - TOKEN_RADIUS {
            pos.x = 2.0 * (width - TOKEN_RADIUS) - pos.x;
            vel.x = -vel.x;
        }

        // Topmost playable boundary
        if pos.y <= TOKEN_RADIUS {
            state.shot = ShotState::Resolving { pos, color };
            return;
        }

        // Proximity to any active token declares the collision
        if state
            .grid
            .active_tokens()
            .any(|t| t.pos.distance(pos) < COLLISION_RADIUS)
        {
            state.shot = ShotState::Resolving { pos, color };
            return;
        }
    }

    state.shot = ShotState::Flying {
        pos,
        vel,
        color,
        launch_tick,
    };
}

/// Fold a landed projectile into the grid: snap to the nearest free cell,
/// run match detection, grade accuracy, apply score, then grow rows if the
/// shot interval came up.
fn resolve_landing(
    state: &mut SimulationState,
    pos: Vec2,
    color: TokenColor,
    events: &mut Vec<SimEvent>,
) {
    let Some((id, cell)) = state.grid.place_near(pos, color) else {
        log::warn!("no free cell for landing at {pos}, treating as miss");
        state.shot = ShotState::Idle;
        state.launch_target = None;
        events.push(SimEvent::ShotMissed);
        return;
    };
    let landing_pos = state.grid.token(id).map(|t| t.pos).unwrap_or(pos);

    let outcome = matching::resolve_match(&mut state.grid, id);
    let (bonus, accuracy) = scoring::accuracy_bonus(landing_pos, state.launch_target);

    let mut score_delta = 0;
    if outcome.triggered {
        score_delta = scoring::match_points(
            outcome.removed.len(),
            color.point_value(),
            state.config.score_multiplier,
            bonus,
        );
        state.score += score_delta;
    }

    events.push(SimEvent::ShotResolved {
        landing: cell,
        landing_pos,
        score_delta,
        accuracy,
        matched_count: outcome.removed.len(),
    });

    state.shot = ShotState::Idle;
    state.launch_target = None;
    state.reload_ammo();

    let interval = state.config.new_row_interval_shots;
    if interval > 0 && state.shots_fired % interval == 0 {
        let overflow = state.grid.shift_rows_down();
        state.grid.spawn_row(&mut state.rng);
        events.push(SimEvent::RowAdded);
        if overflow {
            log::info!("grid overflow after row growth");
            events.push(SimEvent::GridOverflow);
        }
    }
}
