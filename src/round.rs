//! Round lifecycle orchestration
//!
//! Owns the simulation state and the advisor controller, drives both from
//! a single per-frame tick, and exposes the small API the presentation
//! layer needs: score, aim target, input lock, skip confirmation, events.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::advisor::{AdvisorClient, AdvisorController, Advisory};
use crate::palette::TokenColor;
use crate::sim::scoring::AccuracyTier;
use crate::sim::state::{PointerSample, RoundConfig, ShotState, SimEvent, SimulationState};
use crate::sim::tick::{self, TickInput};

/// Round difficulty, keyed into a fixed config table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn config(&self) -> RoundConfig {
        match self {
            Difficulty::Easy => RoundConfig {
                starting_rows: 3,
                new_row_interval_shots: 8,
                score_multiplier: 1.0,
            },
            Difficulty::Normal => RoundConfig {
                starting_rows: 4,
                new_row_interval_shots: 6,
                score_multiplier: 1.5,
            },
            Difficulty::Hard => RoundConfig {
                starting_rows: 5,
                new_row_interval_shots: 4,
                score_multiplier: 2.0,
            },
        }
    }
}

/// Events surfaced to the presentation layer, drained once per frame
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    ShotLaunched {
        color: TokenColor,
    },
    ShotResolved {
        score_delta: u64,
        accuracy: Option<AccuracyTier>,
        matched_count: usize,
    },
    ShotMissed,
    RowAdded,
    /// Terminal: row growth pushed the board past the ceiling
    GridOverflow,
    /// A new advisory (remote or fallback) replaced the active one
    AdvisoryUpdated,
    /// The advisor suggested skipping; a confirmation should be raised
    SkipSuggested,
}

/// Orchestrates shot lifecycle, difficulty-driven row growth, and the
/// advisory loop for one round at a time.
pub struct RoundController {
    /// Live simulation state; rendering reads it directly
    pub sim: SimulationState,
    advisor: AdvisorController,
    viewport_width: f32,
    base_seed: u64,
    /// Round generation; tags advisor requests for the staleness check
    epoch: u64,
    /// Latest encoded board image from the presentation layer
    snapshot: Vec<u8>,
    pending_skip: bool,
    /// Round-start analysis window; gates input until the first advisory
    thinking: bool,
    cycle_wanted: bool,
    over: bool,
    events: Vec<RoundEvent>,
}

impl RoundController {
    /// The controller starts idle; call [`start_round`](Self::start_round)
    /// to begin play.
    pub fn new(seed: u64, viewport_width: f32, client: Box<dyn AdvisorClient>) -> Self {
        Self {
            sim: SimulationState::new(seed, viewport_width, Difficulty::default().config()),
            advisor: AdvisorController::new(client),
            viewport_width,
            base_seed: seed,
            epoch: 0,
            snapshot: Vec::new(),
            pending_skip: false,
            thinking: false,
            cycle_wanted: false,
            over: true,
            events: Vec::new(),
        }
    }

    /// Begin a fresh round. Bumps the epoch so any response still in
    /// flight from the previous round gets dropped on arrival.
    pub fn start_round(&mut self, difficulty: Difficulty) {
        self.epoch += 1;
        let seed = self.base_seed.wrapping_add(self.epoch);
        self.sim = SimulationState::new(seed, self.viewport_width, difficulty.config());
        self.advisor.reset();
        self.pending_skip = false;
        self.thinking = true;
        self.cycle_wanted = true;
        self.over = false;
        self.events.clear();
        log::info!("round started: {difficulty:?} (epoch {})", self.epoch);
    }

    /// Advance one frame: fold in any arrived advisory, tick the
    /// simulation with the current pointer sample, then issue a new
    /// advisory request if one is wanted and none is outstanding.
    pub fn tick(&mut self, pointer: PointerSample, dt: f32) {
        if self.over {
            return;
        }

        // Apply an arrived advisory before the simulation reads it; the
        // target swap is a single assignment, never a partial update
        let mut arrived: Option<(Option<Vec2>, bool)> = None;
        if let Some(advisory) = self.advisor.poll(self.epoch, self.viewport_width) {
            arrived = Some((advisory.aim_point, advisory.suggest_skip));
        }
        if let Some((aim_point, suggest_skip)) = arrived {
            self.sim.advisory_target = aim_point;
            self.thinking = false;
            self.events.push(RoundEvent::AdvisoryUpdated);
            if suggest_skip {
                self.pending_skip = true;
                self.events.push(RoundEvent::SkipSuggested);
            }
        }

        let input = TickInput {
            pointer,
            input_locked: self.is_input_locked(),
        };
        for event in tick::tick(&mut self.sim, &input, dt) {
            match event {
                SimEvent::ShotLaunched { color } => {
                    self.events.push(RoundEvent::ShotLaunched { color });
                }
                SimEvent::ShotResolved {
                    score_delta,
                    accuracy,
                    matched_count,
                    ..
                } => {
                    self.events.push(RoundEvent::ShotResolved {
                        score_delta,
                        accuracy,
                        matched_count,
                    });
                    self.cycle_wanted = true;
                }
                SimEvent::ShotMissed => {
                    self.events.push(RoundEvent::ShotMissed);
                    self.cycle_wanted = true;
                }
                SimEvent::RowAdded => self.events.push(RoundEvent::RowAdded),
                SimEvent::GridOverflow => {
                    log::info!("round lost: grid overflow at score {}", self.sim.score);
                    self.events.push(RoundEvent::GridOverflow);
                    self.over = true;
                }
            }
        }

        if self.advisor.take_queued() {
            self.cycle_wanted = true;
        }
        if self.cycle_wanted && !self.over {
            // Queues internally if a request is still outstanding
            let _ = self.advisor.request_cycle(
                &self.sim.grid,
                self.sim.anchor,
                self.snapshot.clone(),
                self.epoch,
            );
            self.cycle_wanted = false;
        }
    }

    pub fn current_score(&self) -> u64 {
        self.sim.score
    }

    /// The active advisory aim point, if any
    pub fn current_aim_target(&self) -> Option<Vec2> {
        self.sim.advisory_target
    }

    /// Input is ignored (and aiming force-released) while a skip
    /// confirmation is pending or the round-start analysis is running
    pub fn is_input_locked(&self) -> bool {
        self.pending_skip || self.thinking
    }

    /// Accept the advisor's skip suggestion: discard the current ammo
    /// color and ask for a fresh analysis.
    pub fn confirm_skip(&mut self) {
        if !self.pending_skip {
            return;
        }
        self.pending_skip = false;
        self.sim.reload_ammo();
        self.cycle_wanted = true;
        log::debug!("skip confirmed, new ammo {}", self.sim.selected_color.as_str());
    }

    /// Decline the skip suggestion and keep playing as-is
    pub fn cancel_skip(&mut self) {
        self.pending_skip = false;
    }

    /// Latest rendered board image, attached to the next advisor request
    pub fn set_board_snapshot(&mut self, bytes: Vec<u8>) {
        self.snapshot = bytes;
    }

    pub fn selected_color(&self) -> TokenColor {
        self.sim.selected_color
    }

    pub fn shot_state(&self) -> ShotState {
        self.sim.shot
    }

    /// The full normalized advisory, for on-screen messaging
    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisor.current()
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Take all events accumulated since the last drain
    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::advisor::{AdvisorError, AdvisorRequest};
    use crate::consts::*;
    use crate::grid::{Cell, cell_to_pixel};

    const W: f32 = 560.0;

    #[derive(Default)]
    struct StubState {
        submitted: Vec<AdvisorRequest>,
        responses: VecDeque<Result<String, AdvisorError>>,
    }

    #[derive(Clone)]
    struct StubClient(Rc<RefCell<StubState>>);

    impl StubClient {
        fn new() -> Self {
            Self(Rc::new(RefCell::new(StubState::default())))
        }

        fn respond(&self, response: Result<String, AdvisorError>) {
            self.0.borrow_mut().responses.push_back(response);
        }

        fn submitted_count(&self) -> usize {
            self.0.borrow().submitted.len()
        }
    }

    impl AdvisorClient for StubClient {
        fn submit(&mut self, request: AdvisorRequest) {
            self.0.borrow_mut().submitted.push(request);
        }

        fn poll(&mut self) -> Option<Result<String, AdvisorError>> {
            self.0.borrow_mut().responses.pop_front()
        }
    }

    fn controller() -> (RoundController, StubClient) {
        let stub = StubClient::new();
        let c = RoundController::new(42, W, Box::new(stub.clone()));
        (c, stub)
    }

    fn idle_tick(c: &mut RoundController) {
        c.tick(PointerSample::default(), SIM_DT);
    }

    #[test]
    fn test_round_start_requests_analysis_and_locks_input() {
        let (mut c, stub) = controller();
        assert!(c.is_over());

        c.start_round(Difficulty::Easy);
        assert!(!c.is_over());
        assert!(c.is_input_locked(), "thinking until the first advisory");

        idle_tick(&mut c);
        assert_eq!(stub.submitted_count(), 1);

        stub.respond(Ok(r#"{"message":"warm up"}"#.to_string()));
        idle_tick(&mut c);
        assert!(!c.is_input_locked());
        assert!(c.drain_events().contains(&RoundEvent::AdvisoryUpdated));
    }

    #[test]
    fn test_advisory_target_applied_without_touching_ammo() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);
        let ammo = c.selected_color();

        stub.respond(Ok(r#"{"message":"aim","targetRow":4,"targetCol":2}"#.to_string()));
        idle_tick(&mut c);

        assert_eq!(c.current_aim_target(), Some(cell_to_pixel(Cell::new(4, 2), W)));
        assert_eq!(c.selected_color(), ammo);
    }

    #[test]
    fn test_resolution_triggers_next_cycle() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);
        stub.respond(Ok(r#"{"message":"go"}"#.to_string()));
        idle_tick(&mut c);
        assert_eq!(stub.submitted_count(), 1);

        // Force a landing next tick
        c.sim.shot = ShotState::Resolving {
            pos: cell_to_pixel(Cell::new(6, 6), W),
            color: TokenColor::Red,
        };
        idle_tick(&mut c);
        assert!(
            c.drain_events()
                .iter()
                .any(|e| matches!(e, RoundEvent::ShotResolved { .. }))
        );
        assert_eq!(stub.submitted_count(), 2);
    }

    #[test]
    fn test_no_overlapping_requests_while_one_outstanding() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);
        assert_eq!(stub.submitted_count(), 1);

        // Two resolutions while the first request is still pending
        for _ in 0..2 {
            c.sim.shot = ShotState::Resolving {
                pos: cell_to_pixel(Cell::new(8, 6), W),
                color: TokenColor::Red,
            };
            idle_tick(&mut c);
        }
        assert_eq!(stub.submitted_count(), 1, "request must be queued, not issued");

        // Once the response lands, exactly one queued request goes out
        stub.respond(Ok(r#"{"message":"ok"}"#.to_string()));
        idle_tick(&mut c);
        assert_eq!(stub.submitted_count(), 2);
    }

    #[test]
    fn test_skip_suggestion_gates_input_until_confirmed() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);

        stub.respond(Ok(r#"{"message":"bad board","suggestSkip":true}"#.to_string()));
        idle_tick(&mut c);
        assert!(c.drain_events().contains(&RoundEvent::SkipSuggested));
        assert!(c.is_input_locked());

        // Aiming input is ignored while the confirmation is pending
        let pinch = PointerSample {
            position: Some(c.sim.anchor + Vec2::new(0.0, 100.0)),
            pinching: true,
        };
        c.tick(pinch, SIM_DT);
        assert_eq!(c.shot_state(), ShotState::Idle);

        c.confirm_skip();
        assert!(!c.is_input_locked());
        idle_tick(&mut c);
        assert_eq!(stub.submitted_count(), 2, "skip confirmation requests a fresh cycle");
    }

    #[test]
    fn test_cancel_skip_just_unlocks() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);
        stub.respond(Ok(r#"{"message":"","suggestSkip":true}"#.to_string()));
        idle_tick(&mut c);
        assert!(c.is_input_locked());

        let ammo = c.selected_color();
        c.cancel_skip();
        assert!(!c.is_input_locked());
        assert_eq!(c.selected_color(), ammo);
    }

    #[test]
    fn test_stale_response_from_previous_round_is_dropped() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);

        // Round restarts while the request is still in flight
        c.start_round(Difficulty::Hard);
        stub.respond(Ok(r#"{"message":"late","targetRow":2,"targetCol":2}"#.to_string()));
        idle_tick(&mut c);

        assert_eq!(c.current_aim_target(), None);
        assert!(!c.drain_events().contains(&RoundEvent::AdvisoryUpdated));
    }

    #[test]
    fn test_grid_overflow_ends_round() {
        let (mut c, _stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);

        c.sim.config.new_row_interval_shots = 1;
        c.sim.shots_fired = 1;
        c.sim
            .grid
            .insert(Cell::new(PLAYFIELD_ROWS - 1, 0), TokenColor::Blue)
            .unwrap();
        c.sim.shot = ShotState::Resolving {
            pos: cell_to_pixel(Cell::new(8, 6), W),
            color: TokenColor::Red,
        };
        idle_tick(&mut c);

        assert!(c.drain_events().contains(&RoundEvent::GridOverflow));
        assert!(c.is_over());

        // Ticks after the loss are inert
        let ticks_before = c.sim.time_ticks;
        idle_tick(&mut c);
        assert_eq!(c.sim.time_ticks, ticks_before);
    }

    #[test]
    fn test_score_is_monotone_across_resolutions() {
        let (mut c, stub) = controller();
        c.start_round(Difficulty::Easy);
        idle_tick(&mut c);
        stub.respond(Ok(r#"{"message":"go"}"#.to_string()));
        idle_tick(&mut c);

        let mut last = c.current_score();
        for _ in 0..5 {
            c.sim.shot = ShotState::Resolving {
                pos: cell_to_pixel(Cell::new(8, 6), W),
                color: TokenColor::Red,
            };
            idle_tick(&mut c);
            assert!(c.current_score() >= last);
            last = c.current_score();
        }
    }
}
