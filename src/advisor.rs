//! Strategic-advisor protocol
//!
//! The advisor is the one slow, external collaborator: each analysis cycle
//! packages the reachable clusters, a danger signal and a board snapshot,
//! and submits them through the non-blocking [`AdvisorClient`] transport.
//! Whatever comes back is normalized defensively - individual bad fields
//! are discarded, a wholly unusable response (or an unreachable advisor)
//! falls back to a deterministic local heuristic. Responses carry the round
//! epoch they were requested under and are dropped when stale.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::*;
use crate::grid::{self, Cell, GridState};
use crate::palette::TokenColor;
use crate::sim::reach::{self, ShotCandidate};

/// Board pressure signal sent with each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    Stable,
    Critical,
}

/// One advisory request to the external strategist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorRequest {
    /// Lossy-compressed board snapshot, supplied by the presentation layer
    pub image: Vec<u8>,
    pub candidates: Vec<ShotCandidate>,
    pub danger_level: DangerLevel,
}

/// Advisor call failure. Unreachable and malformed are handled identically
/// by the caller (local fallback); the split only helps logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisorError {
    Unreachable(String),
    Malformed(String),
}

impl std::fmt::Display for AdvisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisorError::Unreachable(msg) => write!(f, "advisor unreachable: {msg}"),
            AdvisorError::Malformed(msg) => write!(f, "advisor response malformed: {msg}"),
        }
    }
}

impl std::error::Error for AdvisorError {}

/// Non-blocking advisor transport. Implementations hand the request to
/// whatever does the actual I/O and report the raw response text through
/// `poll`; the engine never waits on them.
pub trait AdvisorClient {
    /// Begin a request. Must not block the simulation tick.
    fn submit(&mut self, request: AdvisorRequest);
    /// The completed response, once, when one is available.
    fn poll(&mut self) -> Option<Result<String, AdvisorError>>;
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisorySource {
    Remote,
    Fallback,
}

/// A normalized shot recommendation
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub message: String,
    pub rationale: Option<String>,
    /// Suggested ammo color; never changes the selected ammo by itself
    pub recommended_color: Option<TokenColor>,
    pub target_cell: Option<Cell>,
    /// Pixel aim point derived from the target cell
    pub aim_point: Option<Vec2>,
    pub suggest_skip: bool,
    pub source: AdvisorySource,
}

/// Danger signal from the lowest occupied row
pub fn danger_level(grid: &GridState) -> DangerLevel {
    match grid.max_occupied_row() {
        Some(row) if row >= DANGER_ROW => DangerLevel::Critical,
        _ => DangerLevel::Stable,
    }
}

/// Normalize a raw advisor response. Individually invalid fields are
/// discarded (logged) while the rest still apply; only an unparsable
/// payload is an error.
pub fn normalize_response(raw: &str, viewport_width: f32) -> Result<Advisory, AdvisorError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| AdvisorError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| AdvisorError::Malformed("not a JSON object".into()))?;

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let rationale = obj
        .get("rationale")
        .and_then(Value::as_str)
        .map(str::to_string);

    let recommended_color = match obj.get("recommendedColor").and_then(Value::as_str) {
        Some(name) => {
            let color = TokenColor::from_str(name);
            if color.is_none() {
                log::debug!("discarding out-of-palette color {name:?}");
            }
            color
        }
        None => None,
    };

    // The aim point applies only when both coordinates are present,
    // numeric, and name a playable cell
    let target_cell = match (
        obj.get("targetRow").and_then(Value::as_u64),
        obj.get("targetCol").and_then(Value::as_u64),
    ) {
        (Some(row), Some(col)) => {
            let cell = Cell::new(row as usize, col as usize);
            if grid::is_valid_cell(cell) && cell.row < PLAYFIELD_ROWS {
                Some(cell)
            } else {
                log::debug!("discarding off-grid target ({row}, {col})");
                None
            }
        }
        _ => None,
    };

    Ok(Advisory {
        message,
        rationale,
        recommended_color,
        aim_point: target_cell.map(|c| grid::cell_to_pixel(c, viewport_width)),
        target_cell,
        suggest_skip: obj
            .get("suggestSkip")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        source: AdvisorySource::Remote,
    })
}

/// Deterministic local recommendation: the candidate maximizing
/// `cluster_size * value_per_token`, ties broken by the smaller row
/// (prefer clusters closer to the top). No candidates means a generic
/// "no target" advisory with no aim point.
pub fn fallback_recommendation(
    candidates: &[ShotCandidate],
    viewport_width: f32,
) -> Advisory {
    let mut best: Option<&ShotCandidate> = None;
    for c in candidates {
        let score = c.cluster_size as u64 * c.value_per_token as u64;
        let better = match best {
            None => true,
            Some(b) => {
                let best_score = b.cluster_size as u64 * b.value_per_token as u64;
                score > best_score || (score == best_score && c.row < b.row)
            }
        };
        if better {
            best = Some(c);
        }
    }

    match best {
        Some(c) => {
            let cell = Cell::new(c.row, c.col);
            Advisory {
                message: format!(
                    "Go for the {} cluster of {}",
                    c.color.as_str(),
                    c.cluster_size
                ),
                rationale: None,
                recommended_color: Some(c.color),
                aim_point: Some(grid::cell_to_pixel(cell, viewport_width)),
                target_cell: Some(cell),
                suggest_skip: false,
                source: AdvisorySource::Fallback,
            }
        }
        None => Advisory {
            message: "No clear target right now".to_string(),
            rationale: None,
            recommended_color: None,
            aim_point: None,
            target_cell: None,
            suggest_skip: false,
            source: AdvisorySource::Fallback,
        },
    }
}

struct InFlightCycle {
    epoch: u64,
    /// Candidates the request was built from, kept for the fallback
    candidates: Vec<ShotCandidate>,
}

/// Orchestrates advisory cycles. At most one request is in flight; a cycle
/// wanted while one is outstanding is queued one deep and issued when the
/// outstanding response lands.
pub struct AdvisorController {
    client: Box<dyn AdvisorClient>,
    in_flight: Option<InFlightCycle>,
    queued: bool,
    current: Option<Advisory>,
}

impl AdvisorController {
    pub fn new(client: Box<dyn AdvisorClient>) -> Self {
        Self {
            client,
            in_flight: None,
            queued: false,
            current: None,
        }
    }

    /// The active advisory, if any
    pub fn current(&self) -> Option<&Advisory> {
        self.current.as_ref()
    }

    pub fn cycle_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Forget the active advisory (round restart). An outstanding request
    /// is not cancelled; its response will fail the epoch check instead.
    pub fn reset(&mut self) {
        self.current = None;
        self.queued = false;
    }

    /// Start an analysis cycle: enumerate candidates and submit a request
    /// tagged with `epoch`. Returns false (and queues) while another cycle
    /// is outstanding - overlapping requests are never issued.
    pub fn request_cycle(
        &mut self,
        grid: &GridState,
        anchor: Vec2,
        image: Vec<u8>,
        epoch: u64,
    ) -> bool {
        if self.in_flight.is_some() {
            log::debug!("advisory cycle already in flight, queueing");
            self.queued = true;
            return false;
        }

        let candidates = reach::enumerate_candidates(grid, anchor);
        log::debug!(
            "requesting advisory: {} candidates, danger {:?}",
            candidates.len(),
            danger_level(grid)
        );
        self.client.submit(AdvisorRequest {
            image,
            candidates: candidates.clone(),
            danger_level: danger_level(grid),
        });
        self.in_flight = Some(InFlightCycle { epoch, candidates });
        true
    }

    /// Poll the transport. When a response (or failure) lands, the new
    /// advisory replaces the current one in a single assignment; stale
    /// epochs are dropped. Returns the advisory applied this call, if any.
    pub fn poll(&mut self, current_epoch: u64, viewport_width: f32) -> Option<&Advisory> {
        let outcome = self.client.poll()?;
        let Some(cycle) = self.in_flight.take() else {
            log::warn!("advisor response with no cycle in flight, ignoring");
            return None;
        };

        if cycle.epoch != current_epoch {
            log::info!(
                "dropping stale advisory response (epoch {} != {})",
                cycle.epoch,
                current_epoch
            );
            return None;
        }

        let advisory = match outcome {
            Ok(raw) => match normalize_response(&raw, viewport_width) {
                Ok(advisory) => advisory,
                Err(err) => {
                    log::warn!("{err}; using local fallback");
                    fallback_recommendation(&cycle.candidates, viewport_width)
                }
            },
            Err(err) => {
                log::warn!("{err}; using local fallback");
                fallback_recommendation(&cycle.candidates, viewport_width)
            }
        };

        self.current = Some(advisory);
        self.current.as_ref()
    }

    /// Whether a queued cycle is waiting to be issued (and clear the flag)
    pub fn take_queued(&mut self) -> bool {
        std::mem::take(&mut self.queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

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

    fn candidate(size: usize, value: u32, row: usize) -> ShotCandidate {
        ShotCandidate {
            cell_id: 1,
            color: TokenColor::Red,
            cluster_size: size,
            row,
            col: 0,
            value_per_token: value,
        }
    }

    #[test]
    fn test_normalize_aim_point_without_color() {
        let advisory =
            normalize_response(r#"{"message":"shoot","targetRow":4,"targetCol":2}"#, W).unwrap();
        assert_eq!(advisory.target_cell, Some(Cell::new(4, 2)));
        assert_eq!(
            advisory.aim_point,
            Some(grid::cell_to_pixel(Cell::new(4, 2), W))
        );
        // No recommended color: ammo selection stays untouched
        assert_eq!(advisory.recommended_color, None);
        assert!(!advisory.suggest_skip);
    }

    #[test]
    fn test_normalize_discards_invalid_fields_keeps_rest() {
        let advisory = normalize_response(
            r#"{"message":"hm","recommendedColor":"octarine","targetRow":2,"targetCol":1,"suggestSkip":true}"#,
            W,
        )
        .unwrap();
        assert_eq!(advisory.recommended_color, None);
        assert_eq!(advisory.target_cell, Some(Cell::new(2, 1)));
        assert!(advisory.suggest_skip);
    }

    #[test]
    fn test_normalize_uppercase_color() {
        let advisory =
            normalize_response(r#"{"message":"", "recommendedColor":"BLUE"}"#, W).unwrap();
        assert_eq!(advisory.recommended_color, Some(TokenColor::Blue));
    }

    #[test]
    fn test_normalize_requires_both_coordinates() {
        let advisory = normalize_response(r#"{"message":"x","targetRow":4}"#, W).unwrap();
        assert_eq!(advisory.target_cell, None);
        assert_eq!(advisory.aim_point, None);

        // Non-numeric coordinate: pair discarded
        let advisory =
            normalize_response(r#"{"message":"x","targetRow":"4","targetCol":2}"#, W).unwrap();
        assert_eq!(advisory.target_cell, None);
    }

    #[test]
    fn test_normalize_rejects_off_grid_target() {
        // Odd row 3 has no column GRID_COLS-1
        let raw = format!(r#"{{"message":"x","targetRow":3,"targetCol":{}}}"#, GRID_COLS - 1);
        let advisory = normalize_response(&raw, W).unwrap();
        assert_eq!(advisory.target_cell, None);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_response("not json at all", W).is_err());
        assert!(normalize_response(r#"["array"]"#, W).is_err());
    }

    #[test]
    fn test_fallback_picks_max_size_times_value() {
        // 4 * 100 = 400 beats 2 * 150 = 300
        let candidates = vec![candidate(2, 150, 0), candidate(4, 100, 5)];
        let advisory = fallback_recommendation(&candidates, W);
        assert_eq!(advisory.target_cell, Some(Cell::new(5, 0)));
        assert_eq!(advisory.source, AdvisorySource::Fallback);
    }

    #[test]
    fn test_fallback_tie_breaks_to_smaller_row() {
        let candidates = vec![candidate(3, 100, 6), candidate(3, 100, 2), candidate(3, 100, 4)];
        let advisory = fallback_recommendation(&candidates, W);
        assert_eq!(advisory.target_cell, Some(Cell::new(2, 0)));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let candidates = vec![candidate(2, 150, 1), candidate(4, 100, 5), candidate(3, 125, 0)];
        let first = fallback_recommendation(&candidates, W);
        for _ in 0..10 {
            assert_eq!(fallback_recommendation(&candidates, W), first);
        }
    }

    #[test]
    fn test_fallback_without_candidates_has_no_aim() {
        let advisory = fallback_recommendation(&[], W);
        assert_eq!(advisory.aim_point, None);
        assert_eq!(advisory.recommended_color, None);
        assert!(!advisory.message.is_empty());
    }

    #[test]
    fn test_controller_never_overlaps_requests() {
        let stub = StubClient::new();
        let mut controller = AdvisorController::new(Box::new(stub.clone()));
        let grid = GridState::new(W);
        let anchor = grid::anchor_pos(W);

        assert!(controller.request_cycle(&grid, anchor, Vec::new(), 1));
        assert!(!controller.request_cycle(&grid, anchor, Vec::new(), 1));
        assert_eq!(stub.submitted_count(), 1);
        assert!(controller.cycle_in_flight());

        // Response lands; the queued wish surfaces exactly once
        stub.respond(Ok(r#"{"message":"ok"}"#.to_string()));
        assert!(controller.poll(1, W).is_some());
        assert!(controller.take_queued());
        assert!(!controller.take_queued());
    }

    #[test]
    fn test_controller_falls_back_on_network_error() {
        let stub = StubClient::new();
        let mut controller = AdvisorController::new(Box::new(stub.clone()));
        let mut grid = GridState::new(W);
        // Two reachable single-token clusters become the candidate list
        grid.insert(Cell::new(0, 2), TokenColor::Red).unwrap();
        grid.insert(Cell::new(0, 10), TokenColor::Blue).unwrap();

        assert!(controller.request_cycle(&grid, grid::anchor_pos(W), Vec::new(), 1));
        stub.respond(Err(AdvisorError::Unreachable("timeout".into())));
        let advisory = controller.poll(1, W).unwrap();
        assert_eq!(advisory.source, AdvisorySource::Fallback);
        // Blue is worth more at equal cluster size
        assert_eq!(advisory.recommended_color, Some(TokenColor::Blue));
    }

    #[test]
    fn test_controller_drops_stale_epoch() {
        let stub = StubClient::new();
        let mut controller = AdvisorController::new(Box::new(stub.clone()));
        let grid = GridState::new(W);

        assert!(controller.request_cycle(&grid, grid::anchor_pos(W), Vec::new(), 1));
        stub.respond(Ok(r#"{"message":"late"}"#.to_string()));
        // A new round started in the meantime
        assert!(controller.poll(2, W).is_none());
        assert!(controller.current().is_none());
        assert!(!controller.cycle_in_flight());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = AdvisorRequest {
            image: vec![1, 2],
            candidates: vec![candidate(3, 100, 2)],
            danger_level: DangerLevel::Critical,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"dangerLevel\":\"critical\""));
        assert!(json.contains("\"clusterSize\":3"));
        assert!(json.contains("\"valuePerToken\":100"));
    }
}
