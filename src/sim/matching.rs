//! Connected-component match detection
//!
//! Flood fill over the indexed grid: only same-color neighbor edges
//! propagate the search, so the result is the color-contiguous region
//! around the origin, not a connected region filtered by color afterwards.

use std::collections::{HashSet, VecDeque};

use crate::consts::MATCH_MIN_SIZE;
use crate::grid::{GridState, Token};

/// Result of resolving a landing token against the grid
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Tokens deactivated by this match, in BFS discovery order
    pub removed: Vec<Token>,
    pub triggered: bool,
}

impl MatchOutcome {
    fn untriggered() -> Self {
        Self {
            removed: Vec::new(),
            triggered: false,
        }
    }
}

/// Active tokens connected to `origin` through same-color neighbor edges,
/// origin included. Returns an empty list for inactive or unknown origins.
/// Purely descriptive; the grid is not touched.
pub fn same_color_cluster(grid: &GridState, origin: u32) -> Vec<u32> {
    let Some(origin_token) = grid.token(origin) else {
        return Vec::new();
    };
    if !origin_token.active {
        return Vec::new();
    }
    let color = origin_token.color;

    let mut visited: HashSet<u32> = HashSet::from([origin]);
    let mut members = vec![origin];
    let mut queue = VecDeque::from([origin]);

    while let Some(id) = queue.pop_front() {
        // neighbors_of only yields active tokens
        for n in grid.neighbors_of(id) {
            if visited.contains(&n) {
                continue;
            }
            let Some(token) = grid.token(n) else {
                continue;
            };
            if token.color != color {
                continue;
            }
            let _ = visited.insert(n);
            members.push(n);
            queue.push_back(n);
        }
    }

    members
}

/// Flood fill from `origin`; if the same-color region reaches the minimum
/// match size, every member is deactivated and returned. Otherwise the
/// grid is left untouched. Inactive tokens are never visited, so calling
/// this again after a match is a no-op.
pub fn resolve_match(grid: &mut GridState, origin: u32) -> MatchOutcome {
    let members = same_color_cluster(grid, origin);
    if members.len() < MATCH_MIN_SIZE {
        return MatchOutcome::untriggered();
    }

    let removed: Vec<Token> = members
        .iter()
        .filter_map(|&id| grid.token(id).cloned())
        .collect();
    for &id in &members {
        grid.deactivate(id);
    }
    log::debug!(
        "match popped {} {} tokens",
        removed.len(),
        removed[0].color.as_str()
    );

    MatchOutcome {
        removed,
        triggered: true,
    }
}
