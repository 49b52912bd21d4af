//! Line-of-sight reachability and shot candidate enumeration
//!
//! The clearance test samples a straight segment from the launch anchor to
//! the target and ignores wall-bounce trajectories entirely. The flight
//! integrator does allow bounce shots to land, so the advisor can never
//! suggest everything that is physically reachable. Known gap, kept as is.

use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::matching::same_color_cluster;
use crate::consts::*;
use crate::grid::{GridState, Token};
use crate::palette::TokenColor;

/// A reachable cluster, summarized for the advisor. Rebuilt from scratch
/// each analysis cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotCandidate {
    /// Id of the cluster's landing representative token
    pub cell_id: u32,
    pub color: TokenColor,
    pub cluster_size: usize,
    pub row: usize,
    pub col: usize,
    pub value_per_token: u32,
}

/// Whether a straight shot from `anchor` could reach the target token
/// without first colliding with another active token. Samples the segment
/// at half-radius steps, with a couple of steps of tolerance at both ends.
pub fn is_path_clear(grid: &GridState, anchor: Vec2, target_id: u32) -> bool {
    let Some(target) = grid.token(target_id) else {
        return false;
    };
    let delta = target.pos - anchor;
    let dist = delta.length();
    if dist < PATH_SAMPLE_STEP {
        return true;
    }
    let dir = delta / dist;
    let steps = (dist / PATH_SAMPLE_STEP) as usize;

    for i in PATH_ENDPOINT_SKIP..steps.saturating_sub(PATH_ENDPOINT_SKIP) {
        let point = anchor + dir * (i as f32 * PATH_SAMPLE_STEP);
        for token in grid.active_tokens() {
            if token.id == target_id {
                continue;
            }
            if token.pos.distance(point) < COLLISION_RADIUS {
                return false;
            }
        }
    }
    true
}

/// Enumerate one candidate per reachable cluster. Tokens are partitioned by
/// color, clustered with the same adjacency the match engine uses, and each
/// cluster is represented by its bottom-most member that passes the
/// clearance test. Clusters with no reachable member are omitted.
pub fn enumerate_candidates(grid: &GridState, anchor: Vec2) -> Vec<ShotCandidate> {
    let mut candidates = Vec::new();
    let mut visited: HashSet<u32> = HashSet::new();

    for color in TokenColor::ALL {
        // Id order keeps cluster discovery deterministic
        for token in grid.active_tokens().filter(|t| t.color == color) {
            if visited.contains(&token.id) {
                continue;
            }
            let members = same_color_cluster(grid, token.id);
            visited.extend(members.iter().copied());

            // Bottom-most (largest y) first; id breaks exact ties
            let mut ordered: Vec<&Token> =
                members.iter().filter_map(|&id| grid.token(id)).collect();
            ordered.sort_by(|a, b| {
                b.pos
                    .y
                    .partial_cmp(&a.pos.y)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });

            if let Some(rep) = ordered
                .iter()
                .find(|t| is_path_clear(grid, anchor, t.id))
            {
                candidates.push(ShotCandidate {
                    cell_id: rep.id,
                    color,
                    cluster_size: members.len(),
                    row: rep.cell.row,
                    col: rep.cell.col,
                    value_per_token: color.point_value(),
                });
            }
        }
    }

    candidates
}
