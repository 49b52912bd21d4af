//! Match scoring and landing accuracy
//!
//! Accuracy is graded against the advisory aim point that was active when
//! the shot launched. A distance exactly on a tier boundary belongs to the
//! farther (cheaper) tier.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// How close the landing came to the advisory aim point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccuracyTier {
    Critical,
    Great,
    OffTarget,
}

impl AccuracyTier {
    /// Score multiplier for this tier
    pub fn bonus(&self) -> f32 {
        match self {
            AccuracyTier::Critical => 2.0,
            AccuracyTier::Great => 1.5,
            AccuracyTier::OffTarget => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyTier::Critical => "critical",
            AccuracyTier::Great => "great",
            AccuracyTier::OffTarget => "off-target",
        }
    }

    /// Classify a landing-to-target distance
    pub fn from_distance(d: f32) -> Self {
        if d < ACCURACY_CRITICAL_DIST {
            AccuracyTier::Critical
        } else if d < ACCURACY_GREAT_DIST {
            AccuracyTier::Great
        } else {
            AccuracyTier::OffTarget
        }
    }
}

/// Accuracy multiplier for a resolved shot. Without a launch-time target
/// there is no tier and no bonus.
pub fn accuracy_bonus(landing: Vec2, target_at_launch: Option<Vec2>) -> (f32, Option<AccuracyTier>) {
    match target_at_launch {
        Some(target) => {
            let tier = AccuracyTier::from_distance(landing.distance(target));
            (tier.bonus(), Some(tier))
        }
        None => (1.0, None),
    }
}

/// Points for a triggered match:
/// `floor(size * color_value * difficulty * big-match bonus * accuracy)`.
/// Only matches strictly larger than the minimum earn the big-match bonus.
pub fn match_points(
    match_size: usize,
    color_value: u32,
    difficulty_mult: f32,
    accuracy_bonus: f32,
) -> u64 {
    let big = if match_size > MATCH_MIN_SIZE {
        BIG_MATCH_BONUS
    } else {
        1.0
    };
    (match_size as f64
        * color_value as f64
        * difficulty_mult as f64
        * big as f64
        * accuracy_bonus as f64)
        .floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        // Exactly on a boundary falls into the farther tier
        assert_eq!(
            AccuracyTier::from_distance(ACCURACY_CRITICAL_DIST - 0.01),
            AccuracyTier::Critical
        );
        assert_eq!(
            AccuracyTier::from_distance(ACCURACY_CRITICAL_DIST),
            AccuracyTier::Great
        );
        assert_eq!(
            AccuracyTier::from_distance(ACCURACY_GREAT_DIST - 0.01),
            AccuracyTier::Great
        );
        assert_eq!(
            AccuracyTier::from_distance(ACCURACY_GREAT_DIST),
            AccuracyTier::OffTarget
        );
    }

    #[test]
    fn test_tiers_partition_monotonically() {
        let mut last = f32::INFINITY;
        for d in 0..200 {
            let bonus = AccuracyTier::from_distance(d as f32).bonus();
            assert!(bonus <= last, "bonus increased with distance at d={d}");
            last = bonus;
        }
    }

    #[test]
    fn test_no_target_means_no_bonus() {
        let (bonus, tier) = accuracy_bonus(Vec2::new(100.0, 100.0), None);
        assert_eq!(bonus, 1.0);
        assert_eq!(tier, None);
    }

    #[test]
    fn test_match_point_scenarios() {
        // Five tokens at value 100, multiplier 1.0, no accuracy bonus:
        // the size bonus kicks in above the minimum
        assert_eq!(match_points(5, 100, 1.0, 1.0), 750);
        // Exactly the minimum size earns no size bonus
        assert_eq!(match_points(3, 100, 1.0, 1.0), 300);
    }

    #[test]
    fn test_match_points_floor() {
        // 3 * 125 * 1.5 * 1.0 * 1.5 = 843.75 -> 843
        assert_eq!(match_points(3, 125, 1.5, 1.5), 843);
    }
}
