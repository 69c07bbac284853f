//! Badge and rank derivation from total points
//!
//! Both tables are plain ascending threshold lists supplied by config;
//! nothing in here is hardcoded beyond the built-in defaults.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::model::Rank;

/// One badge milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeTier {
    /// Points required to earn the badge
    pub threshold: u32,
    /// Stable badge identifier
    pub id: String,
}

/// One rank tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTier {
    /// Points required to reach the rank
    pub threshold: u32,
    /// The rank itself
    pub rank: Rank,
}

/// Built-in badge table, used when config supplies none
pub static DEFAULT_BADGE_TIERS: Lazy<Vec<BadgeTier>> = Lazy::new(|| {
    [
        (0, "first-steps"),
        (100, "word-collector"),
        (300, "quiz-whiz"),
        (600, "conversationalist"),
        (1000, "topic-master"),
        (2000, "polyglot-in-training"),
    ]
    .into_iter()
    .map(|(threshold, id)| BadgeTier { threshold, id: id.to_string() })
    .collect()
});

/// Built-in rank thresholds, used when config supplies none
pub static DEFAULT_RANK_TIERS: Lazy<Vec<RankTier>> = Lazy::new(|| {
    vec![
        RankTier { threshold: 0, rank: Rank::Beginner },
        RankTier { threshold: 200, rank: Rank::Intermediate },
        RankTier { threshold: 500, rank: Rank::Advanced },
        RankTier { threshold: 1200, rank: Rank::Expert },
        RankTier { threshold: 2500, rank: Rank::Master },
    ]
});

/// Badge standing for a point total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeProgress {
    /// Highest badge at or below the point total, if any badge qualifies
    pub current: Option<BadgeTier>,
    /// Lowest badge strictly above the point total
    pub next: Option<BadgeTier>,
    /// Points still needed for `next`, zero when maxed out
    pub points_to_next: u32,
    /// Every earned badge, ascending by threshold
    pub earned: Vec<BadgeTier>,
}

/// Compute badge standing from an ascending threshold table
///
/// Total for any `total_points`; with a zero-threshold tier present the
/// lowest badge is always current.
pub fn badge_progress(tiers: &[BadgeTier], total_points: u32) -> BadgeProgress {
    debug_assert!(tiers.windows(2).all(|w| w[0].threshold <= w[1].threshold));

    let earned: Vec<BadgeTier> =
        tiers.iter().filter(|t| t.threshold <= total_points).cloned().collect();
    let next = tiers.iter().find(|t| t.threshold > total_points).cloned();
    let points_to_next = next.as_ref().map_or(0, |t| t.threshold - total_points);

    BadgeProgress { current: earned.last().cloned(), next, points_to_next, earned }
}

/// Derive the rank for a point total from an ascending rank table
pub fn rank_for_points(tiers: &[RankTier], total_points: u32) -> Rank {
    tiers
        .iter()
        .filter(|t| t.threshold <= total_points)
        .next_back()
        .map_or(Rank::Beginner, |t| t.rank)
}
