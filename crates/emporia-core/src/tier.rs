//! # Tier Resolver
//!
//! Maps a user's lifetime reward total to a loyalty tier.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tiers (ascending by min_points):                                       │
//! │                                                                         │
//! │    bronze (0) ──── silver (100) ──── gold (500) ──── diamond (2000)    │
//! │                          ▲                                              │
//! │                          │ lifetime total = 340                         │
//! │                          │                                              │
//! │    resolved = silver (greatest min_points ≤ 340)                       │
//! │    next     = gold                                                      │
//! │    progress = (340 − 100) / (500 − 100) = 60%                          │
//! │    to next  = 160 points                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure function over a tier list; the list itself is fetched and cached
//! by the engine's `TierService`, with explicit invalidation on tier CRUD.

use crate::types::{LoyaltyTier, TierStanding};

/// Resolves the active tier for a lifetime reward total.
///
/// ## Arguments
/// * `tiers` - All configured tiers, in any order; must be non-empty
/// * `total_points` - The user's lifetime reward total (non-negative)
///
/// ## Returns
/// The user's [`TierStanding`], or `None` when `tiers` is empty or no
/// tier threshold is low enough (a well-formed ladder starts at 0).
pub fn resolve_tier(tiers: &[LoyaltyTier], total_points: i64) -> Option<TierStanding> {
    let mut sorted: Vec<&LoyaltyTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.min_points);

    // Resolved tier = last tier whose min_points ≤ input
    let idx = sorted
        .iter()
        .rposition(|t| t.min_points <= total_points)?;

    let tier = sorted[idx].clone();
    let next_tier = sorted.get(idx + 1).map(|t| (*t).clone());

    let (progress_percent, points_to_next) = match &next_tier {
        Some(next) => {
            let span = next.min_points - tier.min_points;
            let into = total_points - tier.min_points;
            let pct = if span <= 0 {
                100
            } else {
                ((into * 100) / span).clamp(0, 100) as u32
            };
            (pct, (next.min_points - total_points).max(0))
        }
        // At max tier: progress display is not applicable
        None => (100, 0),
    };

    Some(TierStanding {
        tier,
        next_tier,
        progress_percent,
        points_to_next,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tier(slug: &str, min_points: i64, discount_percent: u32) -> LoyaltyTier {
        LoyaltyTier {
            id: format!("tier-{slug}"),
            slug: slug.to_string(),
            name: slug.to_string(),
            min_points,
            discount_percent,
            free_shipping_threshold: None,
            icon: None,
            benefits: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ladder() -> Vec<LoyaltyTier> {
        // Deliberately unsorted: the resolver must sort
        vec![
            tier("gold", 500, 5),
            tier("bronze", 0, 0),
            tier("diamond", 2000, 10),
            tier("silver", 100, 3),
        ]
    }

    #[test]
    fn test_resolve_base_tier() {
        let standing = resolve_tier(&ladder(), 0).unwrap();
        assert_eq!(standing.tier.slug, "bronze");
        assert_eq!(standing.next_tier.as_ref().unwrap().slug, "silver");
        assert_eq!(standing.progress_percent, 0);
        assert_eq!(standing.points_to_next, 100);
    }

    #[test]
    fn test_resolve_mid_ladder() {
        let standing = resolve_tier(&ladder(), 340).unwrap();
        assert_eq!(standing.tier.slug, "silver");
        assert_eq!(standing.next_tier.as_ref().unwrap().slug, "gold");
        // (340 - 100) / (500 - 100) = 60%
        assert_eq!(standing.progress_percent, 60);
        assert_eq!(standing.points_to_next, 160);
    }

    #[test]
    fn test_resolve_exact_threshold() {
        let standing = resolve_tier(&ladder(), 500).unwrap();
        assert_eq!(standing.tier.slug, "gold");
        assert_eq!(standing.progress_percent, 0);
        assert_eq!(standing.points_to_next, 1500);
    }

    #[test]
    fn test_resolve_max_tier() {
        let standing = resolve_tier(&ladder(), 5000).unwrap();
        assert_eq!(standing.tier.slug, "diamond");
        assert!(standing.next_tier.is_none());
        assert_eq!(standing.points_to_next, 0);
    }

    #[test]
    fn test_progress_clamped() {
        // One point below the next threshold: 399/400 = 99%, never 100
        let standing = resolve_tier(&ladder(), 499).unwrap();
        assert_eq!(standing.tier.slug, "silver");
        assert_eq!(standing.progress_percent, 99);
        assert_eq!(standing.points_to_next, 1);
    }

    #[test]
    fn test_empty_ladder() {
        assert!(resolve_tier(&[], 100).is_none());
    }

    #[test]
    fn test_no_reachable_tier() {
        // Ladder that starts above the user's total
        let tiers = vec![tier("gold", 500, 5)];
        assert!(resolve_tier(&tiers, 100).is_none());
    }
}
