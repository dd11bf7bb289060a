//! # Tier Service
//!
//! Cached access to the loyalty-tier ladder plus the admin CRUD surface.
//!
//! ## Cache Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The ladder is slow-changing configuration read on every checkout.     │
//! │                                                                         │
//! │  ladder()    ──► RwLock cache hit? return clone                        │
//! │                  miss? load from DB, fill cache                        │
//! │                                                                         │
//! │  create()/update()/delete() ──► write through ──► invalidate()         │
//! │                                                                         │
//! │  Invalidation is explicit and tied to the CRUD operations; there is    │
//! │  no TTL. A stale read between write and invalidate is impossible       │
//! │  because invalidate runs before the CRUD method returns.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use emporia_core::validation::{
    validate_discount_percent, validate_tier_slug, validate_tier_threshold,
};
use emporia_core::{resolve_tier, LoyaltyTier, TierStanding, UserRewardState};
use emporia_db::Database;

use crate::error::{EngineError, EngineResult};

/// Input for creating or updating a loyalty tier.
#[derive(Debug, Clone)]
pub struct TierInput {
    pub slug: String,
    pub name: String,
    pub min_points: i64,
    pub discount_percent: u32,
    pub free_shipping_threshold: Option<i64>,
    pub icon: Option<String>,
    pub benefits: Vec<String>,
}

/// Cached tier ladder access and admin CRUD.
#[derive(Debug, Clone)]
pub struct TierService {
    db: Database,
    cache: Arc<RwLock<Option<Vec<LoyaltyTier>>>>,
}

impl TierService {
    /// Creates a new tier service with an empty cache.
    pub fn new(db: Database) -> Self {
        TierService {
            db,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the full ladder, ascending by threshold, from cache.
    pub async fn ladder(&self) -> EngineResult<Vec<LoyaltyTier>> {
        if let Some(tiers) = self.cache.read().await.as_ref() {
            return Ok(tiers.clone());
        }

        let tiers = self.db.tiers().list().await?;
        debug!(count = tiers.len(), "Tier ladder loaded into cache");
        *self.cache.write().await = Some(tiers.clone());
        Ok(tiers)
    }

    /// Resolves a lifetime point total against the ladder.
    ///
    /// `None` when the ladder is empty or the total is below the lowest
    /// threshold (a brand-new store, or a zero-floor ladder not yet set up).
    pub async fn standing(&self, total_points: i64) -> EngineResult<Option<TierStanding>> {
        let tiers = self.ladder().await?;
        Ok(resolve_tier(&tiers, total_points))
    }

    /// Resolves a user's tier standing from their persisted reward state.
    pub async fn standing_for_user(&self, user_id: &str) -> EngineResult<Option<TierStanding>> {
        let total_points = match self.db.rewards().get_state(user_id).await? {
            Some(state) => state.total_points,
            None => 0,
        };
        self.standing(total_points).await
    }

    /// Lists every customer's reward state with their resolved standing,
    /// highest lifetime points first (admin surface).
    pub async fn customers(&self) -> EngineResult<Vec<(UserRewardState, Option<TierStanding>)>> {
        let tiers = self.ladder().await?;
        let states = self.db.rewards().list().await?;
        Ok(states
            .into_iter()
            .map(|state| {
                let standing = resolve_tier(&tiers, state.total_points);
                (state, standing)
            })
            .collect())
    }

    /// Gets a single tier by slug.
    pub async fn get(&self, slug: &str) -> EngineResult<LoyaltyTier> {
        self.db
            .tiers()
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("Tier {slug}")))
    }

    /// Creates a tier and invalidates the cache.
    pub async fn create(&self, input: TierInput) -> EngineResult<LoyaltyTier> {
        let existing = self.db.tiers().list().await?;
        self.validate(&input, &existing, None)?;

        let now = chrono::Utc::now();
        let tier = LoyaltyTier {
            id: Uuid::new_v4().to_string(),
            slug: input.slug,
            name: input.name,
            min_points: input.min_points,
            discount_percent: input.discount_percent,
            free_shipping_threshold: input.free_shipping_threshold,
            icon: input.icon,
            benefits: input.benefits,
            created_at: now,
            updated_at: now,
        };

        self.db.tiers().insert(&tier).await?;
        self.invalidate().await;
        info!(slug = %tier.slug, min_points = tier.min_points, "Tier created");
        Ok(tier)
    }

    /// Updates a tier by slug and invalidates the cache.
    pub async fn update(&self, slug: &str, input: TierInput) -> EngineResult<LoyaltyTier> {
        if input.slug != slug {
            return Err(EngineError::validation("tier slug is immutable"));
        }

        let mut tier = self.get(slug).await?;
        let existing = self.db.tiers().list().await?;
        self.validate(&input, &existing, Some(slug))?;

        tier.name = input.name;
        tier.min_points = input.min_points;
        tier.discount_percent = input.discount_percent;
        tier.free_shipping_threshold = input.free_shipping_threshold;
        tier.icon = input.icon;
        tier.benefits = input.benefits;
        tier.updated_at = chrono::Utc::now();

        self.db.tiers().update(&tier).await?;
        self.invalidate().await;
        info!(slug = %slug, "Tier updated");
        Ok(tier)
    }

    /// Deletes a tier by slug and invalidates the cache.
    ///
    /// Orders keep their frozen `tier_slug` snapshot; deleting a tier
    /// never re-prices anything already placed.
    pub async fn delete(&self, slug: &str) -> EngineResult<()> {
        self.db.tiers().delete(slug).await?;
        self.invalidate().await;
        info!(slug = %slug, "Tier deleted");
        Ok(())
    }

    /// Drops the cached ladder; the next read reloads from the DB.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!("Tier cache invalidated");
    }

    fn validate(
        &self,
        input: &TierInput,
        existing: &[LoyaltyTier],
        exclude_slug: Option<&str>,
    ) -> EngineResult<()> {
        validate_tier_slug(&input.slug)?;
        validate_discount_percent(input.discount_percent)?;

        let others: Vec<LoyaltyTier> = existing
            .iter()
            .filter(|t| exclude_slug != Some(t.slug.as_str()))
            .cloned()
            .collect();
        validate_tier_threshold(input.min_points, &others)?;

        if input.name.trim().is_empty() {
            return Err(EngineError::validation("name is required"));
        }

        Ok(())
    }
}

// =============================================================================
// Service Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use emporia_db::DbConfig;

    async fn service() -> TierService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        TierService::new(db)
    }

    fn input(slug: &str, min_points: i64, percent: u32) -> TierInput {
        TierInput {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            min_points,
            discount_percent: percent,
            free_shipping_threshold: None,
            icon: None,
            benefits: vec![],
        }
    }

    #[tokio::test]
    async fn test_crud_and_cache_invalidation() {
        let service = service().await;

        service.create(input("bronze", 0, 0)).await.unwrap();
        service.create(input("silver", 100, 3)).await.unwrap();

        // Cache filled
        let ladder = service.ladder().await.unwrap();
        assert_eq!(ladder.len(), 2);

        // A write must be visible immediately through the cache
        service.create(input("gold", 500, 5)).await.unwrap();
        let ladder = service.ladder().await.unwrap();
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[2].slug, "gold");

        service.delete("silver").await.unwrap();
        let ladder = service.ladder().await.unwrap();
        assert_eq!(ladder.len(), 2);
    }

    #[tokio::test]
    async fn test_standing_resolution() {
        let service = service().await;
        service.create(input("bronze", 0, 0)).await.unwrap();
        service.create(input("silver", 100, 3)).await.unwrap();

        let standing = service.standing(150).await.unwrap().unwrap();
        assert_eq!(standing.tier.slug, "silver");
        assert!(standing.next_tier.is_none());

        let standing = service.standing(50).await.unwrap().unwrap();
        assert_eq!(standing.tier.slug, "bronze");
        assert_eq!(standing.next_tier.as_ref().unwrap().slug, "silver");
        assert_eq!(standing.points_to_next, 50);
    }

    #[tokio::test]
    async fn test_customer_listing_resolves_standings() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = TierService::new(db.clone());
        service.create(input("bronze", 0, 0)).await.unwrap();
        service.create(input("silver", 100, 3)).await.unwrap();

        db.rewards().ensure_user("u-big").await.unwrap();
        db.rewards().credit("u-big", 150).await.unwrap();
        db.rewards().ensure_user("u-small").await.unwrap();
        db.rewards().credit("u-small", 20).await.unwrap();

        let customers = service.customers().await.unwrap();
        assert_eq!(customers.len(), 2);

        // Highest lifetime points first
        let (state, standing) = &customers[0];
        assert_eq!(state.user_id, "u-big");
        assert_eq!(standing.as_ref().unwrap().tier.slug, "silver");

        let (state, standing) = &customers[1];
        assert_eq!(state.user_id, "u-small");
        assert_eq!(standing.as_ref().unwrap().tier.slug, "bronze");
    }

    #[tokio::test]
    async fn test_duplicate_threshold_rejected() {
        let service = service().await;
        service.create(input("bronze", 0, 0)).await.unwrap();

        let err = service.create(input("copper", 0, 1)).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);

        // Updating a tier keeping its own threshold is fine
        service.update("bronze", input("bronze", 0, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected() {
        let service = service().await;

        let err = service.create(input("", 0, 0)).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);

        let err = service.create(input("gold", 100, 101)).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);

        let err = service.create(input("gold", -5, 5)).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }
}
