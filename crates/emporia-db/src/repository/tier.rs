//! # Loyalty Tier Repository
//!
//! Database operations for the tier ladder.
//!
//! Tiers are slow-changing configuration: the engine caches the ladder
//! and invalidates on every write through this repository.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use emporia_core::LoyaltyTier;

/// Row shape for the `loyalty_tiers` table.
///
/// `benefits` is a JSON-encoded string column; the public type carries it
/// as a `Vec<String>`, so rows convert through [`TierRow::into_tier`].
#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: String,
    slug: String,
    name: String,
    min_points: i64,
    discount_percent: i64,
    free_shipping_threshold: Option<i64>,
    icon: Option<String>,
    benefits: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TierRow {
    fn into_tier(self) -> LoyaltyTier {
        LoyaltyTier {
            id: self.id,
            slug: self.slug,
            name: self.name,
            min_points: self.min_points,
            discount_percent: self.discount_percent.clamp(0, 100) as u32,
            free_shipping_threshold: self.free_shipping_threshold,
            icon: self.icon,
            benefits: serde_json::from_str(&self.benefits).unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const TIER_COLUMNS: &str = "id, slug, name, min_points, discount_percent, \
     free_shipping_threshold, icon, benefits, created_at, updated_at";

/// Repository for loyalty tier database operations.
#[derive(Debug, Clone)]
pub struct TierRepository {
    pool: SqlitePool,
}

impl TierRepository {
    /// Creates a new TierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TierRepository { pool }
    }

    /// Lists the full ladder, ascending by threshold.
    pub async fn list(&self) -> DbResult<Vec<LoyaltyTier>> {
        let rows: Vec<TierRow> = sqlx::query_as(&format!(
            "SELECT {TIER_COLUMNS} FROM loyalty_tiers ORDER BY min_points"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TierRow::into_tier).collect())
    }

    /// Gets a tier by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<LoyaltyTier>> {
        let row: Option<TierRow> = sqlx::query_as(&format!(
            "SELECT {TIER_COLUMNS} FROM loyalty_tiers WHERE slug = ?1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TierRow::into_tier))
    }

    /// Inserts a tier.
    pub async fn insert(&self, tier: &LoyaltyTier) -> DbResult<()> {
        debug!(slug = %tier.slug, min_points = tier.min_points, "Inserting tier");

        let benefits = serde_json::to_string(&tier.benefits)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO loyalty_tiers (
                id, slug, name, min_points, discount_percent,
                free_shipping_threshold, icon, benefits,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&tier.id)
        .bind(&tier.slug)
        .bind(&tier.name)
        .bind(tier.min_points)
        .bind(tier.discount_percent as i64)
        .bind(tier.free_shipping_threshold)
        .bind(&tier.icon)
        .bind(benefits)
        .bind(tier.created_at)
        .bind(tier.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a tier by slug.
    pub async fn update(&self, tier: &LoyaltyTier) -> DbResult<()> {
        debug!(slug = %tier.slug, "Updating tier");

        let benefits = serde_json::to_string(&tier.benefits)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE loyalty_tiers SET
                name = ?2,
                min_points = ?3,
                discount_percent = ?4,
                free_shipping_threshold = ?5,
                icon = ?6,
                benefits = ?7,
                updated_at = ?8
            WHERE slug = ?1
            "#,
        )
        .bind(&tier.slug)
        .bind(&tier.name)
        .bind(tier.min_points)
        .bind(tier.discount_percent as i64)
        .bind(tier.free_shipping_threshold)
        .bind(&tier.icon)
        .bind(benefits)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tier", &tier.slug));
        }

        Ok(())
    }

    /// Deletes a tier by slug.
    pub async fn delete(&self, slug: &str) -> DbResult<()> {
        debug!(slug = %slug, "Deleting tier");

        let result = sqlx::query("DELETE FROM loyalty_tiers WHERE slug = ?1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tier", slug));
        }

        Ok(())
    }
}
