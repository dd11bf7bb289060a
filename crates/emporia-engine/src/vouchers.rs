//! # Voucher Service
//!
//! Voucher validation, point-funded redemption, inventory listings, and
//! the admin definition CRUD.
//!
//! ## Code Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "SUMMER10"        no separator ──► public VoucherDefinition only       │
//! │  "FREESHIP_A8F2K1" separator    ──► caller-owned unused instance only   │
//! │                                                                         │
//! │  The two namespaces never overlap: definition codes are validated to   │
//! │  reject the underscore, so a suffixed code can only ever name an       │
//! │  instance. An instance is NEVER resolved from the definition table     │
//! │  and never resolves for anyone but its owner.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Check Order
//! window → usage cap (definition path only) → minimum order → category
//! → target user. Fixed so the caller always sees the same reason for
//! the same cart.

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use emporia_core::validation::{validate_points_cost, validate_voucher_code};
use emporia_core::voucher::{instance_code, is_instance_code};
use emporia_core::{
    CartLine, CoreError, Money, RedeemedVoucher, VoucherDefinition, VoucherKind, VoucherRule,
    VoucherTerms, REDEMPTION_SUFFIX_LEN,
};
use emporia_db::{Database, DbError};

use crate::error::{EngineError, EngineResult, ErrorCode};

/// Suffix alphabet. Ambiguous glyphs (0/O, 1/I) are excluded because
/// customers read these codes back over the phone.
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Attempts at minting before giving up on suffix collisions.
const SUFFIX_RETRY_LIMIT: u32 = 5;

// =============================================================================
// Validated Voucher
// =============================================================================

/// Where a validated code resolved from.
#[derive(Debug, Clone, PartialEq)]
pub enum VoucherSource {
    /// A public definition, applied directly by code.
    Definition { code: String },
    /// A caller-owned redeemed instance.
    Instance { id: String, code: String },
}

/// The outcome of a successful validation: everything the composer and
/// the lifecycle controller need, with no further lookups.
#[derive(Debug, Clone)]
pub struct ValidatedVoucher {
    pub rule: VoucherRule,
    pub terms: VoucherTerms,
    pub source: VoucherSource,
}

impl ValidatedVoucher {
    /// The code to persist on an order using this voucher.
    pub fn code(&self) -> &str {
        match &self.source {
            VoucherSource::Definition { code } => code,
            VoucherSource::Instance { code, .. } => code,
        }
    }
}

// =============================================================================
// Voucher Input (admin CRUD)
// =============================================================================

/// Input for creating or updating a voucher definition.
#[derive(Debug, Clone)]
pub struct VoucherInput {
    pub code: String,
    pub kind: VoucherKind,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub min_order: Option<i64>,
    pub usage_limit: Option<i64>,
    pub target_user_id: Option<String>,
    pub target_category: Option<String>,
    pub valid_from: Option<chrono::DateTime<Utc>>,
    pub valid_until: Option<chrono::DateTime<Utc>>,
    pub is_public: bool,
    pub points_cost: i64,
    pub icon: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Voucher Service
// =============================================================================

/// Voucher validation, redemption and admin CRUD.
#[derive(Debug, Clone)]
pub struct VoucherService {
    db: Database,
}

impl VoucherService {
    /// Creates a new voucher service.
    pub fn new(db: Database) -> Self {
        VoucherService { db }
    }

    // =========================================================================
    // Validation (mutates nothing)
    // =========================================================================

    /// Validates a code against a cart for a user.
    ///
    /// Resolution and check order follow the contract exactly; see the
    /// module docs. Validation never mutates persisted state: nothing is
    /// consumed or counted until order placement commits.
    pub async fn validate(
        &self,
        user_id: &str,
        code: &str,
        cart: &[CartLine],
        subtotal: Money,
    ) -> EngineResult<ValidatedVoucher> {
        let now = Utc::now();

        if is_instance_code(code) {
            let instance = self
                .db
                .redeemed()
                .get_for_user(code, user_id)
                .await?
                .filter(|i| !i.is_used)
                .ok_or_else(|| CoreError::VoucherNotFound(code.to_string()))
                .map_err(EngineError::from)?;

            let terms = instance.terms().map_err(EngineError::from)?;
            terms
                .check_cart(user_id, cart, subtotal, now)
                .map_err(EngineError::from)?;

            debug!(user_id = %user_id, code = %code, "Instance voucher validated");
            return Ok(ValidatedVoucher {
                rule: terms.rule,
                terms,
                source: VoucherSource::Instance {
                    id: instance.id,
                    code: instance.voucher_code,
                },
            });
        }

        let definition = self
            .db
            .vouchers()
            .get_by_code(code)
            .await?
            .filter(|d| d.is_public)
            .ok_or_else(|| CoreError::VoucherNotFound(code.to_string()))
            .map_err(EngineError::from)?;

        let terms = definition.terms().map_err(EngineError::from)?;

        // The usage cap sits between the window and min-order checks and
        // only exists on the definition path
        terms.check_window(now).map_err(EngineError::from)?;
        if definition.usage_exhausted() {
            return Err(CoreError::UsageExhausted {
                code: code.to_string(),
            }
            .into());
        }
        terms.check_min_order(subtotal).map_err(EngineError::from)?;
        terms.check_category(cart).map_err(EngineError::from)?;
        terms.check_target_user(user_id).map_err(EngineError::from)?;

        debug!(user_id = %user_id, code = %code, "Definition voucher validated");
        Ok(ValidatedVoucher {
            rule: terms.rule,
            terms,
            source: VoucherSource::Definition {
                code: definition.code,
            },
        })
    }

    // =========================================================================
    // Redemption (points → instance)
    // =========================================================================

    /// Redeems a points-priced definition into a fresh owned instance.
    ///
    /// ## What This Does
    /// 1. Resolves the definition; it must carry a positive `points_cost`
    /// 2. Rejects definitions whose validity window already excludes now
    /// 3. Atomically: debits the spendable balance (`points >= cost`
    ///    gate) and inserts the snapshot instance, in one transaction
    ///
    /// A failed redemption leaves the balance untouched.
    pub async fn redeem(&self, user_id: &str, code: &str) -> EngineResult<RedeemedVoucher> {
        let definition = self
            .db
            .vouchers()
            .get_by_code(code)
            .await?
            .ok_or_else(|| CoreError::VoucherNotFound(code.to_string()))
            .map_err(EngineError::from)?;

        if definition.points_cost <= 0 {
            return Err(EngineError::validation(format!(
                "voucher {code} cannot be redeemed with points"
            )));
        }

        // Never mint an instance that is dead on arrival
        definition
            .terms()
            .map_err(EngineError::from)?
            .check_window(Utc::now())
            .map_err(EngineError::from)?;

        self.db.rewards().ensure_user(user_id).await?;

        for attempt in 0..SUFFIX_RETRY_LIMIT {
            let instance = self.snapshot_instance(user_id, &definition);

            match self
                .db
                .redeemed()
                .mint(&instance, definition.points_cost)
                .await
            {
                Ok(()) => {
                    info!(
                        user_id = %user_id,
                        code = %instance.voucher_code,
                        points_cost = definition.points_cost,
                        "Voucher redeemed"
                    );
                    return Ok(instance);
                }
                Err(DbError::PreconditionFailed { .. }) => {
                    let available = self
                        .db
                        .rewards()
                        .get_state(user_id)
                        .await?
                        .map(|s| s.points)
                        .unwrap_or(0);
                    return Err(CoreError::InsufficientPoints {
                        needed: definition.points_cost,
                        available,
                    }
                    .into());
                }
                // Suffix collision: regenerate and try again
                Err(DbError::UniqueViolation { .. }) => {
                    warn!(code = %code, attempt, "Redemption suffix collision");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::new(
            ErrorCode::Internal,
            format!("could not mint a unique instance of {code}"),
        ))
    }

    /// Builds the snapshot instance for a redemption attempt.
    fn snapshot_instance(&self, user_id: &str, definition: &VoucherDefinition) -> RedeemedVoucher {
        RedeemedVoucher {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            voucher_code: instance_code(&definition.code, &generate_suffix(REDEMPTION_SUFFIX_LEN)),
            original_code: definition.code.clone(),
            kind: definition.kind,
            value: definition.value,
            max_discount: definition.max_discount,
            min_order: definition.min_order,
            target_category: definition.target_category.clone(),
            valid_until: definition.valid_until,
            description: definition.description.clone(),
            icon: definition.icon.clone(),
            is_used: false,
            redeemed_at: Utc::now(),
        }
    }

    // =========================================================================
    // Inventory listings
    // =========================================================================

    /// Lists a user's redeemed instances.
    ///
    /// With `only_usable`, filters to unused instances still inside their
    /// validity window (the checkout picker view).
    pub async fn my_vouchers(
        &self,
        user_id: &str,
        only_usable: bool,
    ) -> EngineResult<Vec<RedeemedVoucher>> {
        if !only_usable {
            return Ok(self.db.redeemed().list_for_user(user_id).await?);
        }

        let now = Utc::now();
        let instances = self.db.redeemed().list_unused_for_user(user_id).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.valid_until.map_or(true, |until| until >= now))
            .collect())
    }

    /// Lists homepage-visible public definitions.
    pub async fn list_public(&self) -> EngineResult<Vec<VoucherDefinition>> {
        Ok(self.db.vouchers().list_public().await?)
    }

    /// Lists definitions obtainable by spending points.
    pub async fn list_redeemable(&self) -> EngineResult<Vec<VoucherDefinition>> {
        Ok(self.db.vouchers().list_redeemable().await?)
    }

    // =========================================================================
    // Admin CRUD
    // =========================================================================

    /// Lists every definition (admin surface).
    pub async fn list_definitions(&self) -> EngineResult<Vec<VoucherDefinition>> {
        Ok(self.db.vouchers().list().await?)
    }

    /// Creates a definition.
    pub async fn create_definition(&self, input: VoucherInput) -> EngineResult<VoucherDefinition> {
        let now = Utc::now();
        let definition = VoucherDefinition {
            code: input.code.trim().to_string(),
            kind: input.kind,
            value: input.value,
            max_discount: input.max_discount,
            min_order: input.min_order,
            usage_limit: input.usage_limit,
            used_count: 0,
            target_user_id: input.target_user_id,
            target_category: input.target_category,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            is_public: input.is_public,
            points_cost: input.points_cost,
            icon: input.icon,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.validate_definition(&definition)?;

        self.db.vouchers().insert(&definition).await?;
        info!(code = %definition.code, kind = ?definition.kind, "Voucher definition created");
        Ok(definition)
    }

    /// Updates a definition by code.
    ///
    /// `used_count` and `created_at` are preserved; already-minted
    /// instances are unaffected either way (they carry snapshots).
    pub async fn update_definition(
        &self,
        code: &str,
        input: VoucherInput,
    ) -> EngineResult<VoucherDefinition> {
        if input.code != code {
            return Err(EngineError::validation("voucher code is immutable"));
        }

        let existing = self
            .db
            .vouchers()
            .get_by_code(code)
            .await?
            .ok_or_else(|| CoreError::VoucherNotFound(code.to_string()))
            .map_err(EngineError::from)?;

        let definition = VoucherDefinition {
            code: existing.code,
            kind: input.kind,
            value: input.value,
            max_discount: input.max_discount,
            min_order: input.min_order,
            usage_limit: input.usage_limit,
            used_count: existing.used_count,
            target_user_id: input.target_user_id,
            target_category: input.target_category,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            is_public: input.is_public,
            points_cost: input.points_cost,
            icon: input.icon,
            description: input.description,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        self.validate_definition(&definition)?;

        self.db.vouchers().update(&definition).await?;
        info!(code = %code, "Voucher definition updated");
        Ok(definition)
    }

    /// Deletes a definition. Minted instances survive on their snapshots.
    pub async fn delete_definition(&self, code: &str) -> EngineResult<()> {
        self.db.vouchers().delete(code).await?;
        info!(code = %code, "Voucher definition deleted");
        Ok(())
    }

    fn validate_definition(&self, definition: &VoucherDefinition) -> EngineResult<()> {
        validate_voucher_code(&definition.code)?;
        validate_points_cost(definition.points_cost, definition.is_public)?;
        if definition.value <= 0 {
            return Err(EngineError::validation("value must be positive"));
        }
        // Rejects field combinations the kind cannot carry
        definition
            .rule()
            .map_err(|e| EngineError::validation(e.to_string()))?;
        Ok(())
    }
}

/// Generates a random redemption suffix.
fn generate_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..SUFFIX_CHARSET.len());
            SUFFIX_CHARSET[idx] as char
        })
        .collect()
}

// =============================================================================
// Service Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use emporia_db::DbConfig;

    async fn setup() -> (Database, VoucherService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = VoucherService::new(db.clone());
        (db, service)
    }

    fn input(code: &str) -> VoucherInput {
        VoucherInput {
            code: code.to_string(),
            kind: VoucherKind::Fixed,
            value: 30_000,
            max_discount: None,
            min_order: None,
            usage_limit: None,
            target_user_id: None,
            target_category: None,
            valid_from: None,
            valid_until: None,
            is_public: true,
            points_cost: 0,
            icon: None,
            description: None,
        }
    }

    fn cart() -> Vec<CartLine> {
        vec![CartLine {
            product_id: "p1".to_string(),
            quantity: 2,
            unit_price: 100_000,
            category: "coffee".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_validate_public_definition() {
        let (_db, service) = setup().await;
        service.create_definition(input("SUMMER10")).await.unwrap();

        let validated = service
            .validate("u-1", "SUMMER10", &cart(), Money::from_units(200_000))
            .await
            .unwrap();
        assert_eq!(validated.rule, VoucherRule::Fixed { amount: 30_000 });
        assert_eq!(validated.code(), "SUMMER10");
    }

    #[tokio::test]
    async fn test_unknown_and_private_codes_are_not_found() {
        let (_db, service) = setup().await;

        let err = service
            .validate("u-1", "NOPE", &cart(), Money::from_units(200_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        // Private definitions are never applied directly by code
        let mut private = input("SECRET");
        private.is_public = false;
        private.points_cost = 50;
        service.create_definition(private).await.unwrap();

        let err = service
            .validate("u-1", "SECRET", &cart(), Money::from_units(200_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_usage_cap_between_window_and_min_order() {
        let (db, service) = setup().await;
        let mut capped = input("CAPPED");
        capped.usage_limit = Some(1);
        capped.min_order = Some(1_000_000);
        service.create_definition(capped).await.unwrap();

        db.vouchers().increment_used("CAPPED").await.unwrap();

        // Both the cap and the min-order check would reject; the cap
        // must win because it runs first
        let err = service
            .validate("u-1", "CAPPED", &cart(), Money::from_units(200_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UsageExhausted);
    }

    #[tokio::test]
    async fn test_redeem_insufficient_points_leaves_balance_untouched() {
        let (db, service) = setup().await;
        let mut private = input("REWARD50");
        private.is_public = false;
        private.points_cost = 50;
        service.create_definition(private).await.unwrap();

        db.rewards().ensure_user("u-1").await.unwrap();
        db.rewards().credit("u-1", 30).await.unwrap();

        let err = service.redeem("u-1", "REWARD50").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientPoints);

        let state = db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(state.points, 30);
        assert_eq!(state.total_points, 30);
    }

    #[tokio::test]
    async fn test_redeem_mints_owned_instance() {
        let (db, service) = setup().await;
        let mut private = input("REWARD50");
        private.is_public = false;
        private.points_cost = 50;
        service.create_definition(private).await.unwrap();

        db.rewards().ensure_user("u-1").await.unwrap();
        db.rewards().credit("u-1", 100).await.unwrap();

        let instance = service.redeem("u-1", "REWARD50").await.unwrap();
        assert!(instance.voucher_code.starts_with("REWARD50_"));
        assert!(!instance.is_used);
        assert_eq!(instance.original_code, "REWARD50");

        // Spendable balance debited, lifetime total untouched
        let state = db.rewards().get_state("u-1").await.unwrap().unwrap();
        assert_eq!(state.points, 50);
        assert_eq!(state.total_points, 100);

        // Owner validates, anyone else gets NotFound
        let validated = service
            .validate("u-1", &instance.voucher_code, &cart(), Money::from_units(200_000))
            .await
            .unwrap();
        assert!(matches!(validated.source, VoucherSource::Instance { .. }));

        let err = service
            .validate("u-2", &instance.voucher_code, &cart(), Money::from_units(200_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_public_definition_is_not_redeemable() {
        let (db, service) = setup().await;
        service.create_definition(input("SUMMER10")).await.unwrap();
        db.rewards().ensure_user("u-1").await.unwrap();

        let err = service.redeem("u-1", "SUMMER10").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_definition_validation() {
        let (_db, service) = setup().await;

        // Underscore is reserved for instance codes
        let err = service
            .create_definition(input("BAD_CODE"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // Fixed voucher carrying a percent cap is unrepresentable
        let mut bad = input("FIXEDCAP");
        bad.max_discount = Some(5_000);
        let err = service.create_definition(bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // Duplicate code hits the UNIQUE constraint
        service.create_definition(input("DUP")).await.unwrap();
        let err = service.create_definition(input("DUP")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
