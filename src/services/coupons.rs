use crate::{
    db::DbPool,
    entities::coupon::{self, CouponType, Entity as Coupon},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// `max_uses` value meaning "no redemption ceiling".
pub const UNLIMITED_USES: i32 = 0;

static COUPON_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{0,31}$").expect("valid coupon code regex"));

/// Coupon codes are stored and matched uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Applies the validity rules to a coupon snapshot, in order, short-circuiting
/// on the first failure: active, not expired, minimum purchase met, quota
/// headroom. Read-only; the authoritative quota check is the conditional
/// increment issued at redemption time.
pub fn check_coupon(
    coupon: &coupon::Model,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if !coupon.is_active {
        return Err(ServiceError::CouponInactive(coupon.code.clone()));
    }

    if let Some(expires_at) = coupon.expires_at {
        if expires_at <= now {
            return Err(ServiceError::CouponExpired(coupon.code.clone()));
        }
    }

    if subtotal < coupon.min_purchase_amount {
        return Err(ServiceError::CouponBelowMinimum {
            code: coupon.code.clone(),
            minimum: coupon.min_purchase_amount.to_string(),
        });
    }

    if coupon.max_uses > UNLIMITED_USES && coupon.used_count >= coupon.max_uses {
        return Err(ServiceError::CouponExhausted(coupon.code.clone()));
    }

    Ok(())
}

/// Request payload for creating a coupon
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCouponInput {
    pub code: String,
    pub coupon_type: CouponType,
    pub value: Decimal,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 0 = unlimited
    #[serde(default)]
    pub max_uses: i32,
    #[serde(default)]
    pub min_purchase_amount: Decimal,
}

/// Paginated coupon listing
#[derive(Debug, Serialize, ToSchema)]
pub struct CouponListResponse {
    pub coupons: Vec<coupon::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing coupons and their redemption quota
#[derive(Clone)]
pub struct CouponService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CouponService {
    /// Creates a new coupon service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Validates a coupon code against a purchase subtotal.
    ///
    /// This is a read-only pre-check: repeated calls never touch
    /// `used_count`. Passing it does not reserve quota — concurrent
    /// checkouts settle that race at redemption (see [`Self::redeem`]).
    #[instrument(skip(self), fields(code = %code))]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<coupon::Model, ServiceError> {
        let normalized = normalize_code(code);

        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(normalized.clone()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::CouponNotFound(normalized.clone()))?;

        check_coupon(&found, subtotal, Utc::now())?;
        Ok(found)
    }

    /// Consumes one unit of coupon quota inside an open transaction.
    ///
    /// The increment is a single conditional update — `used_count` only
    /// advances while it is still below `max_uses` (or the coupon is
    /// unlimited). Zero rows affected means another checkout took the last
    /// slot between validation and here; the caller must abort.
    pub async fn redeem<C: ConnectionTrait>(
        conn: &C,
        coupon_id: Uuid,
        code: &str,
    ) -> Result<(), ServiceError> {
        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::MaxUses.eq(UNLIMITED_USES))
                    .add(Expr::col(coupon::Column::UsedCount).lt(Expr::col(coupon::Column::MaxUses))),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            warn!(code = %code, "coupon quota exhausted at redemption time");
            return Err(ServiceError::CouponExhausted(code.to_string()));
        }

        Ok(())
    }

    /// Creates a new coupon
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let code = normalize_code(&input.code);
        if !COUPON_CODE_RE.is_match(&code) {
            return Err(ServiceError::ValidationError(format!(
                "Coupon code '{}' must be 1-32 alphanumeric characters, hyphens or underscores",
                input.code
            )));
        }

        if input.value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Coupon value must not be negative".to_string(),
            ));
        }
        if input.coupon_type == CouponType::Percentage && input.value > Decimal::from(100) {
            return Err(ServiceError::ValidationError(
                "Percentage coupons cannot exceed 100".to_string(),
            ));
        }
        if input.max_uses < 0 {
            return Err(ServiceError::ValidationError(
                "max_uses must be zero (unlimited) or positive".to_string(),
            ));
        }
        if input.min_purchase_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "min_purchase_amount must not be negative".to_string(),
            ));
        }

        let existing = Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(&*self.db_pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                code
            )));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            coupon_type: Set(input.coupon_type),
            value: Set(input.value),
            is_active: Set(true),
            expires_at: Set(input.expires_at),
            max_uses: Set(input.max_uses),
            used_count: Set(0),
            min_purchase_amount: Set(input.min_purchase_amount),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db_pool).await?;
        info!(code = %code, "Coupon created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::CouponCreated(code.clone())).await {
                warn!(error = %e, code = %code, "Failed to send coupon created event");
            }
        }

        Ok(created)
    }

    /// Fetches a coupon by code
    #[instrument(skip(self))]
    pub async fn get_coupon(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        let normalized = normalize_code(code);
        Coupon::find()
            .filter(coupon::Column::Code.eq(normalized.clone()))
            .one(&*self.db_pool)
            .await?
            .ok_or(ServiceError::CouponNotFound(normalized))
    }

    /// Lists coupons with pagination
    #[instrument(skip(self))]
    pub async fn list_coupons(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<CouponListResponse, ServiceError> {
        let paginator = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(CouponListResponse {
            coupons,
            total,
            page,
            per_page,
        })
    }

    /// Deactivates a coupon so it no longer validates
    #[instrument(skip(self))]
    pub async fn deactivate_coupon(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        let found = self.get_coupon(code).await?;
        let code = found.code.clone();

        let mut active: coupon::ActiveModel = found.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db_pool).await?;

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CouponDeactivated(code.clone()))
                .await
            {
                warn!(error = %e, code = %code, "Failed to send coupon deactivated event");
            }
        }

        Ok(updated)
    }
}
