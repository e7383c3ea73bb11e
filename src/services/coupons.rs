//! Coupon resolution.
//!
//! Codes are canonicalized to uppercase on both storage and lookup, so
//! matching is case-insensitive. A missing coupon is a normal `None` result
//! surfaced to the user as a validation message, never an internal error.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::coupon::{self, Entity as CouponEntity, Model as CouponModel};
use crate::errors::ServiceError;

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolve a coupon by code or id. `Ok(None)` means not found.
    #[instrument(skip(self))]
    pub async fn resolve(&self, code_or_id: &str) -> Result<Option<CouponModel>, ServiceError> {
        let db = &*self.db;

        if let Ok(id) = Uuid::parse_str(code_or_id) {
            return Ok(CouponEntity::find_by_id(id).one(db).await?);
        }

        let canonical = code_or_id.trim().to_uppercase();
        let found = CouponEntity::find()
            .filter(coupon::Column::Code.eq(canonical))
            .one(db)
            .await?;
        Ok(found)
    }

    /// Store a coupon, canonicalizing the code to uppercase.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        code: &str,
        off: Decimal,
        is_percentage: bool,
        min_purchase_price: Decimal,
        description: Option<String>,
    ) -> Result<CouponModel, ServiceError> {
        if off < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Coupon discount cannot be negative".to_string(),
            ));
        }

        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.trim().to_uppercase()),
            off: Set(off),
            is_percentage: Set(is_percentage),
            min_purchase_price: Set(min_purchase_price),
            description: Set(description),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&*self.db).await?)
    }
}
