use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coupon entity. Codes are canonicalized to uppercase at storage time;
/// lookups uppercase the query so matching is case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    /// Flat amount, or percentage when `is_percentage` is set.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub off: Decimal,
    pub is_percentage: bool,
    /// Discount applies only when the order total reaches this threshold;
    /// below it the discount is zero but checkout still proceeds.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub min_purchase_price: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
