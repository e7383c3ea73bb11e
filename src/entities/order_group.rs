use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order group entity: one per checkout action, aggregating the member
/// order lines, the applied coupon and the settled price breakdown.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-facing identifier, `OG-{epochMillis}/{year}`.
    #[sea_orm(unique)]
    pub group_number: String,
    pub user_id: Uuid,
    pub status: String,
    /// Frozen delivery address, JSON-encoded.
    pub address: String,
    pub applied_coupon: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub mrp: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sale_discounted_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_sale_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub shipping_price: Decimal,
    pub shipping_applied: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub coupon_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub final_order_price: Decimal,
    /// Preview images of member order lines, collected at commit time.
    #[sea_orm(column_type = "Json")]
    pub preview_images: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
    #[sea_orm(has_one = "super::payment_transaction::Entity")]
    PaymentTransaction,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::payment_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
