use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment transaction entity: the authoritative record of a gateway payment
/// attempt, 1:1 with an order group.
///
/// `gateway_order_id` is the idempotency anchor for webhook processing: the
/// reconciler's status flip is a compare-and-swap keyed on it, so the row is
/// never created twice and duplicate deliveries cannot re-apply side effects.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-facing identifier, `PT-{epochMillis}/{year}`.
    #[sea_orm(unique)]
    pub transaction_number: String,
    pub order_group_id: Uuid,
    pub user_id: Uuid,
    pub gateway: String,
    /// Remote intent id issued by the gateway before the local commit.
    #[sea_orm(unique)]
    pub gateway_order_id: String,
    pub payment_status: String,
    /// Amount in minor currency units, converted exactly once at the
    /// gateway boundary.
    pub amount_minor: i64,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub coupon_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub final_order_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_group::Entity",
        from = "Column::OrderGroupId",
        to = "super::order_group::Column::Id"
    )]
    OrderGroup,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::order_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderGroup.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
