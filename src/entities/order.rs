use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order line entity: one row per cart line at commit time.
///
/// Everything price- and presentation-related is a frozen snapshot taken
/// inside the commit transaction, so later catalog edits cannot rewrite
/// order history. Rows are created Pending and mutated only by the webhook
/// reconciler or user cancellation; they are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_group_id: Uuid,
    pub payment_txn_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub preview_image: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub original_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub discounted_price: Decimal,
    pub quantity: i32,
    /// "buy" or "rent"
    pub order_type: String,
    pub rent_days: Option<i32>,
    pub rent_due_date: Option<DateTime<Utc>>,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Frozen delivery address, JSON-encoded.
    pub address: String,
    pub order_status: String,
    /// Gateway the payment was routed through.
    pub payment_mode: String,
    pub shipment_type: String,
    pub tracking_link: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::payment_transaction::Entity",
        from = "Column::PaymentTxnId",
        to = "super::payment_transaction::Column::Id"
    )]
    PaymentTransaction,
}

impl Related<super::order_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderGroup.def()
    }
}

impl Related<super::payment_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
