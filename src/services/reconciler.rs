//! Webhook reconciliation.
//!
//! Gateways deliver webhooks at-least-once and out of order. The single
//! idempotency anchor is the payment transaction's unique gateway order id:
//! a compare-and-swap flips its status from pending to a terminal state,
//! and only the delivery that wins the swap performs side effects. Every
//! other delivery (duplicate, late, unknown id) is acknowledged as a no-op
//! so the gateway stops retrying.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{order, order_group, payment_transaction, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateways::{Gateway, GatewayEvent, GatewayEventKind};
use crate::services::notifications::{NotificationService, OrderNotification};
use crate::services::order_status::{OrderStatus, PaymentStatus};

/// What a processed delivery amounted to. All variants are acknowledged
/// with success at the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This delivery won the compare-and-swap and settled the transaction.
    Applied,
    /// The transaction was already settled; nothing changed.
    Duplicate,
    /// Unrecognized event type or unknown gateway order id.
    Ignored,
}

#[derive(Clone)]
pub struct WebhookReconciler {
    db: Arc<DatabaseConnection>,
    notifications: NotificationService,
    event_sender: EventSender,
}

impl WebhookReconciler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifications: NotificationService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            notifications,
            event_sender,
        }
    }

    /// Apply one verified gateway event.
    #[instrument(skip(self, event), fields(%gateway, event_type = %event.event_type))]
    pub async fn process(
        &self,
        gateway: Gateway,
        event: GatewayEvent,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let target = match event.kind {
            GatewayEventKind::PaymentCaptured => PaymentStatus::Success,
            GatewayEventKind::PaymentFailed => PaymentStatus::Failed,
            GatewayEventKind::Ignored => {
                info!("ignoring unhandled gateway event");
                return Ok(ReconcileOutcome::Ignored);
            }
        };
        let Some(gateway_order_id) = event.gateway_order_id.as_deref() else {
            warn!("settlement event without a gateway order id");
            return Ok(ReconcileOutcome::Ignored);
        };

        // The compare-and-swap: only one delivery ever moves the row off
        // pending, no matter how many concurrent duplicates arrive. Scoped
        // to the delivering gateway, so one provider's webhook can never
        // settle a transaction opened with another.
        let swap = payment_transaction::Entity::update_many()
            .col_expr(
                payment_transaction::Column::PaymentStatus,
                Expr::value(target.to_string()),
            )
            .col_expr(
                payment_transaction::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(payment_transaction::Column::GatewayOrderId.eq(gateway_order_id))
            .filter(payment_transaction::Column::Gateway.eq(gateway.to_string()))
            .filter(
                payment_transaction::Column::PaymentStatus
                    .eq(PaymentStatus::Pending.to_string()),
            )
            .exec(&*self.db)
            .await?;

        if swap.rows_affected == 0 {
            let existing = payment_transaction::Entity::find()
                .filter(payment_transaction::Column::GatewayOrderId.eq(gateway_order_id))
                .filter(payment_transaction::Column::Gateway.eq(gateway.to_string()))
                .one(&*self.db)
                .await?;
            return match existing {
                Some(txn) => {
                    info!(
                        transaction_number = %txn.transaction_number,
                        payment_status = %txn.payment_status,
                        "duplicate webhook delivery, already settled"
                    );
                    Ok(ReconcileOutcome::Duplicate)
                }
                None => {
                    warn!(gateway_order_id, "webhook for unknown gateway order id");
                    Ok(ReconcileOutcome::Ignored)
                }
            };
        }

        let txn = payment_transaction::Entity::find()
            .filter(payment_transaction::Column::GatewayOrderId.eq(gateway_order_id))
            .filter(payment_transaction::Column::Gateway.eq(gateway.to_string()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "payment transaction vanished after settle: {gateway_order_id}"
                ))
            })?;

        match target {
            PaymentStatus::Success => self.settle_success(&txn).await?,
            _ => self.settle_failure(&txn).await?,
        }
        Ok(ReconcileOutcome::Applied)
    }

    /// Successful capture: member orders and the group move to on_progress,
    /// per-product order counters increment, owners are notified.
    async fn settle_success(
        &self,
        txn: &payment_transaction::Model,
    ) -> Result<(), ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::PaymentTxnId.eq(txn.id))
            .all(&*self.db)
            .await?;

        let mut per_product: HashMap<Uuid, i32> = HashMap::new();
        for o in &orders {
            *per_product.entry(o.product_id).or_insert(0) += o.quantity;
        }

        let db_txn = self.db.begin().await?;
        let now = Utc::now();

        order::Entity::update_many()
            .col_expr(
                order::Column::OrderStatus,
                Expr::value(OrderStatus::OnProgress.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::PaymentTxnId.eq(txn.id))
            .filter(order::Column::OrderStatus.eq(OrderStatus::Pending.to_string()))
            .exec(&db_txn)
            .await?;

        order_group::Entity::update_many()
            .col_expr(
                order_group::Column::Status,
                Expr::value(OrderStatus::OnProgress.to_string()),
            )
            .col_expr(order_group::Column::UpdatedAt, Expr::value(now))
            .filter(order_group::Column::Id.eq(txn.order_group_id))
            .exec(&db_txn)
            .await?;

        for (product_id, quantity) in &per_product {
            product::Entity::update_many()
                .col_expr(
                    product::Column::OrderCount,
                    Expr::col(product::Column::OrderCount).add(*quantity),
                )
                .filter(product::Column::Id.eq(*product_id))
                .exec(&db_txn)
                .await?;
        }

        db_txn.commit().await.map_err(|e| {
            ServiceError::TransactionError(format!("settlement side effects aborted: {e}"))
        })?;

        info!(
            transaction_number = %txn.transaction_number,
            orders = orders.len(),
            "payment captured, order group on_progress"
        );

        let notifications = self.owner_notifications(txn, &orders).await?;
        self.notifications.notify_owners(&notifications).await;
        self.event_sender
            .send(Event::PaymentSucceeded {
                payment_txn_id: txn.id,
                order_group_id: txn.order_group_id,
            })
            .await;
        Ok(())
    }

    /// Failed capture: member orders are rejected and the group cancelled.
    async fn settle_failure(
        &self,
        txn: &payment_transaction::Model,
    ) -> Result<(), ServiceError> {
        let db_txn = self.db.begin().await?;
        let now = Utc::now();

        order::Entity::update_many()
            .col_expr(
                order::Column::OrderStatus,
                Expr::value(OrderStatus::Rejected.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::PaymentTxnId.eq(txn.id))
            .filter(order::Column::OrderStatus.eq(OrderStatus::Pending.to_string()))
            .exec(&db_txn)
            .await?;

        order_group::Entity::update_many()
            .col_expr(
                order_group::Column::Status,
                Expr::value(OrderStatus::Cancelled.to_string()),
            )
            .col_expr(order_group::Column::UpdatedAt, Expr::value(now))
            .filter(order_group::Column::Id.eq(txn.order_group_id))
            .exec(&db_txn)
            .await?;

        db_txn.commit().await.map_err(|e| {
            ServiceError::TransactionError(format!("settlement side effects aborted: {e}"))
        })?;

        warn!(
            transaction_number = %txn.transaction_number,
            "payment failed, order group cancelled"
        );
        self.event_sender
            .send(Event::PaymentFailed {
                payment_txn_id: txn.id,
                order_group_id: txn.order_group_id,
            })
            .await;
        Ok(())
    }

    /// One notification per distinct product, addressed to its owner.
    async fn owner_notifications(
        &self,
        txn: &payment_transaction::Model,
        orders: &[order::Model],
    ) -> Result<Vec<OrderNotification>, ServiceError> {
        let group = order_group::Entity::find_by_id(txn.order_group_id)
            .one(&*self.db)
            .await?;
        let group_number = group
            .map(|g| g.group_number)
            .unwrap_or_else(|| txn.transaction_number.clone());

        let mut quantities: HashMap<Uuid, i32> = HashMap::new();
        for o in orders {
            *quantities.entry(o.product_id).or_insert(0) += o.quantity;
        }

        let product_ids: Vec<Uuid> = quantities.keys().copied().collect();
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?;

        Ok(products
            .into_iter()
            .map(|p| OrderNotification {
                owner_id: p.owner_id,
                product_id: p.id,
                quantity: quantities.get(&p.id).copied().unwrap_or(0),
                product_name: p.name,
                order_group_number: group_number.clone(),
            })
            .collect())
    }
}
