//! Order views and customer cancellation.
//!
//! Cancellation goes through the order state machine: re-cancelling an
//! already-cancelled group is an idempotent success, while shipped or
//! delivered orders refuse with an explicit error. Group cancellation
//! cascades to every member order that is still cancellable and abandons
//! a still-pending payment transaction.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{order, order_group, payment_transaction};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::order_status::{
    transition, OrderEvent, OrderStatus, PaymentStatus, Transition,
};

/// A group with its member order lines, as returned to the customer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderGroupView {
    #[serde(flatten)]
    pub group: order_group::Model,
    pub orders: Vec<order::Model>,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CancelOutcome {
    pub status: String,
    /// True when the target was already cancelled and nothing changed.
    pub already_cancelled: bool,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// All order lines of a user, newest first.
    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// All order groups of a user, newest first.
    pub async fn list_groups(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<order_group::Model>, ServiceError> {
        let groups = order_group::Entity::find()
            .filter(order_group::Column::UserId.eq(user_id))
            .order_by_desc(order_group::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(groups)
    }

    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to a different user".to_string(),
            ));
        }
        Ok(order)
    }

    pub async fn get_group(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<OrderGroupView, ServiceError> {
        let group = self.owned_group(user_id, group_id).await?;
        let orders = order::Entity::find()
            .filter(order::Column::OrderGroupId.eq(group.id))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(OrderGroupView { group, orders })
    }

    /// Cancel a whole order group, cascading to its member orders.
    #[instrument(skip(self), fields(%user_id, %group_id))]
    pub async fn cancel_group(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<CancelOutcome, ServiceError> {
        let group = self.owned_group(user_id, group_id).await?;
        let current = parse_status(&group.status)?;

        match transition(current, OrderEvent::CustomerCancelled) {
            Transition::Noop => {
                return Ok(CancelOutcome {
                    status: group.status,
                    already_cancelled: true,
                })
            }
            Transition::Refused => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order group in status '{current}' cannot be cancelled"
                )))
            }
            Transition::To(_) => {}
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        order_group::Entity::update_many()
            .col_expr(
                order_group::Column::Status,
                Expr::value(OrderStatus::Cancelled.to_string()),
            )
            .col_expr(order_group::Column::UpdatedAt, Expr::value(now))
            .filter(order_group::Column::Id.eq(group.id))
            .exec(&txn)
            .await?;

        order::Entity::update_many()
            .col_expr(
                order::Column::OrderStatus,
                Expr::value(OrderStatus::Cancelled.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::OrderGroupId.eq(group.id))
            .filter(order::Column::OrderStatus.is_in(cancellable_statuses()))
            .exec(&txn)
            .await?;

        // A payment intent that never settled is abandoned with the group.
        payment_transaction::Entity::update_many()
            .col_expr(
                payment_transaction::Column::PaymentStatus,
                Expr::value(PaymentStatus::Cancelled.to_string()),
            )
            .col_expr(payment_transaction::Column::UpdatedAt, Expr::value(now))
            .filter(payment_transaction::Column::OrderGroupId.eq(group.id))
            .filter(
                payment_transaction::Column::PaymentStatus
                    .eq(PaymentStatus::Pending.to_string()),
            )
            .exec(&txn)
            .await?;

        txn.commit()
            .await
            .map_err(|e| ServiceError::TransactionError(format!("cancel aborted: {e}")))?;

        info!(group_number = %group.group_number, "order group cancelled by customer");
        self.event_sender
            .send(Event::OrderGroupCancelled(group.id))
            .await;

        Ok(CancelOutcome {
            status: OrderStatus::Cancelled.to_string(),
            already_cancelled: false,
        })
    }

    /// Cancel a single order line within a group. When it was the last
    /// active line, the group follows it to cancelled.
    #[instrument(skip(self), fields(%user_id, %order_id))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<CancelOutcome, ServiceError> {
        let order = self.get_order(user_id, order_id).await?;
        let current = parse_status(&order.order_status)?;

        match transition(current, OrderEvent::CustomerCancelled) {
            Transition::Noop => {
                return Ok(CancelOutcome {
                    status: order.order_status,
                    already_cancelled: true,
                })
            }
            Transition::Refused => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order in status '{current}' cannot be cancelled"
                )))
            }
            Transition::To(_) => {}
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        order::Entity::update_many()
            .col_expr(
                order::Column::OrderStatus,
                Expr::value(OrderStatus::Cancelled.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order.id))
            .exec(&txn)
            .await?;

        let siblings_active = order::Entity::find()
            .filter(order::Column::OrderGroupId.eq(order.order_group_id))
            .filter(order::Column::Id.ne(order.id))
            .filter(
                order::Column::OrderStatus.ne(OrderStatus::Cancelled.to_string()),
            )
            .all(&txn)
            .await?;

        if siblings_active.is_empty() {
            order_group::Entity::update_many()
                .col_expr(
                    order_group::Column::Status,
                    Expr::value(OrderStatus::Cancelled.to_string()),
                )
                .col_expr(order_group::Column::UpdatedAt, Expr::value(now))
                .filter(order_group::Column::Id.eq(order.order_group_id))
                .exec(&txn)
                .await?;
        }

        txn.commit()
            .await
            .map_err(|e| ServiceError::TransactionError(format!("cancel aborted: {e}")))?;

        info!(order_id = %order.id, "order line cancelled by customer");
        self.event_sender.send(Event::OrderCancelled(order.id)).await;

        Ok(CancelOutcome {
            status: OrderStatus::Cancelled.to_string(),
            already_cancelled: false,
        })
    }

    async fn owned_group(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<order_group::Model, ServiceError> {
        let group = order_group::Entity::find_by_id(group_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order group {group_id} not found")))?;
        if group.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order group belongs to a different user".to_string(),
            ));
        }
        Ok(group)
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw)
        .map_err(|_| ServiceError::InternalError(format!("unrecognized order status '{raw}'")))
}

fn cancellable_statuses() -> Vec<String> {
    [
        OrderStatus::OnHold,
        OrderStatus::Pending,
        OrderStatus::OnProgress,
        OrderStatus::Accepted,
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
