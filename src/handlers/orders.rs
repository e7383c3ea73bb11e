//! Order views and cancellation endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::common::{success, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelGroupRequest {
    pub order_group_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub order_id: Uuid,
}

/// List the caller's order lines, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses((status = 200, description = "Order lines")),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, ServiceError> {
    let orders = state.services.orders.list_orders(user.0).await?;
    Ok(success(orders))
}

/// Fetch one order line.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order line"),
        (status = 403, description = "Order belongs to a different user"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get_order(user.0, id).await?;
    Ok(success(order))
}

/// List the caller's order groups, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/order-groups",
    responses((status = 200, description = "Order groups")),
    tag = "orders"
)]
pub async fn list_order_groups(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, ServiceError> {
    let groups = state.services.orders.list_groups(user.0).await?;
    Ok(success(groups))
}

/// Fetch one order group with its member order lines.
#[utoipa::path(
    get,
    path = "/api/v1/order-groups/{id}",
    params(("id" = Uuid, Path, description = "Order group id")),
    responses(
        (status = 200, description = "Order group with member orders"),
        (status = 403, description = "Group belongs to a different user"),
        (status = 404, description = "Group not found")
    ),
    tag = "orders"
)]
pub async fn get_order_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let view = state.services.orders.get_group(user.0, id).await?;
    Ok(success(view))
}

/// Cancel a whole order group.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/cancel",
    request_body = CancelGroupRequest,
    responses(
        (status = 200, description = "Cancelled, or already cancelled"),
        (status = 400, description = "Group can no longer be cancelled"),
        (status = 403, description = "Group belongs to a different user"),
        (status = 404, description = "Group not found")
    ),
    tag = "orders"
)]
pub async fn cancel_order_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CancelGroupRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .orders
        .cancel_group(user.0, request.order_group_id)
        .await?;
    Ok(success(outcome))
}

/// Cancel a single order line within a group.
#[utoipa::path(
    patch,
    path = "/api/v1/orders/cancel-item",
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Cancelled, or already cancelled"),
        (status = 400, description = "Order can no longer be cancelled"),
        (status = 403, description = "Order belongs to a different user"),
        (status = 404, description = "Order not found")
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Response, ServiceError> {
    let outcome = state
        .services
        .orders
        .cancel_order(user.0, request.order_id)
        .await?;
    Ok(success(outcome))
}
