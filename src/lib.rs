//! Order settlement backend.
//!
//! Turns a cart into priced, committed orders: the pricing engine computes
//! a deterministic breakdown, checkout creates a remote payment intent and
//! then commits the full write set atomically, and the webhook reconciler
//! settles the payment exactly once no matter how often the gateway
//! redelivers.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateways;
pub mod handlers;
pub mod ids;
pub mod openapi;
pub mod request_id;
pub mod schema;
pub mod services;

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::gateways::GatewayRegistry;
use crate::handlers::common::success;
use crate::services::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub gateways: Arc<GatewayRegistry>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        gateways: Arc<GatewayRegistry>,
        event_sender: EventSender,
    ) -> Self {
        let services = AppServices::new(db.clone(), &config, gateways.clone(), event_sender);
        Self {
            db,
            config,
            services,
            gateways,
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Result<Response, ServiceError> {
    state.db.ping().await?;
    Ok(success(json!({
        "status": "ok",
        "database": "up",
        "environment": state.config.environment,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi::ApiDoc::openapi())
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout/{product_type}",
            post(handlers::checkout::checkout_cart),
        )
        .route(
            "/checkout/single/{product_type}",
            post(handlers::checkout::checkout_single),
        )
        .route("/hook/{gateway}", post(handlers::webhooks::gateway_webhook))
        .route("/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/cancel",
            patch(handlers::orders::cancel_order_group),
        )
        .route(
            "/orders/cancel-item",
            patch(handlers::orders::cancel_order),
        )
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route("/order-groups", get(handlers::orders::list_order_groups))
        .route(
            "/order-groups/{id}",
            get(handlers::orders::get_order_group),
        )
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn(request_id::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
