//! Gateway webhook endpoint.
//!
//! Signature verification runs over the raw request body before any JSON
//! parsing. Duplicate and unknown deliveries are acknowledged with 200 so
//! the gateway stops retrying; only an invalid signature is rejected.

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::json;
use tracing::info;

use crate::errors::ServiceError;
use crate::gateways::Gateway;
use crate::handlers::common::success;
use crate::services::reconciler::ReconcileOutcome;
use crate::AppState;

/// Receive and reconcile one gateway webhook delivery.
#[utoipa::path(
    post,
    path = "/api/v1/hook/{gateway}",
    params(("gateway" = String, Path, description = "razorpay or stripe")),
    request_body(content = Vec<u8>, description = "Raw gateway payload"),
    responses(
        (status = 200, description = "Delivery acknowledged (applied, duplicate or ignored)"),
        (status = 400, description = "Invalid signature or malformed payload"),
        (status = 404, description = "Unknown gateway")
    ),
    tag = "webhooks"
)]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let gateway = Gateway::from_str(&gateway)
        .map_err(|_| ServiceError::NotFound(format!("Unknown gateway '{gateway}'")))?;
    let adapter = state.gateways.get(gateway)?;

    adapter.verify_webhook(&headers, &body)?;
    let event = adapter.parse_event(&body)?;

    let outcome = state.services.reconciler.process(gateway, event).await?;
    let disposition = match outcome {
        ReconcileOutcome::Applied => "applied",
        ReconcileOutcome::Duplicate => "duplicate",
        ReconcileOutcome::Ignored => "ignored",
    };
    info!(%gateway, disposition, "webhook processed");
    Ok(success(json!({ "status": "ok", "disposition": disposition })))
}
