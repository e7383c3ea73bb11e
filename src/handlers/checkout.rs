//! Checkout endpoints.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::gateways::Gateway;
use crate::handlers::common::{created, CurrentUser};
use crate::services::checkout::SinglePurchase;
use crate::services::pricing::ProductType;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Delivery address to freeze into the order records.
    pub address_id: Uuid,
    /// Optional coupon code or id.
    pub coupon: Option<String>,
    /// Payment provider; the configured default when absent.
    pub gateway: Option<Gateway>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SingleCheckoutRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Required for rentals, ignored for purchases.
    pub rent_days: Option<i32>,
    pub address_id: Uuid,
    pub coupon: Option<String>,
    pub gateway: Option<Gateway>,
}

fn parse_product_type(raw: &str) -> Result<ProductType, ServiceError> {
    ProductType::from_str(raw).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown product type '{raw}'; expected 'buy' or 'rent'"
        ))
    })
}

fn requested_gateway(state: &AppState, requested: Option<Gateway>) -> Result<Gateway, ServiceError> {
    match requested {
        Some(gateway) => Ok(gateway),
        // Validated at startup, but config reloads keep this fallible.
        None => Gateway::from_str(&state.config.default_gateway).map_err(|_| {
            ServiceError::InternalError(format!(
                "default gateway '{}' is not a known provider",
                state.config.default_gateway
            ))
        }),
    }
}

/// Check out the caller's cart of the given product type.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/{product_type}",
    params(("product_type" = String, Path, description = "buy or rent")),
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order committed, awaiting payment confirmation"),
        (status = 400, description = "Empty cart, bad coupon or bad product type"),
        (status = 404, description = "A cart product no longer exists"),
        (status = 502, description = "Payment gateway unavailable")
    ),
    tag = "checkout"
)]
pub async fn checkout_cart(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_type): Path<String>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;
    let product_type = parse_product_type(&product_type)?;
    let gateway = requested_gateway(&state, request.gateway)?;

    let outcome = state
        .services
        .checkout
        .checkout_cart(
            user.0,
            product_type,
            request.address_id,
            request.coupon,
            gateway,
        )
        .await?;
    Ok(created(outcome))
}

/// Check out a single product directly, without touching the cart.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/single/{product_type}",
    params(("product_type" = String, Path, description = "buy or rent")),
    request_body = SingleCheckoutRequest,
    responses(
        (status = 201, description = "Order committed, awaiting payment confirmation"),
        (status = 400, description = "Invalid quantity, coupon or product type"),
        (status = 404, description = "Product or variant not found")
    ),
    tag = "checkout"
)]
pub async fn checkout_single(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_type): Path<String>,
    Json(request): Json<SingleCheckoutRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;
    let product_type = parse_product_type(&product_type)?;
    let gateway = requested_gateway(&state, request.gateway)?;

    let outcome = state
        .services
        .checkout
        .checkout_single(
            user.0,
            product_type,
            SinglePurchase {
                product_id: request.product_id,
                variant_id: request.variant_id,
                quantity: request.quantity,
                rent_days: request.rent_days,
            },
            request.address_id,
            request.coupon,
            gateway,
        )
        .await?;
    Ok(created(outcome))
}
