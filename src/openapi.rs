//! OpenAPI document for the settlement API, served at
//! `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Settlement API",
        description = "Order settlement: pricing, atomic order commit and payment webhook reconciliation"
    ),
    paths(
        crate::handlers::checkout::checkout_cart,
        crate::handlers::checkout::checkout_single,
        crate::handlers::webhooks::gateway_webhook,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_order_groups,
        crate::handlers::orders::get_order_group,
        crate::handlers::orders::cancel_order_group,
        crate::handlers::orders::cancel_order,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::checkout::CheckoutRequest,
        crate::handlers::checkout::SingleCheckoutRequest,
        crate::handlers::orders::CancelGroupRequest,
        crate::handlers::orders::CancelOrderRequest,
    )),
    tags(
        (name = "checkout", description = "Cart and single-item checkout"),
        (name = "orders", description = "Order views and cancellation"),
        (name = "webhooks", description = "Gateway webhook reconciliation")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_settlement_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.contains("/checkout/")));
        assert!(paths.iter().any(|p| p.contains("/hook/")));
        assert!(paths.iter().any(|p| p.contains("/orders/cancel")));
    }
}
