//! Payment gateway adapters.
//!
//! Each provider implements [`PaymentGateway`]: creating a remote payment
//! intent for a settled amount, verifying inbound webhook signatures over
//! the raw request body, and parsing the provider payload into a uniform
//! [`GatewayEvent`]. The reconciler and checkout flow never see
//! provider-specific shapes.

pub mod razorpay;
pub mod stripe;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use strum::{Display, EnumString};

use crate::errors::ServiceError;

pub use razorpay::RazorpayGateway;
pub use stripe::StripeGateway;

type HmacSha256 = Hmac<Sha256>;

/// Supported payment providers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Razorpay,
    Stripe,
}

/// A remote payment intent issued by a gateway.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    /// The gateway's identifier for the intent; stored as the webhook
    /// idempotency anchor.
    pub gateway_order_id: String,
    pub raw: serde_json::Value,
}

/// What a webhook delivery means for the payment, provider-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventKind {
    PaymentCaptured,
    PaymentFailed,
    /// Recognized but irrelevant; acknowledged without state change.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    /// The gateway order/intent id the event refers to; absent for ignored
    /// event types.
    pub gateway_order_id: Option<String>,
    pub event_type: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    fn name(&self) -> Gateway;

    /// Create a remote payment intent. Amount is in minor currency units;
    /// the conversion happened exactly once, before this call.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<GatewayIntent, ServiceError>;

    /// Verify the webhook signature over the raw, unparsed body. Parsing or
    /// re-serializing before verification would invalidate the signature.
    fn verify_webhook(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), ServiceError>;

    /// Parse a verified payload into a uniform event.
    fn parse_event(&self, raw_body: &[u8]) -> Result<GatewayEvent, ServiceError>;
}

/// Registry of configured gateways, keyed by provider.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<Gateway, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.name(), gateway);
    }

    pub fn get(&self, gateway: Gateway) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        self.gateways.get(&gateway).cloned().ok_or_else(|| {
            ServiceError::ValidationError(format!("Payment gateway '{gateway}' is not configured"))
        })
    }
}

/// Hex-encoded HMAC-SHA256 over `data`.
pub(crate) fn hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
