//! Razorpay adapter.
//!
//! Intent creation posts to the Orders API; webhooks are authenticated with
//! an HMAC-SHA256 of the raw body in the `x-razorpay-signature` header.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::config::GatewayCredentials;
use crate::errors::ServiceError;

use super::{
    constant_time_eq, hmac_sha256_hex, Gateway, GatewayEvent, GatewayEventKind, GatewayIntent,
    PaymentGateway,
};

const API_BASE: &str = "https://api.razorpay.com/v1";
const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

impl RazorpayGateway {
    pub fn new(credentials: &GatewayCredentials, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {e}")))?;
        Ok(Self {
            client,
            key_id: credentials.key_id.clone(),
            key_secret: credentials.key_secret.clone(),
            webhook_secret: credentials.webhook_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> Gateway {
        Gateway::Razorpay
    }

    #[instrument(skip(self, notes), fields(amount_minor, receipt))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayIntent, ServiceError> {
        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
            "notes": notes,
        });

        let response = self
            .client
            .post(format!("{API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("razorpay order create: {e}")))?;

        let status = response.status();
        let raw: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("razorpay response body: {e}")))?;

        if !status.is_success() {
            warn!(%status, "razorpay order creation rejected");
            return Err(ServiceError::GatewayError(format!(
                "razorpay returned {status}"
            )));
        }

        let gateway_order_id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::GatewayError("razorpay response missing order id".to_string())
            })?
            .to_string();

        Ok(GatewayIntent {
            gateway_order_id,
            raw,
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), ServiceError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::SignatureError(format!("missing {SIGNATURE_HEADER} header"))
            })?;

        let expected = hmac_sha256_hex(&self.webhook_secret, raw_body);
        if !constant_time_eq(&expected, signature) {
            return Err(ServiceError::SignatureError(
                "razorpay webhook signature mismatch".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_event(&self, raw_body: &[u8]) -> Result<GatewayEvent, ServiceError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::ValidationError(format!("invalid webhook json: {e}")))?;

        let event_type = payload
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let kind = match event_type.as_str() {
            "payment.captured" | "order.paid" => GatewayEventKind::PaymentCaptured,
            "payment.failed" => GatewayEventKind::PaymentFailed,
            _ => GatewayEventKind::Ignored,
        };

        let gateway_order_id = payload
            .pointer("/payload/payment/entity/order_id")
            .or_else(|| payload.pointer("/payload/order/entity/id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(GatewayEvent {
            kind,
            gateway_order_id,
            event_type,
        })
    }
}
