//! Stripe adapter.
//!
//! Intent creation posts a PaymentIntent; webhooks carry a
//! `stripe-signature` header of the form `t=...,v1=...` where `v1` is an
//! HMAC-SHA256 over `"{t}.{raw_body}"`, checked against a timestamp
//! tolerance to bound replay.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::GatewayCredentials;
use crate::errors::ServiceError;

use super::{
    constant_time_eq, hmac_sha256_hex, Gateway, GatewayEvent, GatewayEventKind, GatewayIntent,
    PaymentGateway,
};

const API_BASE: &str = "https://api.stripe.com/v1";
const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    tolerance: Duration,
}

impl StripeGateway {
    pub fn new(
        credentials: &GatewayCredentials,
        timeout: Duration,
        tolerance: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {e}")))?;
        Ok(Self {
            client,
            secret_key: credentials.key_secret.clone(),
            webhook_secret: credentials.webhook_secret.clone(),
            tolerance,
        })
    }

    fn verify_signed_payload(&self, header: &str, raw_body: &[u8]) -> Result<(), ServiceError> {
        let mut timestamp = "";
        let mut v1 = "";
        for part in header.split(',') {
            match part.split_once('=') {
                Some(("t", value)) => timestamp = value,
                Some(("v1", value)) => v1 = value,
                _ => {}
            }
        }
        if timestamp.is_empty() || v1.is_empty() {
            return Err(ServiceError::SignatureError(
                "malformed stripe-signature header".to_string(),
            ));
        }

        let ts: i64 = timestamp.parse().map_err(|_| {
            ServiceError::SignatureError("non-numeric stripe signature timestamp".to_string())
        })?;
        let age = (chrono::Utc::now().timestamp() - ts).unsigned_abs();
        if age > self.tolerance.as_secs() {
            return Err(ServiceError::SignatureError(
                "stripe signature timestamp outside tolerance".to_string(),
            ));
        }

        let mut signed = Vec::with_capacity(timestamp.len() + 1 + raw_body.len());
        signed.extend_from_slice(timestamp.as_bytes());
        signed.push(b'.');
        signed.extend_from_slice(raw_body);

        let expected = hmac_sha256_hex(&self.webhook_secret, &signed);
        if !constant_time_eq(&expected, v1) {
            return Err(ServiceError::SignatureError(
                "stripe webhook signature mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> Gateway {
        Gateway::Stripe
    }

    #[instrument(skip(self, notes), fields(amount_minor, receipt))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<GatewayIntent, ServiceError> {
        let amount = amount_minor.to_string();
        let currency = currency.to_lowercase();
        let mut form = vec![
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("metadata[receipt]", receipt),
        ];
        let notes_text;
        if !notes.is_null() {
            notes_text = notes.to_string();
            form.push(("metadata[notes]", notes_text.as_str()));
        }

        let response = self
            .client
            .post(format!("{API_BASE}/payment_intents"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("stripe intent create: {e}")))?;

        let status = response.status();
        let raw: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("stripe response body: {e}")))?;

        if !status.is_success() {
            warn!(%status, "stripe payment intent creation rejected");
            return Err(ServiceError::GatewayError(format!(
                "stripe returned {status}"
            )));
        }

        let gateway_order_id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::GatewayError("stripe response missing intent id".to_string())
            })?
            .to_string();

        Ok(GatewayIntent {
            gateway_order_id,
            raw,
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), ServiceError> {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::SignatureError(format!("missing {SIGNATURE_HEADER} header"))
            })?;
        self.verify_signed_payload(header, raw_body)
    }

    fn parse_event(&self, raw_body: &[u8]) -> Result<GatewayEvent, ServiceError> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::ValidationError(format!("invalid webhook json: {e}")))?;

        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let kind = match event_type.as_str() {
            "payment_intent.succeeded" | "checkout.session.completed" => {
                GatewayEventKind::PaymentCaptured
            }
            "payment_intent.payment_failed" => GatewayEventKind::PaymentFailed,
            _ => GatewayEventKind::Ignored,
        };

        let gateway_order_id = payload
            .pointer("/data/object/payment_intent")
            .or_else(|| payload.pointer("/data/object/id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(GatewayEvent {
            kind,
            gateway_order_id,
            event_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn gateway() -> StripeGateway {
        StripeGateway::new(
            &GatewayCredentials {
                key_id: String::new(),
                key_secret: "sk_test".to_string(),
                webhook_secret: "whsec_stripe".to_string(),
            },
            Duration::from_secs(5),
            Duration::from_secs(300),
        )
        .unwrap()
    }

    fn sign(body: &[u8], timestamp: i64, secret: &str) -> String {
        let mut signed = timestamp.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(body);
        format!("t={},v1={}", timestamp, hmac_sha256_hex(secret, &signed))
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let gw = gateway();
        let body = br#"{"type":"payment_intent.succeeded"}"#.to_vec();
        let header = sign(&body, chrono::Utc::now().timestamp(), "whsec_stripe");

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&header).unwrap());
        assert!(gw.verify_webhook(&headers, &body).is_ok());
    }

    #[test]
    fn rejects_stale_timestamp_and_wrong_secret() {
        let gw = gateway();
        let body = br#"{"type":"payment_intent.succeeded"}"#.to_vec();

        let stale = sign(&body, chrono::Utc::now().timestamp() - 3600, "whsec_stripe");
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&stale).unwrap());
        assert!(gw.verify_webhook(&headers, &body).is_err());

        let wrong = sign(&body, chrono::Utc::now().timestamp(), "other_secret");
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&wrong).unwrap());
        assert!(gw.verify_webhook(&headers, &body).is_err());
    }

    #[test]
    fn parses_intent_events() {
        let gw = gateway();
        let body = serde_json::to_vec(&json!({
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_123", "status": "succeeded"}}
        }))
        .unwrap();
        let event = gw.parse_event(&body).unwrap();
        assert_eq!(event.kind, GatewayEventKind::PaymentCaptured);
        assert_eq!(event.gateway_order_id.as_deref(), Some("pi_123"));

        let body = serde_json::to_vec(&json!({
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_1"}}
        }))
        .unwrap();
        assert_eq!(gw.parse_event(&body).unwrap().kind, GatewayEventKind::Ignored);
    }
}
