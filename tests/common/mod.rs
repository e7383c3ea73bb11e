use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

use settlement_api::config::AppConfig;
use settlement_api::entities::{cart_line, coupon, customer_address, product, shipping_config};
use settlement_api::errors::ServiceError;
use settlement_api::events;
use settlement_api::gateways::{
    Gateway, GatewayEvent, GatewayEventKind, GatewayIntent, GatewayRegistry, PaymentGateway,
};
use settlement_api::{app, schema, AppState};

pub const MOCK_WEBHOOK_SECRET: &str = "whsec_mock";

/// Deterministic in-process stand-in for a gateway adapter: no network,
/// predictable gateway order ids, the same signature scheme over the raw
/// webhook body.
#[derive(Debug)]
pub struct MockGateway {
    gateway: Gateway,
    counter: AtomicU64,
}

impl MockGateway {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            counter: AtomicU64::new(0),
        }
    }
}

/// The header each mock adapter expects its webhook signature in.
pub fn signature_header(gateway: Gateway) -> &'static str {
    match gateway {
        Gateway::Razorpay => "x-razorpay-signature",
        Gateway::Stripe => "x-stripe-signature",
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> Gateway {
        self.gateway
    }

    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        _notes: Value,
    ) -> Result<GatewayIntent, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let gateway_order_id = format!("order_mock_{n}");
        Ok(GatewayIntent {
            gateway_order_id: gateway_order_id.clone(),
            raw: json!({
                "id": gateway_order_id,
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
                "status": "created",
            }),
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<(), ServiceError> {
        let signature = headers
            .get(signature_header(self.gateway))
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::SignatureError("missing signature header".into()))?;
        if signature != sign_webhook(raw_body) {
            return Err(ServiceError::SignatureError("signature mismatch".into()));
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
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(GatewayEvent {
            kind,
            gateway_order_id,
            event_type,
        })
    }
}

/// Hex HMAC-SHA256 over the raw body with the mock webhook secret.
pub fn sign_webhook(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(MOCK_WEBHOOK_SECRET.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[allow(dead_code)]
pub fn captured_event(gateway_order_id: &str) -> Value {
    json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_mock",
                    "order_id": gateway_order_id,
                    "status": "captured"
                }
            }
        }
    })
}

#[allow(dead_code)]
pub fn failed_event(gateway_order_id: &str) -> Value {
    json!({
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_mock",
                    "order_id": gateway_order_id,
                    "status": "failed"
                }
            }
        }
    })
}

/// Test harness: the full router over an in-memory SQLite database, with the
/// mock gateway registered as `razorpay`.
pub struct TestApp {
    pub router: axum::Router,
    pub state: AppState,
    pub user_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        // One pooled connection keeps the in-memory database alive and
        // shared for the test's whole lifetime.
        let mut options = ConnectOptions::new(cfg.database_url.clone());
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("failed to open in-memory test database");
        schema::create_tables(&db)
            .await
            .expect("failed to create test schema");

        let mut registry = GatewayRegistry::new();
        registry.register(Arc::new(MockGateway::new(Gateway::Razorpay)));
        registry.register(Arc::new(MockGateway::new(Gateway::Stripe)));

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(
            Arc::new(db),
            Arc::new(cfg),
            Arc::new(registry),
            event_sender,
        );
        let router = app(state.clone());

        Self {
            router,
            state,
            user_id: Uuid::new_v4(),
            _event_task: event_task,
        }
    }

    /// Send a JSON request, optionally as a given user.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        user: Option<Uuid>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_user(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.user_id)).await
    }

    /// Deliver a webhook to the razorpay hook with a valid signature over
    /// the exact raw bytes.
    #[allow(dead_code)]
    pub async fn deliver_webhook(&self, payload: &Value) -> axum::response::Response {
        self.deliver_webhook_via(Gateway::Razorpay, payload).await
    }

    /// Deliver a validly signed webhook to the given gateway's hook.
    #[allow(dead_code)]
    pub async fn deliver_webhook_via(
        &self,
        gateway: Gateway,
        payload: &Value,
    ) -> axum::response::Response {
        let raw = serde_json::to_vec(payload).expect("serialize webhook payload");
        let signature = sign_webhook(&raw);
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/hook/{gateway}"))
            .header("content-type", "application/json")
            .header(signature_header(gateway), signature)
            .body(Body::from(raw))
            .expect("build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    #[allow(dead_code)]
    pub async fn deliver_webhook_raw(
        &self,
        raw: Vec<u8>,
        signature: &str,
    ) -> axum::response::Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/hook/razorpay")
            .header("content-type", "application/json")
            .header("x-razorpay-signature", signature)
            .body(Body::from(raw))
            .expect("build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    pub async fn seed_address(&self, user_id: Uuid) -> customer_address::Model {
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            recipient: Set("Test Recipient".to_string()),
            line1: Set("1 Test Street".to_string()),
            line2: Set(None),
            city: Set("Testville".to_string()),
            state: Set("TS".to_string()),
            postal_code: Set("560001".to_string()),
            country: Set("IN".to_string()),
            phone: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed address")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        original: Option<Decimal>,
        discounted: Decimal,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            preview_image: Set(Some(format!("{name}.jpg"))),
            original_price: Set(original),
            discounted_price: Set(discounted),
            renting_price: Set(None),
            shipping_price: Set(None),
            available_stocks: Set(100),
            order_count: Set(0),
            owner_id: Set(Uuid::new_v4()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_line::Model {
        cart_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            variant_id: Set(None),
            quantity: Set(quantity),
            rent_days: Set(None),
            product_type: Set("buy".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart line")
    }

    #[allow(dead_code)]
    pub async fn seed_coupon(
        &self,
        code: &str,
        off: Decimal,
        is_percentage: bool,
        min_purchase_price: Decimal,
    ) -> coupon::Model {
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            off: Set(off),
            is_percentage: Set(is_percentage),
            min_purchase_price: Set(min_purchase_price),
            description: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed coupon")
    }

    pub async fn seed_shipping(
        &self,
        delivery_price: Decimal,
        free_delivery_above: Decimal,
    ) -> shipping_config::Model {
        shipping_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_price: Set(delivery_price),
            free_delivery_above: Set(free_delivery_above),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed shipping config")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Decode a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
