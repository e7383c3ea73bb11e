use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use settlement_api::config::{init_tracing, load_config};
use settlement_api::db::establish_connection;
use settlement_api::events;
use settlement_api::gateways::{GatewayRegistry, RazorpayGateway, StripeGateway};
use settlement_api::{app, schema, AppState};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    let db = establish_connection(&config)
        .await
        .context("failed to connect to database")?;
    if config.auto_schema {
        schema::create_tables(&db)
            .await
            .context("failed to create schema")?;
        info!("schema ensured from entity definitions");
    }

    let gateway_timeout = Duration::from_secs(config.gateway_timeout_secs);
    let mut registry = GatewayRegistry::new();
    if !config.razorpay.key_secret.is_empty() {
        registry.register(Arc::new(RazorpayGateway::new(
            &config.razorpay,
            gateway_timeout,
        )?));
        info!("razorpay gateway configured");
    }
    if !config.stripe.key_secret.is_empty() {
        registry.register(Arc::new(StripeGateway::new(
            &config.stripe,
            gateway_timeout,
            Duration::from_secs(config.webhook_tolerance_secs),
        )?));
        info!("stripe gateway configured");
    }
    if config.razorpay.key_secret.is_empty() && config.stripe.key_secret.is_empty() {
        warn!("no payment gateway configured; checkout will reject all requests");
    }

    let (event_sender, receiver) = events::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(events::process_events(receiver));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(
        Arc::new(db),
        Arc::new(config),
        Arc::new(registry),
        event_sender,
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "settlement api listening");
    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
