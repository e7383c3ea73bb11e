//! Best-effort owner notifications.
//!
//! When a payment settles, the owners of the purchased products are told
//! about it. Delivery failures are logged and swallowed: a notification
//! outage must never turn a processed webhook into a gateway retry storm.

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotification {
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub order_group_number: String,
}

#[derive(Clone)]
pub struct NotificationService {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl NotificationService {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Notify product owners of a settled order. Never returns an error.
    #[instrument(skip(self, notifications))]
    pub async fn notify_owners(&self, notifications: &[OrderNotification]) {
        for notification in notifications {
            match &self.endpoint {
                Some(url) => {
                    let result = self.client.post(url).json(notification).send().await;
                    match result {
                        Ok(response) if response.status().is_success() => {
                            info!(
                                owner_id = %notification.owner_id,
                                product = %notification.product_name,
                                "owner notified"
                            );
                        }
                        Ok(response) => warn!(
                            owner_id = %notification.owner_id,
                            status = %response.status(),
                            "owner notification rejected"
                        ),
                        Err(e) => warn!(
                            owner_id = %notification.owner_id,
                            "owner notification failed: {}", e
                        ),
                    }
                }
                None => info!(
                    owner_id = %notification.owner_id,
                    product = %notification.product_name,
                    quantity = notification.quantity,
                    group = %notification.order_group_number,
                    "order notification (log-only)"
                ),
            }
        }
    }
}
