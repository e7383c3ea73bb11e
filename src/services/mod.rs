//! Service layer: everything the HTTP handlers delegate to.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateways::GatewayRegistry;

pub mod checkout;
pub mod coupons;
pub mod notifications;
pub mod order_status;
pub mod orders;
pub mod pricing;
pub mod reconciler;

use checkout::CheckoutService;
use coupons::CouponService;
use notifications::NotificationService;
use orders::OrderService;
use reconciler::WebhookReconciler;

/// The wired-up service set shared across handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub coupons: CouponService,
    pub reconciler: WebhookReconciler,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        gateways: Arc<GatewayRegistry>,
        event_sender: EventSender,
    ) -> Self {
        let coupons = CouponService::new(db.clone());
        let notifications = NotificationService::new(config.notification_url.clone());
        Self {
            checkout: CheckoutService::new(
                db.clone(),
                coupons.clone(),
                gateways,
                event_sender.clone(),
                config.currency.clone(),
            ),
            orders: OrderService::new(db.clone(), event_sender.clone()),
            coupons,
            reconciler: WebhookReconciler::new(db, notifications, event_sender),
        }
    }
}
