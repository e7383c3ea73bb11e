//! Checkout orchestration: pricing, gateway intent, atomic order commit.
//!
//! The remote payment intent is created, successfully, before the local
//! transaction begins; a failed or slow gateway call therefore never leaves
//! a local Pending order without a corresponding remote intent. The local
//! write set (N order rows, one payment transaction, one order group, cart
//! cleanup) commits all-or-nothing.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::begin_serializable;
use crate::entities::{
    cart_line, customer_address, order, order_group, payment_transaction, product,
    product_variant, shipping_config,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateways::{Gateway, GatewayRegistry};
use crate::ids;
use crate::services::coupons::CouponService;
use crate::services::order_status::{OrderStatus, PaymentStatus};
use crate::services::pricing::{
    self, CouponTerms, PriceBreakdown, PricingLine, ProductType, ShippingSnapshot,
};

/// Ad-hoc purchase of a single product, bypassing the cart.
#[derive(Debug, Clone)]
pub struct SinglePurchase {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub rent_days: Option<i32>,
}

/// Everything a caller needs after a committed checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub gateway: Gateway,
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub order_group_id: Uuid,
    pub order_group_number: String,
    pub payment_txn_id: Uuid,
    pub payment_txn_number: String,
    pub breakdown: PriceBreakdown,
}

/// The prepared write set for one checkout, committed atomically.
pub struct OrderCommitSet {
    pub group: order_group::ActiveModel,
    pub payment: payment_transaction::ActiveModel,
    pub orders: Vec<order::ActiveModel>,
    /// Cart lines consumed by this checkout, removed in the same transaction.
    pub cart_line_ids: Vec<Uuid>,
}

/// Atomically persist a checkout write set. Any failure aborts the whole
/// set; no partial state becomes visible.
pub async fn commit_order_set(
    db: &DatabaseConnection,
    set: OrderCommitSet,
) -> Result<(), ServiceError> {
    let txn = begin_serializable(db).await?;

    set.group.insert(&txn).await?;
    set.payment.insert(&txn).await?;
    for order in set.orders {
        order.insert(&txn).await?;
    }
    if !set.cart_line_ids.is_empty() {
        cart_line::Entity::delete_many()
            .filter(cart_line::Column::Id.is_in(set.cart_line_ids))
            .exec(&txn)
            .await?;
    }

    txn.commit()
        .await
        .map_err(|e| ServiceError::TransactionError(format!("order commit aborted: {e}")))?;
    Ok(())
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    coupons: CouponService,
    gateways: Arc<GatewayRegistry>,
    event_sender: EventSender,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        coupons: CouponService,
        gateways: Arc<GatewayRegistry>,
        event_sender: EventSender,
        currency: String,
    ) -> Self {
        Self {
            db,
            coupons,
            gateways,
            event_sender,
            currency,
        }
    }

    /// Check out the user's cart of the given type.
    #[instrument(skip(self), fields(%user_id, %product_type))]
    pub async fn checkout_cart(
        &self,
        user_id: Uuid,
        product_type: ProductType,
        address_id: Uuid,
        coupon: Option<String>,
        gateway: Gateway,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let lines = self.resolve_cart_lines(user_id, product_type).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart is empty; nothing to check out".to_string(),
            ));
        }
        self.settle(user_id, lines, address_id, coupon, gateway)
            .await
    }

    /// Check out a single ad-hoc purchase without touching the cart.
    #[instrument(skip(self), fields(%user_id, %product_type))]
    pub async fn checkout_single(
        &self,
        user_id: Uuid,
        product_type: ProductType,
        purchase: SinglePurchase,
        address_id: Uuid,
        coupon: Option<String>,
        gateway: Gateway,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let product = product::Entity::find_by_id(purchase.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", purchase.product_id))
            })?;
        let variant = self
            .resolve_variant(purchase.variant_id, &product)
            .await?;

        let line = PricingLine::resolve(
            None,
            &product,
            variant.as_ref(),
            product_type,
            purchase.quantity,
            purchase.rent_days,
        )?;
        self.settle(user_id, vec![line], address_id, coupon, gateway)
            .await
    }

    /// Resolve the user's cart lines against live catalog prices.
    ///
    /// A cart line whose product (or variant) has been deleted blocks the
    /// checkout with NotFound rather than being silently dropped or priced
    /// at zero; the user must remove the line explicitly.
    async fn resolve_cart_lines(
        &self,
        user_id: Uuid,
        product_type: ProductType,
    ) -> Result<Vec<PricingLine>, ServiceError> {
        let cart_lines = cart_line::Entity::find()
            .filter(cart_line::Column::UserId.eq(user_id))
            .filter(cart_line::Column::ProductType.eq(product_type.to_string()))
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(cart_lines.len());
        for cart in cart_lines {
            let product = product::Entity::find_by_id(cart.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "A product in your cart no longer exists (cart line {})",
                        cart.id
                    ))
                })?;
            let variant = self.resolve_variant(cart.variant_id, &product).await?;
            lines.push(PricingLine::resolve(
                Some(cart.id),
                &product,
                variant.as_ref(),
                product_type,
                cart.quantity,
                cart.rent_days,
            )?);
        }
        Ok(lines)
    }

    async fn resolve_variant(
        &self,
        variant_id: Option<Uuid>,
        product: &product::Model,
    ) -> Result<Option<product_variant::Model>, ServiceError> {
        let Some(variant_id) = variant_id else {
            return Ok(None);
        };
        let variant = product_variant::Entity::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Variant {} of '{}' no longer exists",
                    variant_id, product.name
                ))
            })?;
        Ok(Some(variant))
    }

    /// Current shipping configuration snapshot: most recent row, or the
    /// built-in default when none exists.
    async fn shipping_snapshot(&self) -> Result<ShippingSnapshot, ServiceError> {
        let latest = shipping_config::Entity::find()
            .order_by_desc(shipping_config::Column::CreatedAt)
            .one(&*self.db)
            .await?;
        Ok(latest
            .as_ref()
            .map(ShippingSnapshot::from)
            .unwrap_or_default())
    }

    async fn settle(
        &self,
        user_id: Uuid,
        lines: Vec<PricingLine>,
        address_id: Uuid,
        coupon: Option<String>,
        gateway: Gateway,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let address = customer_address::Entity::find_by_id(address_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {address_id} not found")))?;
        if address.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Address belongs to a different user".to_string(),
            ));
        }

        // An unknown coupon code is a user-facing validation failure; an
        // unmet minimum purchase is not (the discount is just zero).
        let coupon_terms: Option<CouponTerms> = match &coupon {
            Some(code) => {
                let resolved = self.coupons.resolve(code).await?.ok_or_else(|| {
                    ServiceError::ValidationError(format!("Invalid coupon code '{code}'"))
                })?;
                Some(CouponTerms::from(&resolved))
            }
            None => None,
        };

        let shipping = self.shipping_snapshot().await?;
        let breakdown = pricing::compute_breakdown(&lines, &shipping, coupon_terms.as_ref());
        let amount_minor = pricing::to_minor_units(breakdown.final_order_price)?;

        let payment_txn_id = Uuid::new_v4();
        let order_group_id = Uuid::new_v4();
        let payment_txn_number = ids::payment_txn_number();
        let order_group_number = ids::order_group_number();

        // Remote intent first. Nothing local has been written yet, so a
        // gateway failure aborts the checkout with zero cleanup.
        let adapter = self.gateways.get(gateway)?;
        let intent = adapter
            .create_intent(
                amount_minor,
                &self.currency,
                &payment_txn_number,
                json!({
                    "order_group": order_group_number,
                    "user_id": user_id,
                }),
            )
            .await?;

        let now = Utc::now();
        let address_json = serde_json::to_string(&address)
            .map_err(|e| ServiceError::InternalError(format!("address snapshot: {e}")))?;

        let preview_images: Vec<serde_json::Value> = lines
            .iter()
            .filter_map(|l| l.preview_image.clone())
            .map(serde_json::Value::String)
            .collect();

        let group = order_group::ActiveModel {
            id: Set(order_group_id),
            group_number: Set(order_group_number.clone()),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending.to_string()),
            address: Set(address_json.clone()),
            applied_coupon: Set(coupon_terms.as_ref().map(|c| c.code.clone())),
            mrp: Set(breakdown.mrp),
            sale_discounted_price: Set(breakdown.sale_discounted_price),
            total_sale_discount: Set(breakdown.total_sale_discount),
            shipping_price: Set(breakdown.shipping_price),
            shipping_applied: Set(breakdown.shipping_applied),
            coupon_discount: Set(breakdown.coupon_discount),
            final_order_price: Set(breakdown.final_order_price),
            preview_images: Set(serde_json::Value::Array(preview_images)),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let payment = payment_transaction::ActiveModel {
            id: Set(payment_txn_id),
            transaction_number: Set(payment_txn_number.clone()),
            order_group_id: Set(order_group_id),
            user_id: Set(user_id),
            gateway: Set(gateway.to_string()),
            gateway_order_id: Set(intent.gateway_order_id.clone()),
            payment_status: Set(PaymentStatus::Pending.to_string()),
            amount_minor: Set(amount_minor),
            currency: Set(self.currency.clone()),
            coupon_discount: Set(breakdown.coupon_discount),
            final_order_price: Set(breakdown.final_order_price),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let orders: Vec<order::ActiveModel> = lines
            .iter()
            .map(|line| order::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_group_id: Set(order_group_id),
                payment_txn_id: Set(payment_txn_id),
                user_id: Set(user_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                title: Set(line.title.clone()),
                preview_image: Set(line.preview_image.clone()),
                original_price: Set(line.unit_original),
                discounted_price: Set(line.unit_discounted),
                quantity: Set(line.quantity),
                order_type: Set(line.product_type.to_string()),
                rent_days: Set(line.rent_days),
                rent_due_date: Set(line
                    .rent_days
                    .map(|days| now + Duration::days(i64::from(days)))),
                color: Set(line.color.clone()),
                size: Set(line.size.clone()),
                address: Set(address_json.clone()),
                order_status: Set(OrderStatus::Pending.to_string()),
                payment_mode: Set(gateway.to_string()),
                shipment_type: Set("delivery".to_string()),
                tracking_link: Set(None),
                created_at: Set(now),
                updated_at: Set(None),
            })
            .collect();

        let order_count = orders.len();
        commit_order_set(
            &self.db,
            OrderCommitSet {
                group,
                payment,
                orders,
                cart_line_ids: breakdown.cart_line_ids.clone(),
            },
        )
        .await?;

        info!(
            %order_group_number,
            %payment_txn_number,
            amount_minor,
            order_count,
            "checkout committed, awaiting gateway confirmation"
        );
        self.event_sender
            .send(Event::CheckoutCommitted {
                order_group_id,
                payment_txn_id,
                order_count,
            })
            .await;

        Ok(CheckoutOutcome {
            gateway,
            gateway_order_id: intent.gateway_order_id,
            amount_minor,
            currency: self.currency.clone(),
            order_group_id,
            order_group_number,
            payment_txn_id,
            payment_txn_number,
            breakdown,
        })
    }
}
