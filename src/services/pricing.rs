//! Pricing engine.
//!
//! Pure computation of a price breakdown from resolved cart lines, a
//! shipping configuration snapshot and an optional coupon. All arithmetic
//! stays on unrounded `Decimal`s; rounding happens exactly once, at the
//! gateway boundary, when converting to minor currency units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::entities::{coupon, product, product_variant, shipping_config};
use crate::errors::ServiceError;

/// Whether a line is an outright purchase or a rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Buy,
    Rent,
}

/// Immutable shipping configuration snapshot, injected per computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingSnapshot {
    pub delivery_price: Decimal,
    pub free_delivery_above: Decimal,
}

impl Default for ShippingSnapshot {
    fn default() -> Self {
        Self {
            delivery_price: Decimal::from(100),
            free_delivery_above: Decimal::ZERO,
        }
    }
}

impl From<&shipping_config::Model> for ShippingSnapshot {
    fn from(model: &shipping_config::Model) -> Self {
        Self {
            delivery_price: model.delivery_price,
            free_delivery_above: model.free_delivery_above,
        }
    }
}

/// Coupon terms snapshot used for one pricing computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponTerms {
    pub code: String,
    pub off: Decimal,
    pub is_percentage: bool,
    pub min_purchase_price: Decimal,
}

impl From<&coupon::Model> for CouponTerms {
    fn from(model: &coupon::Model) -> Self {
        Self {
            code: model.code.clone(),
            off: model.off,
            is_percentage: model.is_percentage,
            min_purchase_price: model.min_purchase_price,
        }
    }
}

/// A cart line resolved against live product/variant prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingLine {
    pub cart_line_id: Option<Uuid>,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub preview_image: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub owner_id: Uuid,
    pub product_type: ProductType,
    pub quantity: i32,
    pub rent_days: Option<i32>,
    /// Frozen per-unit prices. For rentals both are the per-day renting
    /// price; for purchases a missing catalog original price collapses to
    /// the discounted price (zero sale discount for that line, by policy).
    pub unit_original: Decimal,
    pub unit_discounted: Decimal,
}

impl PricingLine {
    /// Resolve the price source for one line: buy+variant uses variant
    /// prices, buy without variant uses product prices, rent uses the
    /// renting price (variant's when it has one).
    pub fn resolve(
        cart_line_id: Option<Uuid>,
        product: &product::Model,
        variant: Option<&product_variant::Model>,
        product_type: ProductType,
        quantity: i32,
        rent_days: Option<i32>,
    ) -> Result<Self, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for '{}' must be at least 1",
                product.name
            )));
        }

        let (unit_original, unit_discounted, rent_days) = match product_type {
            ProductType::Buy => {
                let (original, discounted) = match variant {
                    Some(v) => {
                        let discounted = v.discounted_price.ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "Variant of '{}' has no purchase price",
                                product.name
                            ))
                        })?;
                        (v.original_price, discounted)
                    }
                    None => (product.original_price, product.discounted_price),
                };
                // Missing original price means no sale for that line.
                (original.unwrap_or(discounted), discounted, None)
            }
            ProductType::Rent => {
                let days = rent_days.unwrap_or(0);
                if days < 1 {
                    return Err(ServiceError::ValidationError(format!(
                        "Rental of '{}' requires at least 1 day",
                        product.name
                    )));
                }
                let renting = variant
                    .and_then(|v| v.renting_price)
                    .or(product.renting_price)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "'{}' is not available for rent",
                            product.name
                        ))
                    })?;
                (renting, renting, Some(days))
            }
        };

        Ok(Self {
            cart_line_id,
            product_id: product.id,
            variant_id: variant.map(|v| v.id),
            title: product.name.clone(),
            preview_image: product.preview_image.clone(),
            color: variant.and_then(|v| v.color.clone()),
            size: variant.and_then(|v| v.size.clone()),
            owner_id: product.owner_id,
            product_type,
            quantity,
            rent_days,
            unit_original,
            unit_discounted,
        })
    }

    fn duration_factor(&self) -> Decimal {
        match self.product_type {
            ProductType::Buy => Decimal::ONE,
            ProductType::Rent => Decimal::from(self.rent_days.unwrap_or(1)),
        }
    }

    /// Pre-discount contribution of this line.
    pub fn line_mrp(&self) -> Decimal {
        self.unit_original * Decimal::from(self.quantity) * self.duration_factor()
    }

    /// Post-sale-discount contribution of this line.
    pub fn line_total(&self) -> Decimal {
        self.unit_discounted * Decimal::from(self.quantity) * self.duration_factor()
    }
}

/// The monetary breakdown for one checkout attempt. Recomputed on every
/// attempt and never cached: prices and coupons can change between cart
/// view and checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub mrp: Decimal,
    pub sale_discounted_price: Decimal,
    pub total_sale_discount: Decimal,
    pub shipping_price: Decimal,
    pub shipping_applied: bool,
    pub coupon_discount: Decimal,
    pub final_order_price: Decimal,
    pub product_names: Vec<String>,
    pub cart_line_ids: Vec<Uuid>,
}

/// Compute the breakdown for a set of resolved lines.
///
/// The coupon discount is always computed against the post-shipping total;
/// an unmet minimum purchase yields a zero discount but never rejects the
/// checkout.
pub fn compute_breakdown(
    lines: &[PricingLine],
    shipping: &ShippingSnapshot,
    coupon: Option<&CouponTerms>,
) -> PriceBreakdown {
    let mrp: Decimal = lines.iter().map(PricingLine::line_mrp).sum();
    let sale_discounted_price: Decimal = lines.iter().map(PricingLine::line_total).sum();
    let total_sale_discount = (mrp - sale_discounted_price).max(Decimal::ZERO);

    let waived = shipping.free_delivery_above > Decimal::ZERO
        && sale_discounted_price >= shipping.free_delivery_above;
    let (shipping_price, shipping_applied) = if waived {
        (Decimal::ZERO, false)
    } else {
        (shipping.delivery_price, true)
    };

    let post_shipping = sale_discounted_price + shipping_price;

    let coupon_discount = coupon
        .map(|terms| {
            if post_shipping < terms.min_purchase_price {
                return Decimal::ZERO;
            }
            let raw = if terms.is_percentage {
                post_shipping * terms.off / Decimal::ONE_HUNDRED
            } else {
                terms.off
            };
            raw.clamp(Decimal::ZERO, post_shipping)
        })
        .unwrap_or(Decimal::ZERO);

    PriceBreakdown {
        mrp,
        sale_discounted_price,
        total_sale_discount,
        shipping_price,
        shipping_applied,
        coupon_discount,
        final_order_price: post_shipping - coupon_discount,
        product_names: lines.iter().map(|l| l.title.clone()).collect(),
        cart_line_ids: lines.iter().filter_map(|l| l.cart_line_id).collect(),
    }
}

/// Convert a settled amount to minor currency units (e.g. rupees → paise).
/// This is the only place money is rounded.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    if amount < Decimal::ZERO {
        return Err(ServiceError::InternalError(format!(
            "refusing to convert negative amount {amount} to minor units"
        )));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("amount {amount} overflows minor units"))
        })
}
