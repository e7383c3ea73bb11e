//! Persistence entities.
//!
//! Orders, order groups and payment transactions are written atomically at
//! checkout; products, variants, coupons, shipping config and addresses are
//! collaborator-owned inputs this service only reads (except the product
//! order counter, which the webhook reconciler increments).

pub mod cart_line;
pub mod coupon;
pub mod customer_address;
pub mod order;
pub mod order_group;
pub mod payment_transaction;
pub mod product;
pub mod product_variant;
pub mod shipping_config;

pub use cart_line::Entity as CartLine;
pub use coupon::Entity as Coupon;
pub use customer_address::Entity as CustomerAddress;
pub use order::Entity as Order;
pub use order_group::Entity as OrderGroup;
pub use payment_transaction::Entity as PaymentTransaction;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use shipping_config::Entity as ShippingConfig;
