//! HTTP handlers for the settlement API.

pub mod checkout;
pub mod common;
pub mod orders;
pub mod webhooks;
