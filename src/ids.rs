//! Human-facing settlement identifiers.
//!
//! Payment transactions and order groups carry `{prefix}-{epochMillis}/{year}`
//! numbers (e.g. `PT-1700000000000/2024`) alongside their UUID primary keys.
//! The prefix distinguishes the record kind at a glance in gateway dashboards
//! and support tickets.

use chrono::{Datelike, Utc};

const PAYMENT_TXN_PREFIX: &str = "PT";
const ORDER_GROUP_PREFIX: &str = "OG";

fn settlement_number(prefix: &str) -> String {
    let now = Utc::now();
    format!("{}-{}/{}", prefix, now.timestamp_millis(), now.year())
}

pub fn payment_txn_number() -> String {
    settlement_number(PAYMENT_TXN_PREFIX)
}

pub fn order_group_number() -> String {
    settlement_number(ORDER_GROUP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_format(value: &str, prefix: &str) {
        let (head, tail) = value.split_once('-').expect("prefix separator");
        assert_eq!(head, prefix);
        let (millis, year) = tail.split_once('/').expect("year separator");
        let millis: i64 = millis.parse().expect("epoch millis");
        let year: i32 = year.parse().expect("year");
        assert!(millis > 1_600_000_000_000, "epoch millis should be current");
        assert!((2024..2100).contains(&year));
    }

    #[test]
    fn payment_txn_number_format() {
        assert_format(&payment_txn_number(), "PT");
    }

    #[test]
    fn order_group_number_format() {
        assert_format(&order_group_number(), "OG");
    }
}
