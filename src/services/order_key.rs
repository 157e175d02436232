//! Resolves base-order and section identity from order numbers.
//!
//! Order numbers look like `DO-100` or `DO-100B`, where the trailing letter
//! marks one section of a split order. Identity is resolved once at
//! ingestion; downstream code works with [`BaseOrderId`] / [`SectionId`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{BaseOrderId, SectionId};

static ORDER_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+-\d+)([A-Za-z])?").unwrap());

/// Base order key for `order_number`. Total: numbers that do not match the
/// `PREFIX-<digits>` shape are returned unchanged (trimmed).
pub fn resolve_base_key(order_number: &str) -> BaseOrderId {
    let trimmed = order_number.trim();
    match ORDER_NUMBER_PATTERN.captures(trimmed) {
        Some(caps) => BaseOrderId::new(&caps[1]),
        None => BaseOrderId::new(trimmed),
    }
}

/// Full section identity for `order_number`.
///
/// The suffix is only recognised when a single letter directly follows the
/// digits and ends the string; anything else keeps the raw order number as
/// the section label.
pub fn resolve_section(order_number: &str) -> SectionId {
    let trimmed = order_number.trim();
    let Some(caps) = ORDER_NUMBER_PATTERN.captures(trimmed) else {
        return SectionId::new(BaseOrderId::new(trimmed), None);
    };

    let base = BaseOrderId::new(&caps[1]);
    let matched_len = caps.get(0).map_or(0, |m| m.end());
    let suffix = caps.get(2).and_then(|m| m.as_str().chars().next());

    if matched_len == trimmed.len() {
        SectionId::new(base, suffix)
    } else {
        SectionId::with_label(base, None, trimmed)
    }
}
