//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use dispatch_engine::{
    models::{BaseOrderGroup, BaseOrderId, OrderGrouping, WorkflowStage},
    services::{
        group_lines, AllocationSession, InMemorySource, RecordNormalizer, SessionEvent,
        SessionOptions,
    },
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Pending approval records as a sheet export would deliver them, with the
/// inconsistent field naming seen in practice.
pub fn pending_records() -> Vec<Value> {
    vec![
        json!({
            "id": "L-1",
            "Order No.": "DO-5A",
            "Customer Name": "Amar Oils",
            "productName": "RBD Palmolein 15kg",
            "category": "Palm",
            "qty": "100",
            "floorRate": "1450.50",
            "transportType": "Truck",
            "payment_terms": "15 days"
        }),
        json!({
            "id": "L-2",
            "order_no": "DO-5B",
            "customer_name": "Amar Oils",
            "product_name": "Palm Olein 1L pouch",
            "qty": 50,
            "floor_rate": 1500,
            "transport_type": "Tanker"
        }),
        json!({
            "id": "L-3",
            "orderNo": "DO-5A",
            "customerName": "Amar Oils",
            "productName": "Soya Refined 15L",
            "quantity": "50",
            "minRate": "1300"
        }),
        json!({
            "id": "L-4",
            "DO Number": "DO-7",
            "Party": "Bharat Traders",
            "Item": "Sunflower Oil 5L",
            "Qty": "1,200",
            "Rate": "₹ 1,650"
        }),
    ]
}

pub fn normalizer() -> RecordNormalizer {
    RecordNormalizer::default()
}

pub fn grouping() -> OrderGrouping {
    group_lines(normalizer().normalize_batch(&pending_records()))
}

pub fn in_memory_source() -> InMemorySource {
    InMemorySource::new().with_records(WorkflowStage::Approval, pending_records())
}

pub fn base_order(key: &str) -> BaseOrderGroup {
    grouping()
        .find_base_order(&BaseOrderId::new(key), None)
        .cloned()
        .unwrap_or_else(|| panic!("fixture has no base order {}", key))
}

pub fn session(key: &str) -> AllocationSession {
    AllocationSession::new(base_order(key), SessionOptions::default())
}

/// Select, quantity and rate events for one line.
pub fn approve(line_id: &str, qty: Decimal, rate: Decimal) -> Vec<SessionEvent> {
    vec![
        SessionEvent::Select {
            line_id: line_id.into(),
        },
        SessionEvent::SetApprovedQty {
            line_id: line_id.into(),
            qty,
        },
        SessionEvent::SetFinalRate {
            line_id: line_id.into(),
            rate: Some(rate),
        },
    ]
}
