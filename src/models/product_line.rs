use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;

/// Opaque product-line identifier, stable across re-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a line created during an allocation session.
    pub fn synthetic() -> Self {
        Self(format!("synthetic-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The commercial order a line belongs to, independent of sectioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseOrderId(String);

impl BaseOrderId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One section of a base order. `suffix` is `None` for an unsplit order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId {
    pub base: BaseOrderId,
    pub suffix: Option<char>,
    /// Full order number as displayed; usually `base` followed by `suffix`.
    label: String,
}

impl SectionId {
    pub fn new(base: BaseOrderId, suffix: Option<char>) -> Self {
        let label = match suffix {
            Some(letter) => format!("{}{}", base, letter),
            None => base.to_string(),
        };
        Self {
            base,
            suffix,
            label,
        }
    }

    /// Section whose order number does not follow the `<base><letter>` shape.
    pub fn with_label(base: BaseOrderId, suffix: Option<char>, label: impl Into<String>) -> Self {
        Self {
            base,
            suffix,
            label: label.into(),
        }
    }

    /// Display order number, e.g. `DO-100B`.
    pub fn order_number(&self) -> String {
        self.label.clone()
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.order_number())
    }
}

/// Whether a line exists server-side or was added during an approval session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    Persisted,
    /// Not yet persisted; contributes nothing to budget ceilings.
    Synthetic,
}

impl LineOrigin {
    pub fn is_synthetic(self) -> bool {
        matches!(self, LineOrigin::Synthetic)
    }
}

/// Order-level metadata duplicated on every line of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub transport_type: String,
    pub payment_terms: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub delivery_address: String,
    pub credit_status: String,
    pub broker_name: String,
}

impl OrderMetadata {
    /// Metadata with every text field set to `placeholder`.
    pub fn placeholder(placeholder: &str) -> Self {
        Self {
            order_date: None,
            expected_delivery_date: None,
            transport_type: placeholder.to_string(),
            payment_terms: placeholder.to_string(),
            contact_person: placeholder.to_string(),
            contact_phone: placeholder.to_string(),
            delivery_address: placeholder.to_string(),
            credit_status: placeholder.to_string(),
            broker_name: placeholder.to_string(),
        }
    }
}

/// One demand line for one product on one order section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub line_id: LineId,
    pub section: SectionId,
    pub customer_name: String,
    pub category: Category,
    pub product_name: String,
    pub sku_name: Option<String>,
    /// Demand ceiling contributed by this line.
    pub ordered_qty: Decimal,
    /// Minimum acceptable price.
    pub unit_floor_rate: Decimal,
    pub origin: LineOrigin,
    pub metadata: OrderMetadata,
}

impl ProductLine {
    pub fn base_order(&self) -> &BaseOrderId {
        &self.section.base
    }

    pub fn order_number(&self) -> String {
        self.section.order_number()
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin.is_synthetic()
    }

    /// Quantity this line adds to its category's ceiling.
    pub fn budget_contribution(&self) -> Decimal {
        match self.origin {
            LineOrigin::Persisted => self.ordered_qty,
            LineOrigin::Synthetic => Decimal::ZERO,
        }
    }
}
