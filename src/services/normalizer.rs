//! Maps raw pending-order records into [`ProductLine`]s.
//!
//! Sources disagree on field naming (`order_no`, `orderNo`, `Order No.`,
//! `DO Number`, ...). Keys are canonicalised by lowercasing and dropping
//! everything that is not a letter or digit, then looked up against a list
//! of aliases per field. Normalisation never fails: missing or unusable
//! values fall back to the placeholder text, zero, or `false`.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::models::{
    Category, CategoryMatcher, LineId, LineOrigin, OrderMetadata, ProductLine,
};
use crate::services::order_key::resolve_section;

pub const DEFAULT_PLACEHOLDER: &str = "—";

const LINE_ID: &[&str] = &["lineid", "id", "productlineid", "rowid", "uuid"];
const ORDER_NUMBER: &[&str] = &[
    "ordernumber",
    "orderno",
    "donumber",
    "dono",
    "ordernum",
    "deliveryorderno",
    "order",
];
const CUSTOMER_NAME: &[&str] = &[
    "customername",
    "customer",
    "partyname",
    "party",
    "clientname",
    "buyer",
];
const CATEGORY: &[&str] = &[
    "category",
    "oiltype",
    "commodity",
    "commoditytype",
    "producttype",
];
const PRODUCT_NAME: &[&str] = &[
    "productname",
    "product",
    "itemname",
    "item",
    "productdescription",
];
const SKU_NAME: &[&str] = &["skuname", "sku", "skucode"];
const ORDERED_QTY: &[&str] = &[
    "orderedqty",
    "orderedquantity",
    "quantity",
    "qty",
    "orderqty",
    "totalqty",
    "qtyinmt",
];
const UNIT_FLOOR_RATE: &[&str] = &[
    "unitfloorrate",
    "floorrate",
    "ratefloor",
    "minrate",
    "rateperunit",
    "rate",
];
const IS_SYNTHETIC: &[&str] = &["issynthetic", "synthetic", "isnew", "newline"];
const ORDER_DATE: &[&str] = &["orderdate", "date", "createdat", "timestamp"];
const EXPECTED_DELIVERY: &[&str] = &[
    "expecteddeliverydate",
    "deliverydate",
    "expecteddelivery",
    "dispatchdate",
];
const TRANSPORT_TYPE: &[&str] = &["transporttype", "transport", "modeoftransport"];
const PAYMENT_TERMS: &[&str] = &["paymentterms", "paymentterm", "terms", "creditdays"];
const CONTACT_PERSON: &[&str] = &["contactperson", "contactname"];
const CONTACT_PHONE: &[&str] = &["contactphone", "contactnumber", "phone", "mobile"];
const DELIVERY_ADDRESS: &[&str] = &["deliveryaddress", "shiptoaddress", "address"];
const CREDIT_STATUS: &[&str] = &["creditstatus", "creditcheck", "credit"];
const BROKER_NAME: &[&str] = &["brokername", "broker", "agentname"];

/// Record → [`ProductLine`] mapper.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    matcher: CategoryMatcher,
    placeholder: String,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(CategoryMatcher::default(), DEFAULT_PLACEHOLDER)
    }
}

impl RecordNormalizer {
    pub fn new(matcher: CategoryMatcher, placeholder: impl Into<String>) -> Self {
        Self {
            matcher,
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            CategoryMatcher::with_overrides(&config.category_keywords),
            config.placeholder.clone(),
        )
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Normalises one record. A record without an id gets a deterministic one
    /// derived from its order number and product name.
    pub fn normalize(&self, record: &Map<String, Value>) -> ProductLine {
        let view = RecordView::new(record);

        let order_number = view.text(ORDER_NUMBER).unwrap_or_else(|| self.placeholder.clone());
        let product_name = view.text(PRODUCT_NAME).unwrap_or_else(|| self.placeholder.clone());
        let category = match view.text(CATEGORY) {
            Some(label) => match self.matcher.infer(&label) {
                Category::Unknown => Category::from_label(&label),
                known => known,
            },
            None => self.matcher.infer(&product_name),
        };
        let line_id = view
            .text(LINE_ID)
            .map(LineId::new)
            .unwrap_or_else(|| LineId::new(format!("{}/{}", order_number, product_name)));
        let origin = if view.flag(IS_SYNTHETIC) {
            LineOrigin::Synthetic
        } else {
            LineOrigin::Persisted
        };

        let line = ProductLine {
            line_id,
            section: resolve_section(&order_number),
            customer_name: view.text(CUSTOMER_NAME).unwrap_or_else(|| self.placeholder.clone()),
            category,
            product_name,
            sku_name: view.text(SKU_NAME),
            ordered_qty: view.quantity(ORDERED_QTY),
            unit_floor_rate: view.quantity(UNIT_FLOOR_RATE),
            origin,
            metadata: self.metadata(&view),
        };
        debug!(
            line_id = %line.line_id,
            order_number = %order_number,
            category = %line.category,
            "Normalized pending order record"
        );
        line
    }

    /// Normalises a JSON array. Non-object elements are skipped; duplicate
    /// line ids are disambiguated with their position.
    pub fn normalize_batch(&self, records: &[Value]) -> Vec<ProductLine> {
        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            let Some(object) = record.as_object() else {
                warn!(position, "Skipping pending order record that is not an object");
                continue;
            };
            let mut line = self.normalize(object);
            if !seen.insert(line.line_id.clone()) {
                line.line_id = LineId::new(format!("{}#{}", line.line_id, position));
                seen.insert(line.line_id.clone());
            }
            lines.push(line);
        }
        lines
    }

    fn metadata(&self, view: &RecordView<'_>) -> OrderMetadata {
        let text = |aliases: &[&str]| view.text(aliases).unwrap_or_else(|| self.placeholder.clone());
        OrderMetadata {
            order_date: view.date(ORDER_DATE),
            expected_delivery_date: view.date(EXPECTED_DELIVERY),
            transport_type: text(TRANSPORT_TYPE),
            payment_terms: text(PAYMENT_TERMS),
            contact_person: text(CONTACT_PERSON),
            contact_phone: text(CONTACT_PHONE),
            delivery_address: text(DELIVERY_ADDRESS),
            credit_status: text(CREDIT_STATUS),
            broker_name: text(BROKER_NAME),
        }
    }
}

/// Canonicalises a field name: lowercase ASCII letters and digits only.
fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

struct RecordView<'a> {
    fields: HashMap<String, &'a Value>,
}

impl<'a> RecordView<'a> {
    fn new(record: &'a Map<String, Value>) -> Self {
        let mut fields = HashMap::with_capacity(record.len());
        for (key, value) in record {
            // first spelling of a key wins
            fields.entry(canonical_key(key)).or_insert(value);
        }
        Self { fields }
    }

    fn lookup(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases
            .iter()
            .filter_map(|alias| self.fields.get(*alias).copied())
            .find(|value| !is_blank(value))
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        match self.lookup(aliases)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Non-negative decimal; anything unusable is zero.
    fn quantity(&self, aliases: &[&str]) -> Decimal {
        let parsed = match self.lookup(aliases) {
            Some(Value::Number(n)) => parse_decimal(&n.to_string()),
            Some(Value::String(s)) => parse_decimal(s),
            _ => None,
        };
        match parsed {
            Some(value) if !value.is_sign_negative() => value,
            _ => Decimal::ZERO,
        }
    }

    fn flag(&self, aliases: &[&str]) -> bool {
        match self.lookup(aliases) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "y" | "1"
            ),
            _ => false,
        }
    }

    fn date(&self, aliases: &[&str]) -> Option<NaiveDate> {
        let raw = self.text(aliases)?;
        parse_date(&raw)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || t.eq_ignore_ascii_case("null") || t.eq_ignore_ascii_case("undefined")
        }
        _ => false,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}
