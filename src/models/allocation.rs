use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-line approval state, created when the line is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub chosen_sku: Option<String>,
    pub approved_qty: Decimal,
    /// `None` while the rate field is empty.
    pub final_rate: Option<Decimal>,
    pub remark: String,
}

impl AllocationEntry {
    pub fn new(chosen_sku: Option<String>) -> Self {
        Self {
            chosen_sku,
            approved_qty: Decimal::ZERO,
            final_rate: None,
            remark: String::new(),
        }
    }
}

/// Outcome of quantity validation for one line. Errors and notices are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum QtyStatus {
    Clear,
    Notice(String),
    Error(String),
}

impl QtyStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, QtyStatus::Error(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            QtyStatus::Clear => None,
            QtyStatus::Notice(msg) | QtyStatus::Error(msg) => Some(msg),
        }
    }
}

impl Default for QtyStatus {
    fn default() -> Self {
        QtyStatus::Clear
    }
}

/// Diagnostics currently attached to a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiagnostics {
    pub qty: QtyStatus,
    pub rate_error: Option<String>,
}

impl LineDiagnostics {
    pub fn has_error(&self) -> bool {
        self.qty.is_error() || self.rate_error.is_some()
    }

    pub fn notice(&self) -> Option<&str> {
        match &self.qty {
            QtyStatus::Notice(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn errors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let QtyStatus::Error(msg) = &self.qty {
            out.push(msg.as_str());
        }
        if let Some(msg) = &self.rate_error {
            out.push(msg.as_str());
        }
        out
    }
}
