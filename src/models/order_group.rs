//! Hierarchical view over product lines: customer → base order → section.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::category::Category;
use super::product_line::{BaseOrderId, OrderMetadata, ProductLine, SectionId};

/// Per-category allocation ceiling of one base order.
pub type CategoryBudgets = BTreeMap<Category, Decimal>;

/// Lines sharing one exact order number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    /// Copied from the first line seen for this section.
    pub metadata: OrderMetadata,
    pub lines: Vec<ProductLine>,
}

impl Section {
    pub fn order_number(&self) -> String {
        self.id.order_number()
    }
}

/// All sections of one base order for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseOrderGroup {
    pub base_order: BaseOrderId,
    pub customer_name: String,
    pub metadata: OrderMetadata,
    pub sections: Vec<Section>,
    pub all_lines: Vec<ProductLine>,
    pub category_budgets: CategoryBudgets,
}

impl BaseOrderGroup {
    pub fn line_count(&self) -> usize {
        self.all_lines.len()
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub fn line(&self, line_id: &super::product_line::LineId) -> Option<&ProductLine> {
        self.all_lines.iter().find(|l| &l.line_id == line_id)
    }

    pub fn budget(&self, category: &Category) -> Decimal {
        self.category_budgets
            .get(category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_budget(&self) -> Decimal {
        self.category_budgets.values().copied().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub customer_name: String,
    pub orders: Vec<BaseOrderGroup>,
}

impl CustomerGroup {
    pub fn line_count(&self) -> usize {
        self.orders.iter().map(BaseOrderGroup::line_count).sum()
    }
}

/// Result of grouping one fetched batch, in first-seen order at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGrouping {
    pub customers: Vec<CustomerGroup>,
}

impl OrderGrouping {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn customer(&self, name: &str) -> Option<&CustomerGroup> {
        self.customers.iter().find(|c| c.customer_name == name)
    }

    pub fn base_orders(&self) -> impl Iterator<Item = &BaseOrderGroup> {
        self.customers.iter().flat_map(|c| c.orders.iter())
    }

    /// First group for `base_order`, optionally narrowed to one customer.
    pub fn find_base_order(
        &self,
        base_order: &BaseOrderId,
        customer: Option<&str>,
    ) -> Option<&BaseOrderGroup> {
        self.base_orders().find(|g| {
            &g.base_order == base_order && customer.map_or(true, |c| g.customer_name == c)
        })
    }

    pub fn line_count(&self) -> usize {
        self.customers.iter().map(CustomerGroup::line_count).sum()
    }
}
