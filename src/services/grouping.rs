//! Folds flat product lines into customer → base order → section buckets.

use std::collections::HashMap;
use tracing::debug;

use crate::models::{
    BaseOrderGroup, BaseOrderId, CustomerGroup, OrderGrouping, ProductLine, Section, SectionId,
};
use crate::services::budget::category_budgets;

/// Groups `lines` in a single left-to-right pass.
///
/// Buckets keep first-seen order at every level so the output is a pure
/// function of the input sequence. Category budgets are computed per base
/// order once the fold is complete.
pub fn group_lines<I>(lines: I) -> OrderGrouping
where
    I: IntoIterator<Item = ProductLine>,
{
    let mut customers: Vec<CustomerGroup> = Vec::new();
    let mut customer_index: HashMap<String, usize> = HashMap::new();
    let mut order_index: HashMap<(usize, BaseOrderId), usize> = HashMap::new();
    let mut section_index: HashMap<(usize, usize, SectionId), usize> = HashMap::new();

    for line in lines {
        let ci = *customer_index
            .entry(line.customer_name.clone())
            .or_insert_with(|| {
                customers.push(CustomerGroup {
                    customer_name: line.customer_name.clone(),
                    orders: Vec::new(),
                });
                customers.len() - 1
            });
        let customer = &mut customers[ci];

        let oi = *order_index
            .entry((ci, line.base_order().clone()))
            .or_insert_with(|| {
                customer.orders.push(BaseOrderGroup {
                    base_order: line.base_order().clone(),
                    customer_name: line.customer_name.clone(),
                    metadata: line.metadata.clone(),
                    sections: Vec::new(),
                    all_lines: Vec::new(),
                    category_budgets: Default::default(),
                });
                customer.orders.len() - 1
            });
        let group = &mut customer.orders[oi];

        let si = *section_index
            .entry((ci, oi, line.section.clone()))
            .or_insert_with(|| {
                group.sections.push(Section {
                    id: line.section.clone(),
                    metadata: line.metadata.clone(),
                    lines: Vec::new(),
                });
                group.sections.len() - 1
            });

        group.sections[si].lines.push(line.clone());
        group.all_lines.push(line);
    }

    for group in customers.iter_mut().flat_map(|c| c.orders.iter_mut()) {
        group.category_budgets = category_budgets(&group.all_lines);
        debug!(
            base_order = %group.base_order,
            customer = %group.customer_name,
            sections = group.sections.len(),
            lines = group.all_lines.len(),
            "Grouped base order"
        );
    }

    OrderGrouping { customers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, LineId, LineOrigin, OrderMetadata};
    use crate::services::order_key::resolve_section;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn line(id: &str, customer: &str, order: &str, category: Category, qty: Decimal) -> ProductLine {
        let mut metadata = OrderMetadata::placeholder("—");
        metadata.transport_type = format!("truck-{}", id);
        ProductLine {
            line_id: LineId::new(id),
            section: resolve_section(order),
            customer_name: customer.into(),
            category,
            product_name: format!("product {}", id),
            sku_name: None,
            ordered_qty: qty,
            unit_floor_rate: dec!(10),
            origin: LineOrigin::Persisted,
            metadata,
        }
    }

    #[test]
    fn test_sections_share_base_order() {
        let grouping = group_lines(vec![
            line("1", "Amar", "DO-5A", Category::Palm, dec!(100)),
            line("2", "Amar", "DO-5B", Category::Palm, dec!(50)),
        ]);

        assert_eq!(grouping.customers.len(), 1);
        let orders = &grouping.customers[0].orders;
        assert_eq!(orders.len(), 1);
        let group = &orders[0];
        assert_eq!(group.base_order.as_str(), "DO-5");
        assert_eq!(group.sections.len(), 2);
        assert_eq!(group.sections[0].order_number(), "DO-5A");
        assert_eq!(group.sections[1].order_number(), "DO-5B");
        assert_eq!(group.line_count(), 2);
        assert_eq!(group.budget(&Category::Palm), dec!(150));
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let grouping = group_lines(vec![
            line("1", "Zeta", "DO-9A", Category::Soya, dec!(1)),
            line("2", "Amar", "DO-3", Category::Soya, dec!(1)),
            line("3", "Zeta", "DO-2", Category::Soya, dec!(1)),
            line("4", "Zeta", "DO-9B", Category::Soya, dec!(1)),
            line("5", "Zeta", "DO-9A", Category::Soya, dec!(1)),
        ]);

        let names: Vec<_> = grouping.customers.iter().map(|c| c.customer_name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Amar"]);

        let zeta = grouping.customer("Zeta").unwrap();
        let bases: Vec<_> = zeta.orders.iter().map(|o| o.base_order.as_str()).collect();
        assert_eq!(bases, vec!["DO-9", "DO-2"]);

        let do9 = &zeta.orders[0];
        let section_a: Vec<_> = do9.sections[0].lines.iter().map(|l| l.line_id.as_str()).collect();
        assert_eq!(section_a, vec!["1", "5"]);
        let all: Vec<_> = do9.all_lines.iter().map(|l| l.line_id.as_str()).collect();
        assert_eq!(all, vec!["1", "4", "5"]);
    }

    #[test]
    fn test_metadata_comes_from_first_line() {
        let grouping = group_lines(vec![
            line("1", "Amar", "DO-5A", Category::Palm, dec!(1)),
            line("2", "Amar", "DO-5B", Category::Palm, dec!(1)),
            line("3", "Amar", "DO-5B", Category::Palm, dec!(1)),
        ]);
        let group = &grouping.customers[0].orders[0];
        assert_eq!(group.metadata.transport_type, "truck-1");
        assert_eq!(group.sections[1].metadata.transport_type, "truck-2");
    }

    #[test]
    fn test_same_base_under_different_customers_is_split() {
        let grouping = group_lines(vec![
            line("1", "Amar", "DO-5A", Category::Palm, dec!(10)),
            line("2", "Bharat", "DO-5B", Category::Palm, dec!(20)),
        ]);
        assert_eq!(grouping.customers.len(), 2);
        let base = BaseOrderId::new("DO-5");
        assert_eq!(
            grouping.find_base_order(&base, Some("Bharat")).unwrap().budget(&Category::Palm),
            dec!(20)
        );
    }

    #[test]
    fn test_budgets_per_category() {
        let grouping = group_lines(vec![
            line("1", "Amar", "DO-5A", Category::Palm, dec!(100)),
            line("2", "Amar", "DO-5A", Category::Soya, dec!(50)),
            line("3", "Amar", "DO-5B", Category::Soya, dec!(25)),
        ]);
        let group = &grouping.customers[0].orders[0];
        assert_eq!(group.budget(&Category::Palm), dec!(100));
        assert_eq!(group.budget(&Category::Soya), dec!(75));
        assert_eq!(group.total_budget(), dec!(175));
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let input = vec![
            line("1", "Amar", "DO-5A", Category::Palm, dec!(100)),
            line("2", "Amar", "DO-6", Category::Soya, dec!(50)),
        ];
        assert_eq!(group_lines(input.clone()), group_lines(input));
    }

    #[test]
    fn test_empty_input_yields_empty_grouping() {
        assert!(group_lines(Vec::<ProductLine>::new()).is_empty());
    }
}
