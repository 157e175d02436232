use rust_decimal::Decimal;

use crate::models::{CategoryBudgets, ProductLine};

/// Per-category ceiling over `lines`: the sum of ordered quantity of every
/// persisted line. Synthetic lines are skipped entirely, so a category that
/// only appears on synthetic lines has no entry.
///
/// Always recomputed in full; approvals made during a session are tracked by
/// the allocator, never folded into this ceiling.
pub fn category_budgets<'a, I>(lines: I) -> CategoryBudgets
where
    I: IntoIterator<Item = &'a ProductLine>,
{
    let mut budgets = CategoryBudgets::new();
    for line in lines.into_iter().filter(|l| !l.is_synthetic()) {
        *budgets
            .entry(line.category.clone())
            .or_insert(Decimal::ZERO) += line.budget_contribution();
    }
    budgets
}
