//! Quantity allocation session for one base order.
//!
//! The session is a reducer: every [`SessionEvent`] is applied synchronously
//! and leaves the session with up-to-date per-line diagnostics. Quantity
//! checks are always recomputed from scratch over the whole group, so the
//! result does not depend on the order in which lines were edited.
//!
//! A line first draws from its own category's ceiling. When that pool is
//! short, the line may borrow unused headroom from other categories of the
//! same base order, as long as the order's combined ceiling is not exceeded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::ServiceError;
use crate::models::{
    AllocationEntry, BaseOrderGroup, Category, CategoryMatcher, LineDiagnostics, LineId,
    LineOrigin, ProductLine, QtyStatus, SectionId,
};
use crate::services::suffix::{next_suffix, occupied_suffixes};

/// How borrowed quantity is attributed to donor categories.
///
/// Whether borrowing is allowed at all only depends on the combined
/// remaining headroom of the other categories; the policy decides which of
/// them the notice reports as the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowPolicy {
    /// Take the whole shortfall from the donor with the smallest remainder
    /// that still covers it. If no single donor can, drain donors from the
    /// largest remainder down. Ties follow category declaration order.
    #[default]
    SmallestSufficientFirst,
    /// Drain donors in category declaration order.
    DeclaredOrder,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub borrow_policy: BorrowPolicy,
    pub currency_symbol: String,
    pub matcher: CategoryMatcher,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            borrow_policy: BorrowPolicy::default(),
            currency_symbol: "₹".to_string(),
            matcher: CategoryMatcher::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            borrow_policy: config.borrow_policy,
            currency_symbol: config.currency_symbol.clone(),
            matcher: CategoryMatcher::with_overrides(&config.category_keywords),
        }
    }
}

/// A product to add to the order as a new section during approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticLineDraft {
    /// Existing line whose section supplies the order context.
    pub template_line: LineId,
    pub product_name: String,
    #[serde(default)]
    pub sku_name: Option<String>,
    /// Inferred from the product name when absent.
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub unit_floor_rate: Decimal,
}

/// User edits applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Select { line_id: LineId },
    Deselect { line_id: LineId },
    SetSku { line_id: LineId, sku_name: String },
    SetApprovedQty { line_id: LineId, qty: Decimal },
    SetFinalRate { line_id: LineId, rate: Option<Decimal> },
    SetRemark { line_id: LineId, remark: String },
    AddSyntheticLine(SyntheticLineDraft),
    RemoveSyntheticLine { line_id: LineId },
}

/// Diagnostics of the line an event targeted, after the event was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub line_id: LineId,
    pub diagnostics: LineDiagnostics,
}

/// Budget usage of one category within the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub category: Category,
    pub budget: Decimal,
    pub approved: Decimal,
    pub remaining: Decimal,
}

/// A session-created line together with the section it was modelled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticLine {
    pub line: ProductLine,
    pub template_section: SectionId,
}

#[derive(Debug, Clone)]
pub struct AllocationSession {
    group: BaseOrderGroup,
    options: SessionOptions,
    synthetic: Vec<SyntheticLine>,
    entries: HashMap<LineId, AllocationEntry>,
    diagnostics: HashMap<LineId, LineDiagnostics>,
    /// Section letters consumed so far, including letters of removed
    /// synthetic lines.
    occupied: BTreeSet<char>,
}

impl AllocationSession {
    pub fn new(group: BaseOrderGroup, options: SessionOptions) -> Self {
        let occupied = occupied_suffixes(&group);
        Self {
            group,
            options,
            synthetic: Vec::new(),
            entries: HashMap::new(),
            diagnostics: HashMap::new(),
            occupied,
        }
    }

    pub fn group(&self) -> &BaseOrderGroup {
        &self.group
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Persisted lines in group order, then synthetic lines in creation order.
    pub fn lines(&self) -> impl Iterator<Item = &ProductLine> {
        self.group
            .all_lines
            .iter()
            .chain(self.synthetic.iter().map(|s| &s.line))
    }

    pub fn synthetic_lines(&self) -> &[SyntheticLine] {
        &self.synthetic
    }

    pub fn synthetic_line(&self, line_id: &LineId) -> Option<&SyntheticLine> {
        self.synthetic.iter().find(|s| &s.line.line_id == line_id)
    }

    pub fn line(&self, line_id: &LineId) -> Result<&ProductLine, ServiceError> {
        self.lines()
            .find(|l| &l.line_id == line_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "line {} is not part of base order {}",
                    line_id, self.group.base_order
                ))
            })
    }

    pub fn entry(&self, line_id: &LineId) -> Option<&AllocationEntry> {
        self.entries.get(line_id)
    }

    pub fn diagnostics(&self, line_id: &LineId) -> LineDiagnostics {
        self.diagnostics.get(line_id).cloned().unwrap_or_default()
    }

    pub fn is_selected(&self, line_id: &LineId) -> bool {
        self.entries.contains_key(line_id)
    }

    pub fn selected_lines(&self) -> impl Iterator<Item = &ProductLine> {
        self.lines()
            .filter(move |l| self.entries.contains_key(&l.line_id))
    }

    pub fn occupied_suffixes(&self) -> &BTreeSet<char> {
        &self.occupied
    }

    /// Applies one edit and returns the diagnostics of the targeted line.
    ///
    /// Errors are only returned for events that cannot apply (unknown line,
    /// line not selected, negative quantity). Budget and rate problems are
    /// recorded as diagnostics instead.
    pub fn apply(&mut self, event: SessionEvent) -> Result<TransitionOutcome, ServiceError> {
        let line_id = match event {
            SessionEvent::Select { line_id } => {
                let sku = self.line(&line_id)?.sku_name.clone();
                self.entries
                    .entry(line_id.clone())
                    .or_insert_with(|| AllocationEntry::new(sku));
                self.diagnostics.entry(line_id.clone()).or_default();
                debug!(line_id = %line_id, "Line selected");
                line_id
            }
            SessionEvent::Deselect { line_id } => {
                self.line(&line_id)?;
                self.entries.remove(&line_id);
                self.diagnostics.remove(&line_id);
                self.revalidate_quantities();
                debug!(line_id = %line_id, "Line deselected");
                line_id
            }
            SessionEvent::SetSku { line_id, sku_name } => {
                let entry = self.selected_entry_mut(&line_id)?;
                let trimmed = sku_name.trim();
                entry.chosen_sku = (!trimmed.is_empty()).then(|| trimmed.to_string());
                line_id
            }
            SessionEvent::SetApprovedQty { line_id, qty } => {
                self.set_approved_qty(&line_id, qty)?;
                line_id
            }
            SessionEvent::SetFinalRate { line_id, rate } => {
                self.set_final_rate(&line_id, rate)?;
                line_id
            }
            SessionEvent::SetRemark { line_id, remark } => {
                self.selected_entry_mut(&line_id)?.remark = remark;
                line_id
            }
            SessionEvent::AddSyntheticLine(draft) => self.add_synthetic_line(draft)?,
            SessionEvent::RemoveSyntheticLine { line_id } => {
                self.remove_synthetic_line(&line_id)?;
                line_id
            }
        };

        Ok(TransitionOutcome {
            diagnostics: self.diagnostics(&line_id),
            line_id,
        })
    }

    /// Applies events in order, stopping at the first that cannot apply.
    pub fn apply_all<I>(&mut self, events: I) -> Result<Vec<TransitionOutcome>, ServiceError>
    where
        I: IntoIterator<Item = SessionEvent>,
    {
        events.into_iter().map(|event| self.apply(event)).collect()
    }

    /// Discards every allocation, selection and synthetic line.
    pub fn reset(&mut self) {
        self.synthetic.clear();
        self.entries.clear();
        self.diagnostics.clear();
        self.occupied = occupied_suffixes(&self.group);
        debug!(base_order = %self.group.base_order, "Allocation session reset");
    }

    fn selected_entry_mut(&mut self, line_id: &LineId) -> Result<&mut AllocationEntry, ServiceError> {
        self.line(line_id)?;
        self.entries.get_mut(line_id).ok_or_else(|| {
            ServiceError::InvalidOperation(format!("line {} is not selected", line_id))
        })
    }

    fn set_approved_qty(&mut self, line_id: &LineId, qty: Decimal) -> Result<(), ServiceError> {
        if qty.is_sign_negative() && !qty.is_zero() {
            return Err(ServiceError::InvalidInput(format!(
                "approved quantity for line {} cannot be negative",
                line_id
            )));
        }
        self.selected_entry_mut(line_id)?.approved_qty = qty;
        self.revalidate_quantities();
        debug!(line_id = %line_id, qty = %qty, "Approved quantity set");
        Ok(())
    }

    fn set_final_rate(&mut self, line_id: &LineId, rate: Option<Decimal>) -> Result<(), ServiceError> {
        let floor = self.line(line_id)?.unit_floor_rate;
        self.selected_entry_mut(line_id)?.final_rate = rate;

        let rate_error = match rate {
            Some(value) if value < floor => Some(format!(
                "Minimum {}{}",
                self.options.currency_symbol, floor
            )),
            _ => None,
        };
        self.diagnostics.entry(line_id.clone()).or_default().rate_error = rate_error;
        Ok(())
    }

    fn add_synthetic_line(&mut self, draft: SyntheticLineDraft) -> Result<LineId, ServiceError> {
        let template = self.line(&draft.template_line)?.clone();
        if draft.product_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "a new line needs a product name".to_string(),
            ));
        }

        let letter = next_suffix(&self.occupied)?;
        self.occupied.insert(letter);

        let category = draft
            .category
            .unwrap_or_else(|| self.options.matcher.infer(&draft.product_name));
        let line = ProductLine {
            line_id: LineId::synthetic(),
            section: SectionId::new(self.group.base_order.clone(), Some(letter)),
            customer_name: self.group.customer_name.clone(),
            category,
            product_name: draft.product_name.trim().to_string(),
            sku_name: draft.sku_name.clone(),
            ordered_qty: Decimal::ZERO,
            unit_floor_rate: draft.unit_floor_rate,
            origin: LineOrigin::Synthetic,
            metadata: template.metadata.clone(),
        };
        let line_id = line.line_id.clone();

        info!(
            line_id = %line_id,
            order_number = %line.order_number(),
            category = %line.category,
            "Synthetic line added as new section"
        );

        self.entries
            .insert(line_id.clone(), AllocationEntry::new(draft.sku_name));
        self.diagnostics.insert(line_id.clone(), LineDiagnostics::default());
        self.synthetic.push(SyntheticLine {
            line,
            template_section: template.section,
        });
        Ok(line_id)
    }

    fn remove_synthetic_line(&mut self, line_id: &LineId) -> Result<(), ServiceError> {
        let position = self
            .synthetic
            .iter()
            .position(|s| &s.line.line_id == line_id)
            .ok_or_else(|| {
                ServiceError::InvalidOperation(format!("line {} is not a synthetic line", line_id))
            })?;
        self.synthetic.remove(position);
        self.entries.remove(line_id);
        self.diagnostics.remove(line_id);
        self.revalidate_quantities();
        Ok(())
    }

    /// Re-checks the quantity of every selected line against the current
    /// allocation map.
    fn revalidate_quantities(&mut self) {
        let statuses: Vec<(LineId, QtyStatus)> = self
            .selected_lines()
            .map(|line| {
                let requested = self.entries[&line.line_id].approved_qty;
                (line.line_id.clone(), self.evaluate_qty(line, requested))
            })
            .collect();

        for (line_id, status) in statuses {
            self.diagnostics.entry(line_id).or_default().qty = status;
        }
    }

    /// Sum of approved quantity in `category`, optionally leaving one line out.
    fn approved_in(&self, category: &Category, excluding: Option<&LineId>) -> Decimal {
        self.selected_lines()
            .filter(|l| &l.category == category && Some(&l.line_id) != excluding)
            .map(|l| self.entries[&l.line_id].approved_qty)
            .sum()
    }

    fn approved_total(&self, excluding: Option<&LineId>) -> Decimal {
        self.selected_lines()
            .filter(|l| Some(&l.line_id) != excluding)
            .map(|l| self.entries[&l.line_id].approved_qty)
            .sum()
    }

    fn evaluate_qty(&self, line: &ProductLine, requested: Decimal) -> QtyStatus {
        if requested <= Decimal::ZERO {
            return QtyStatus::Clear;
        }

        let category = &line.category;
        let budget = self.group.budget(category);
        let own_remaining = budget - self.approved_in(category, Some(&line.line_id));
        let own_usable = own_remaining.max(Decimal::ZERO);

        if requested <= own_usable {
            return QtyStatus::Notice(format!(
                "Using {} from {}'s {} budget",
                requested, category, budget
            ));
        }

        let shortfall = requested - own_usable;
        // every other selected line counts against the combined ceiling,
        // including lines in categories without a budget of their own
        let headroom = self.group.total_budget() - self.approved_total(Some(&line.line_id));
        let other_remaining_total = headroom - own_usable;

        let donors: Vec<(Category, Decimal)> = self
            .group
            .category_budgets
            .iter()
            .filter(|(other, other_budget)| *other != category && **other_budget > Decimal::ZERO)
            .map(|(other, other_budget)| (other.clone(), *other_budget - self.approved_in(other, None)))
            .collect();

        if other_remaining_total >= shortfall {
            let sources = attribute_borrowing(
                donors,
                other_remaining_total,
                shortfall,
                self.options.borrow_policy,
            );
            let borrowed = sources
                .iter()
                .map(|(donor, amount)| format!("{} from {}", amount, donor))
                .collect::<Vec<_>>()
                .join(", ");
            debug!(
                line_id = %line.line_id,
                category = %category,
                shortfall = %shortfall,
                sources = %borrowed,
                "Borrowing budget from other categories"
            );
            if own_usable > Decimal::ZERO {
                QtyStatus::Notice(format!(
                    "Using {} from {}'s {} budget and borrowing {}",
                    own_usable, category, budget, borrowed
                ))
            } else {
                QtyStatus::Notice(format!(
                    "{} budget exhausted; borrowing {}",
                    category, borrowed
                ))
            }
        } else {
            let available = headroom.max(Decimal::ZERO);
            QtyStatus::Error(format!(
                "Exceeds total available budget ({} available)",
                available
            ))
        }
    }

    /// Budget, approved and remaining quantity per category of the group,
    /// plus categories that only occur on synthetic lines.
    pub fn category_usage(&self) -> Vec<CategoryUsage> {
        let mut categories: Vec<Category> = self.group.category_budgets.keys().cloned().collect();
        for line in self.synthetic.iter().map(|s| &s.line) {
            if !categories.contains(&line.category) {
                categories.push(line.category.clone());
            }
        }

        categories
            .into_iter()
            .map(|category| {
                let budget = self.group.budget(&category);
                let approved = self.approved_in(&category, None);
                CategoryUsage {
                    remaining: budget - approved,
                    category,
                    budget,
                    approved,
                }
            })
            .collect()
    }

    /// Whether `line_id` can be included in a submission.
    pub fn is_eligible(&self, line_id: &LineId) -> bool {
        let (Ok(line), Some(entry)) = (self.line(line_id), self.entries.get(line_id)) else {
            return false;
        };
        let rate_ok = entry
            .final_rate
            .map_or(false, |rate| rate >= line.unit_floor_rate);
        rate_ok && entry.approved_qty > Decimal::ZERO && !self.diagnostics(line_id).has_error()
    }

    pub fn eligible_lines(&self) -> Vec<(&ProductLine, &AllocationEntry)> {
        self.selected_lines()
            .filter(|l| self.is_eligible(&l.line_id))
            .map(|l| (l, &self.entries[&l.line_id]))
            .collect()
    }

    /// True when any selected line carries a quantity or rate error.
    pub fn has_blocking_errors(&self) -> bool {
        self.selected_lines()
            .any(|l| self.diagnostics(&l.line_id).has_error())
    }

    pub fn can_submit(&self) -> bool {
        !self.has_blocking_errors() && !self.eligible_lines().is_empty()
    }
}

/// Splits `shortfall` across donor categories.
///
/// `available` is what is left of the combined ceiling outside the line's own
/// category. Donor remainders above it were already taken by lines in other
/// categories (the line's own, categories without a budget, or other donors
/// that overdrew); that excess is charged first, in declaration order, so it
/// is not reported twice. The caller guarantees `available >= shortfall`.
fn attribute_borrowing(
    mut donors: Vec<(Category, Decimal)>,
    available: Decimal,
    shortfall: Decimal,
    policy: BorrowPolicy,
) -> Vec<(Category, Decimal)> {
    let unclaimed: Decimal = donors
        .iter()
        .map(|(_, remaining)| (*remaining).max(Decimal::ZERO))
        .sum();
    let mut to_charge = unclaimed - available;
    for (_, remaining) in donors.iter_mut() {
        if to_charge <= Decimal::ZERO {
            break;
        }
        let taken = (*remaining).max(Decimal::ZERO).min(to_charge);
        *remaining -= taken;
        to_charge -= taken;
    }
    donors.retain(|(_, remaining)| *remaining > Decimal::ZERO);

    if policy == BorrowPolicy::SmallestSufficientFirst {
        let single = donors
            .iter()
            .filter(|(_, remaining)| *remaining >= shortfall)
            .min_by(|a, b| a.1.cmp(&b.1));
        if let Some((donor, _)) = single {
            return vec![(donor.clone(), shortfall)];
        }
        // stable sort keeps declaration order between equal remainders
        donors.sort_by(|a, b| b.1.cmp(&a.1));
    }

    let mut sources = Vec::new();
    let mut left = shortfall;
    for (donor, remaining) in donors {
        if left <= Decimal::ZERO {
            break;
        }
        let taken = remaining.min(left);
        sources.push((donor, taken));
        left -= taken;
    }
    sources
}
