//! Turns an allocation session into per-line write calls.
//!
//! Only eligible lines produce payloads. Each line is written independently:
//! one failure is recorded in the report and never rolls back lines that
//! already succeeded. No retries are attempted.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{AllocationEntry, BaseOrderId, LineId, OrderMetadata, ProductLine};
use crate::services::allocator::AllocationSession;

/// Write payload for one approved line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePayload {
    pub line_id: LineId,
    pub order_number: String,
    pub sku_name: String,
    pub product_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub approval_qty: Decimal,
    /// Same as `final_rate`; both fields are expected by the persistence layer.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate_per_unit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate_floor: Decimal,
    pub remark: Option<String>,
}

/// Order-creation payload for a section synthesised during the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPayload {
    pub order_number: String,
    pub base_order: BaseOrderId,
    pub customer_name: String,
    /// Section whose context was copied.
    pub source_order_number: String,
    #[serde(flatten)]
    pub metadata: OrderMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionItem {
    pub line_id: LineId,
    pub section: Option<SectionPayload>,
    pub line: LinePayload,
}

/// Persistence collaborator. Each call is expected to be atomic on its own.
#[async_trait]
pub trait DispatchSink: Send + Sync {
    async fn create_section(&self, payload: &SectionPayload) -> Result<(), ServiceError>;

    async fn submit_line(&self, payload: &LinePayload) -> Result<(), ServiceError>;
}

/// Builds payloads for every eligible line, in session line order.
pub fn assemble_submission(session: &AllocationSession) -> Vec<SubmissionItem> {
    session
        .eligible_lines()
        .into_iter()
        .filter_map(|(line, entry)| {
            let final_rate = entry.final_rate?;
            let section = session.synthetic_line(&line.line_id).map(|synthetic| SectionPayload {
                order_number: line.order_number(),
                base_order: line.base_order().clone(),
                customer_name: line.customer_name.clone(),
                source_order_number: synthetic.template_section.order_number(),
                metadata: line.metadata.clone(),
            });
            Some(SubmissionItem {
                line_id: line.line_id.clone(),
                section,
                line: line_payload(line, entry, final_rate),
            })
        })
        .collect()
}

fn line_payload(line: &ProductLine, entry: &AllocationEntry, final_rate: Decimal) -> LinePayload {
    let sku_name = entry
        .chosen_sku
        .clone()
        .or_else(|| line.sku_name.clone())
        .unwrap_or_else(|| line.product_name.clone());
    let remark = entry.remark.trim();

    LinePayload {
        line_id: line.line_id.clone(),
        order_number: line.order_number(),
        sku_name,
        product_name: line.product_name.clone(),
        approval_qty: entry.approved_qty,
        rate_per_unit: final_rate,
        final_rate,
        rate_floor: line.unit_floor_rate,
        remark: (!remark.is_empty()).then(|| remark.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    pub line_id: LineId,
    pub order_number: String,
    /// [`ServiceError::code`] of the failure.
    pub code: &'static str,
    pub reason: String,
    /// Section that was created before the line write failed. It exists on
    /// the sink and must not be created again on a retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_section: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    pub succeeded: Vec<LineId>,
    pub failed: Vec<LineFailure>,
}

impl SubmissionReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!("{} line(s) submitted", self.succeeded.len())
        } else {
            format!("{} failed, check details", self.failed.len())
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Maximum writes in flight; `1` submits strictly one line at a time.
    pub concurrency: usize,
    pub events: Option<EventSender>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            events: None,
        }
    }
}

/// Submits every eligible line of `session` through `sink`.
///
/// Refuses to start while any selected line has an error or when nothing is
/// eligible. Results are reported in session line order whatever the
/// concurrency.
#[instrument(skip(session, sink, options), fields(base_order = %session.group().base_order))]
pub async fn submit_session(
    session: &AllocationSession,
    sink: &dyn DispatchSink,
    options: &SubmitOptions,
) -> Result<SubmissionReport, ServiceError> {
    if session.has_blocking_errors() {
        return Err(ServiceError::ValidationError(
            "resolve the errors on selected lines before submitting".to_string(),
        ));
    }
    let items = assemble_submission(session);
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "no selected line is ready for submission".to_string(),
        ));
    }

    let mut outcomes: Vec<(usize, SubmissionItem, ItemOutcome)> = if options.concurrency <= 1 {
        let mut outcomes = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let outcome = submit_item(sink, &item, options).await;
            outcomes.push((position, item, outcome));
        }
        outcomes
    } else {
        stream::iter(items.into_iter().enumerate())
            .map(|(position, item)| async move {
                let outcome = submit_item(sink, &item, options).await;
                (position, item, outcome)
            })
            .buffer_unordered(options.concurrency)
            .collect()
            .await
    };
    outcomes.sort_by_key(|(position, _, _)| *position);

    let mut report = SubmissionReport::default();
    for (_, item, outcome) in outcomes {
        let order_number = item.line.order_number.clone();
        match outcome.result {
            Ok(()) => {
                publish(
                    options,
                    Event::AllocationSubmitted {
                        line_id: item.line_id.clone(),
                        order_number,
                        approved_qty: item.line.approval_qty,
                        final_rate: item.line.final_rate,
                        timestamp: Utc::now(),
                    },
                )
                .await;
                report.succeeded.push(item.line_id);
            }
            Err(e) => {
                error!(line_id = %item.line_id, error = %e, "Failed to submit allocation");
                publish(
                    options,
                    Event::SubmissionFailed {
                        line_id: item.line_id.clone(),
                        order_number: order_number.clone(),
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    },
                )
                .await;
                report.failed.push(LineFailure {
                    line_id: item.line_id,
                    order_number,
                    code: e.code(),
                    reason: e.to_string(),
                    created_section: outcome.created_section,
                });
            }
        }
    }

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Submission finished"
    );
    Ok(report)
}

struct ItemOutcome {
    /// Order number of a section written for this item, even if the line
    /// write then failed.
    created_section: Option<String>,
    result: Result<(), ServiceError>,
}

async fn submit_item(
    sink: &dyn DispatchSink,
    item: &SubmissionItem,
    options: &SubmitOptions,
) -> ItemOutcome {
    let mut created_section = None;
    if let Some(section) = &item.section {
        if let Err(e) = sink.create_section(section).await {
            return ItemOutcome {
                created_section,
                result: Err(ServiceError::SubmissionFailed(format!(
                    "could not create section {}: {}",
                    section.order_number, e
                ))),
            };
        }
        publish(
            options,
            Event::SectionCreated {
                order_number: section.order_number.clone(),
                base_order: section.base_order.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;
        created_section = Some(section.order_number.clone());
    }
    ItemOutcome {
        created_section,
        result: sink.submit_line(&item.line).await,
    }
}

async fn publish(options: &SubmitOptions, event: Event) {
    if let Some(sender) = &options.events {
        if let Err(e) = sender.send(event).await {
            warn!(error = %e, code = e.code(), "Dropping submission event");
        }
    }
}

/// Sink that records payloads in memory. Lines or sections can be told to
/// fail, which makes it usable for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    sections: Mutex<Vec<SectionPayload>>,
    lines: Mutex<Vec<LinePayload>>,
    failing_lines: HashSet<LineId>,
    failing_sections: HashSet<String>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_line(mut self, line_id: LineId) -> Self {
        self.failing_lines.insert(line_id);
        self
    }

    pub fn failing_section(mut self, order_number: impl Into<String>) -> Self {
        self.failing_sections.insert(order_number.into());
        self
    }

    pub async fn submitted_lines(&self) -> Vec<LinePayload> {
        self.lines.lock().await.clone()
    }

    pub async fn created_sections(&self) -> Vec<SectionPayload> {
        self.sections.lock().await.clone()
    }
}

#[async_trait]
impl DispatchSink for InMemorySink {
    async fn create_section(&self, payload: &SectionPayload) -> Result<(), ServiceError> {
        if self.failing_sections.contains(&payload.order_number) {
            return Err(ServiceError::SubmissionFailed(format!(
                "section {} rejected",
                payload.order_number
            )));
        }
        self.sections.lock().await.push(payload.clone());
        Ok(())
    }

    async fn submit_line(&self, payload: &LinePayload) -> Result<(), ServiceError> {
        if self.failing_lines.contains(&payload.line_id) {
            return Err(ServiceError::SubmissionFailed(format!(
                "line {} rejected",
                payload.line_id
            )));
        }
        self.lines.lock().await.push(payload.clone());
        Ok(())
    }
}
