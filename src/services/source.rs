//! Pending-order collaborators and the fetch → normalize → group pipeline.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info, instrument};

use crate::errors::ServiceError;
use crate::models::{OrderGrouping, WorkflowStage};
use crate::services::grouping::group_lines;
use crate::services::normalizer::RecordNormalizer;

/// Supplies the raw pending records for a workflow stage.
#[async_trait]
pub trait PendingOrderSource: Send + Sync {
    async fn fetch_pending(&self, stage: WorkflowStage) -> Result<Vec<Value>, ServiceError>;
}

/// Fetches, normalizes and groups the pending records of `stage`.
///
/// A failed fetch is logged and yields an empty grouping so the caller can
/// keep rendering.
#[instrument(skip(source, normalizer))]
pub async fn load_pending_groups(
    source: &dyn PendingOrderSource,
    stage: WorkflowStage,
    normalizer: &RecordNormalizer,
) -> OrderGrouping {
    match source.fetch_pending(stage).await {
        Ok(records) => {
            let lines = normalizer.normalize_batch(&records);
            let grouping = group_lines(lines);
            info!(
                records = records.len(),
                customers = grouping.customers.len(),
                lines = grouping.line_count(),
                "Loaded pending orders"
            );
            grouping
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch pending orders");
            OrderGrouping::default()
        }
    }
}

/// Reads pending records from a JSON file.
///
/// The document may be a bare array of records, an object keyed by stage
/// name (`"approval": [...]`), or an envelope with a `data` array.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PendingOrderSource for JsonFileSource {
    async fn fetch_pending(&self, stage: WorkflowStage) -> Result<Vec<Value>, ServiceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ServiceError::FetchFailed(format!("{}: {}", self.path.display(), e))
        })?;
        let document: Value = serde_json::from_str(&raw)?;
        records_for_stage(document, stage)
    }
}

fn records_for_stage(document: Value, stage: WorkflowStage) -> Result<Vec<Value>, ServiceError> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => {
            let key = stage.to_string();
            match map.remove(&key).or_else(|| map.remove("data")) {
                Some(Value::Array(records)) => Ok(records),
                Some(_) => Err(ServiceError::FetchFailed(format!(
                    "records for {} are not an array",
                    key
                ))),
                None => Ok(Vec::new()),
            }
        }
        _ => Err(ServiceError::FetchFailed(
            "pending order document must be an array or an object".to_string(),
        )),
    }
}

/// Source backed by records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: HashMap<WorkflowStage, Vec<Value>>,
    unavailable: bool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, stage: WorkflowStage, records: Vec<Value>) -> Self {
        self.records.entry(stage).or_default().extend(records);
        self
    }

    /// Makes every fetch fail.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PendingOrderSource for InMemorySource {
    async fn fetch_pending(&self, stage: WorkflowStage) -> Result<Vec<Value>, ServiceError> {
        if self.unavailable {
            return Err(ServiceError::FetchFailed(format!(
                "pending orders for {} are unavailable",
                stage
            )));
        }
        Ok(self.records.get(&stage).cloned().unwrap_or_default())
    }
}
