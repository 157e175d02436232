use serde::Serialize;

/// Errors raised by the engine's services and external collaborators.
///
/// Per-line allocation problems (a quantity over budget, a rate under the
/// floor) are not errors in this sense: they live in the session as
/// [`crate::models::allocation::LineDiagnostics`] and never abort a transition.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::FetchFailed(err.to_string())
    }
}

impl ServiceError {
    /// Whether the failure came from a collaborator and may succeed if the
    /// user repeats the action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed(_) | Self::SubmissionFailed(_) | Self::EventError(_)
        )
    }

    /// Short machine-readable code, carried on each failed line of a
    /// submission report.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::FetchFailed(_) => "fetch_failed",
            Self::SubmissionFailed(_) => "submission_failed",
            Self::EventError(_) => "event_error",
            Self::SerializationError(_) => "serialization_error",
            Self::Other(_) => "internal_error",
        }
    }
}
