// Record intake
pub mod normalizer;
pub mod order_key;
pub mod source;

// Aggregation
pub mod budget;
pub mod grouping;

// Allocation
pub mod allocator;
pub mod suffix;

// Persistence
pub mod submission;

pub use allocator::{
    AllocationSession, BorrowPolicy, CategoryUsage, SessionEvent, SessionOptions,
    SyntheticLineDraft, TransitionOutcome,
};
pub use grouping::group_lines;
pub use normalizer::RecordNormalizer;
pub use source::{load_pending_groups, InMemorySource, JsonFileSource, PendingOrderSource};
pub use submission::{
    assemble_submission, submit_session, DispatchSink, InMemorySink, LinePayload,
    SectionPayload, SubmissionReport, SubmitOptions,
};
