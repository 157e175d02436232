pub mod allocation;
pub mod category;
pub mod order_group;
pub mod product_line;
pub mod stage;

pub use allocation::{AllocationEntry, LineDiagnostics, QtyStatus};
pub use category::{Category, CategoryMatcher};
pub use order_group::{BaseOrderGroup, CategoryBudgets, CustomerGroup, OrderGrouping, Section};
pub use product_line::{BaseOrderId, LineId, LineOrigin, OrderMetadata, ProductLine, SectionId};
pub use stage::WorkflowStage;
