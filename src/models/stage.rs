use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Stages of the dispatch workflow, in processing order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WorkflowStage {
    OrderPunch,
    PreApproval,
    Approval,
    Dispatch,
    Security,
    Invoicing,
    GateOut,
}

impl WorkflowStage {
    /// The stage a record moves to once this one is done; `None` after gate-out.
    pub fn next(self) -> Option<WorkflowStage> {
        WorkflowStage::iter().skip_while(|s| *s != self).nth(1)
    }

    /// Stages at which approved quantities are allocated against budgets.
    pub fn allocates_quantity(self) -> bool {
        matches!(self, WorkflowStage::PreApproval | WorkflowStage::Approval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_next_follows_workflow_order() {
        assert_eq!(
            WorkflowStage::OrderPunch.next(),
            Some(WorkflowStage::PreApproval)
        );
        assert_eq!(WorkflowStage::Invoicing.next(), Some(WorkflowStage::GateOut));
        assert_eq!(WorkflowStage::GateOut.next(), None);
    }

    #[test]
    fn test_kebab_case_round_trip() {
        assert_eq!(WorkflowStage::PreApproval.to_string(), "pre-approval");
        assert_eq!(
            WorkflowStage::from_str("gate-out").unwrap(),
            WorkflowStage::GateOut
        );
        assert!(WorkflowStage::from_str("shipping").is_err());
    }

    #[test]
    fn test_only_approval_stages_allocate() {
        let allocating: Vec<_> = WorkflowStage::iter()
            .filter(|s| s.allocates_quantity())
            .collect();
        assert_eq!(
            allocating,
            vec![WorkflowStage::PreApproval, WorkflowStage::Approval]
        );
    }
}
