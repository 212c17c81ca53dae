//! Outcome of a planner call

use super::error::PlannerError;
use crate::domain::StructuredPlan;

/// What `run_planner` / `resume_with_context` hand back to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerResult {
    /// The pipeline finished with a valid plan
    Completed(StructuredPlan),

    /// The pipeline is suspended at the HITL gate
    AwaitingInput { questions: Vec<String> },

    /// The run failed; the conversation can start over
    Failed(PlannerError),
}

impl PlannerResult {
    pub fn is_awaiting_input(&self) -> bool {
        matches!(self, Self::AwaitingInput { .. })
    }

    pub fn plan(&self) -> Option<&StructuredPlan> {
        match self {
            Self::Completed(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PlannerError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
