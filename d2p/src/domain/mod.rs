//! Domain types for dump2plan
//!
//! Plain value records passed between pipeline stages:
//! UserInput -> ExtractedIdeas -> (ClarifiedContext) -> ProjectStructure -> StructuredPlan.
//!
//! Records are immutable once built. A stage that needs a modified version of a
//! record constructs a new one. Structural invariants live in [`validation`].

mod context;
mod ideas;
mod plan;
mod priority;
pub mod validation;

pub use context::ClarifiedContext;
pub use ideas::{ExtractedIdeas, UserInput};
pub use plan::{Milestone, PlanShape, ProjectStructure, StructuredPlan, Task};
pub use priority::Priority;
pub use validation::{
    CompletenessReport, PlanViolation, ValidationError, ValidationOptions, check_completeness, validate_plan,
};

#[cfg(test)]
pub(crate) use plan::fixtures;
