//! JSON form of a finalized plan

use tracing::debug;

use super::ExportError;
use crate::domain::{StructuredPlan, ValidationOptions, validate_plan};

/// Pretty-printed JSON with two-space indent
pub fn to_json(plan: &StructuredPlan) -> Result<String, ExportError> {
    debug!(title = %plan.title, "to_json: called");
    Ok(serde_json::to_string_pretty(plan)?)
}

/// Parse a plan previously written by [`to_json`]
///
/// The plan is validated; a file that parses but breaks the plan invariants is
/// rejected.
pub fn from_json(text: &str) -> Result<StructuredPlan, ExportError> {
    debug!(len = text.len(), "from_json: called");
    let plan: StructuredPlan = serde_json::from_str(text)?;
    validate_plan(&plan, ValidationOptions::default())?;
    Ok(plan)
}
