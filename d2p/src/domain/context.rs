//! User answers gathered at the HITL gate

use serde::Serialize;

/// User responses to the clarifying questions
///
/// Only the HITL gate can build one (from a validated form submission), so a
/// `ClarifiedContext` always answers a prompt that was actually issued.
/// It deliberately has no `Deserialize` impl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarifiedContext {
    timeline: String,
    team_size: String,
    budget_constraints: String,
    additional_context: String,
}

impl ClarifiedContext {
    pub(crate) fn new(
        timeline: impl Into<String>,
        team_size: impl Into<String>,
        budget_constraints: impl Into<String>,
        additional_context: impl Into<String>,
    ) -> Self {
        Self {
            timeline: timeline.into(),
            team_size: team_size.into(),
            budget_constraints: budget_constraints.into(),
            additional_context: additional_context.into(),
        }
    }

    /// Target timeline for the project
    pub fn timeline(&self) -> &str {
        &self.timeline
    }

    /// Size of the team working on the project
    pub fn team_size(&self) -> &str {
        &self.team_size
    }

    /// Budget constraints or limitations
    pub fn budget_constraints(&self) -> &str {
        &self.budget_constraints
    }

    /// Anything else the user added
    pub fn additional_context(&self) -> &str {
        &self.additional_context
    }
}
