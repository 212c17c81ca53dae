//! Errors at the pipeline boundary

use serde::Serialize;
use thiserror::Error;

use super::stage::Stage;
use crate::domain::ValidationError;
use crate::llm::GenerationError;

/// Discriminant of [`PlannerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Generation,
    HitlTimeout,
    Validation,
    Interrupted,
}

/// Why a planner run failed
///
/// Every variant is terminal for its run. No partial plan is ever emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("{stage} stage failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    #[error("no valid answer to the clarifying questions within {timeout_ms}ms")]
    HitlTimeout { timeout_ms: u64 },

    #[error("{stage} stage produced an invalid plan: {source}")]
    Validation {
        stage: Stage,
        #[source]
        source: ValidationError,
    },

    #[error("planning run was interrupted")]
    Interrupted,
}

impl PlannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Generation { .. } => ErrorKind::Generation,
            Self::HitlTimeout { .. } => ErrorKind::HitlTimeout,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Stage the failure happened in, when there is one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Generation { stage, .. } | Self::Validation { stage, .. } => Some(*stage),
            Self::HitlTimeout { .. } => Some(Stage::GatherContext),
            Self::Interrupted => None,
        }
    }

    /// Short message for the chat host
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation { stage, source } => match source {
                GenerationError::Timeout { .. } => format!(
                    "The {} step took too long and was stopped. Please send your brain dump again.",
                    stage
                ),
                _ => format!(
                    "I couldn't complete the {} step. Please send your brain dump again.",
                    stage
                ),
            },
            Self::HitlTimeout { .. } => {
                "I didn't get answers to my questions in time, so I set this plan aside. \
                 Send your brain dump again to start over."
                    .to_string()
            }
            Self::Validation { source, .. } => format!(
                "The generated plan didn't hold together ({} problem(s) found). Please try again.",
                source.violations.len()
            ),
            Self::Interrupted => "Planning was cancelled.".to_string(),
        }
    }
}
