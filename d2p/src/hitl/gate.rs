//! Pending HITL gate record
//!
//! ```text
//! AWAITING_INPUT -> RESUMING -> RESUMED
//!        ^              |
//!        |              v
//!        +------ FAILED_VALIDATION
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::form::{ContextForm, FormError};
use crate::domain::{ClarifiedContext, ExtractedIdeas};

/// Where a gate is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    AwaitingInput,
    Resuming,
    Resumed,
    FailedValidation,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingInput => "AWAITING_INPUT",
            Self::Resuming => "RESUMING",
            Self::Resumed => "RESUMED",
            Self::FailedValidation => "FAILED_VALIDATION",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("no gate is waiting for input in conversation {0}")]
    NotFound(String),

    #[error("gate is {state}, not waiting for input")]
    NotAwaitingInput { state: GateState },

    #[error("gate is {state}, expected {expected}")]
    InvalidTransition { state: GateState, expected: GateState },

    #[error("submission rejected: {0}")]
    InvalidSubmission(#[from] FormError),
}

/// A pipeline run suspended between gather-context and structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGate {
    pub id: String,
    pub conversation_id: String,
    /// Analyze output carried across the suspension
    pub ideas: ExtractedIdeas,
    pub questions: Vec<String>,
    /// Rendered question text shown to the user
    pub prompt: String,
    state: GateState,
    pub issued_at: DateTime<Utc>,
    rejected: u32,
}

impl PendingGate {
    pub fn new(
        conversation_id: impl Into<String>,
        ideas: ExtractedIdeas,
        questions: Vec<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        debug!(%conversation_id, questions = questions.len(), "PendingGate::new: called");
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            conversation_id,
            ideas,
            questions,
            prompt: prompt.into(),
            state: GateState::AwaitingInput,
            issued_at: Utc::now(),
            rejected: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Submissions turned away so far
    pub fn rejected_count(&self) -> u32 {
        self.rejected
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.state == GateState::AwaitingInput
    }

    /// True once `timeout` has passed since the questions were issued
    pub fn is_expired_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let elapsed = now.signed_duration_since(self.issued_at);
        elapsed.to_std().map(|e| e >= timeout).unwrap_or(false)
    }

    /// AWAITING_INPUT -> RESUMING
    pub fn begin_resume(&mut self) -> Result<(), GateError> {
        debug!(gate_id = %self.id, state = %self.state, "PendingGate::begin_resume: called");
        if self.state != GateState::AwaitingInput {
            return Err(GateError::NotAwaitingInput { state: self.state });
        }
        self.state = GateState::Resuming;
        Ok(())
    }

    /// RESUMING -> RESUMED with the validated context, or -> FAILED_VALIDATION
    pub fn complete(&mut self, form: &ContextForm) -> Result<ClarifiedContext, GateError> {
        debug!(gate_id = %self.id, state = %self.state, "PendingGate::complete: called");
        if self.state != GateState::Resuming {
            return Err(GateError::InvalidTransition {
                state: self.state,
                expected: GateState::Resuming,
            });
        }
        match form.validate() {
            Ok(context) => {
                info!(gate_id = %self.id, "Gate resumed");
                self.state = GateState::Resumed;
                Ok(context)
            }
            Err(e) => {
                self.rejected += 1;
                self.state = GateState::FailedValidation;
                Err(e.into())
            }
        }
    }

    /// FAILED_VALIDATION -> AWAITING_INPUT
    pub fn reopen(&mut self) -> Result<(), GateError> {
        debug!(gate_id = %self.id, state = %self.state, "PendingGate::reopen: called");
        if self.state != GateState::FailedValidation {
            return Err(GateError::InvalidTransition {
                state: self.state,
                expected: GateState::FailedValidation,
            });
        }
        self.state = GateState::AwaitingInput;
        Ok(())
    }
}
