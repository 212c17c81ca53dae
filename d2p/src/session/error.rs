//! Controller rejections
//!
//! These never change conversation state: the request was refused before any
//! work started.

use thiserror::Error;

use crate::hitl::GateState;
use crate::llm::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("conversation {conversation_id} is not waiting for answers (gate: {})", describe(.state))]
    NotAwaitingInput {
        conversation_id: String,
        state: Option<GateState>,
    },

    #[error("conversation {0} is still working on a previous message")]
    Busy(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("chat reply failed: {0}")]
    Chat(#[from] GenerationError),

    #[error("conversation controller is shut down")]
    Closed,
}

fn describe(state: &Option<GateState>) -> String {
    state.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
}
