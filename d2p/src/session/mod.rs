//! Conversation sessions: routing, per-conversation workers, the HITL wait window

mod controller;
mod error;
mod worker;

pub use controller::{ControllerSettings, ConversationController, SubmitOutcome};
pub use error::SessionError;
pub use worker::INBOX_CAPACITY;
