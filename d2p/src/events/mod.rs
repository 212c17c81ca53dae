//! Output channel for conversations
//!
//! Every message or status line destined for the user is an [`OutputEvent`]
//! wrapped in a [`ConversationEvent`] and broadcast on the [`EventBus`].
//!
//! ```text
//!   Planner stages ──┐
//!   HITL prompts  ───┼──> EventBus (tokio broadcast) ──> CLI / REPL / tests
//!   Chat replies  ───┘
//! ```
//!
//! Hosts consume events with an exhaustive `match` on [`OutputEvent`].

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use types::{ConversationEvent, OutputEvent};
