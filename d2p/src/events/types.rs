//! Output channel event types
//!
//! Everything the pipeline and the controller want the host to see goes out as
//! one of two events: a transient progress line or a conversational message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the host should show
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text")]
pub enum OutputEvent {
    /// Status line: stage starts, prompt/response echoes, advisory warnings
    Progress(String),
    /// Conversational content: questions, plans, chat replies, failures
    Message(String),
}

impl OutputEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OutputEvent::Progress(_) => "Progress",
            OutputEvent::Message(_) => "Message",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            OutputEvent::Progress(text) | OutputEvent::Message(text) => text,
        }
    }
}

/// An output event addressed to one conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub conversation_id: String,

    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    pub event: OutputEvent,
}

impl ConversationEvent {
    /// Stamp an event with the current time
    pub fn new(conversation_id: impl Into<String>, event: OutputEvent) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_event_serialization() {
        let event = OutputEvent::Progress("Analyzing input".to_string());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Progress");
        assert_eq!(json["text"], "Analyzing input");

        let parsed: OutputEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_conversation_event_carries_timestamp() {
        let entry = ConversationEvent::new("conv-1", OutputEvent::Message("hi".to_string()));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"ts\""));
        assert!(json.contains("conv-1"));
        assert_eq!(entry.event.event_type(), "Message");
        assert_eq!(entry.event.text(), "hi");
    }
}
