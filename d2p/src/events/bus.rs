//! Output bus - broadcast channel for conversation events
//!
//! The controller and pipeline emit; hosts (CLI, REPL, tests) subscribe and
//! filter by conversation id.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{ConversationEvent, OutputEvent};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Broadcast bus for conversation output
pub struct EventBus {
    tx: broadcast::Sender<ConversationEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: ConversationEvent) {
        debug!(
            event_type = event.event.event_type(),
            conversation_id = %event.conversation_id,
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one conversation
    pub fn emitter_for(&self, conversation_id: impl Into<String>) -> EventEmitter {
        let conversation_id = conversation_id.into();
        debug!(%conversation_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            conversation_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ConversationEvent>,
    conversation_id: String,
}

impl EventEmitter {
    /// Get the conversation ID this emitter is bound to
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Emit a raw output event
    pub fn emit(&self, event: OutputEvent) {
        debug!(event_type = event.event_type(), conversation_id = %self.conversation_id, "EventEmitter::emit");
        let _ = self.tx.send(ConversationEvent::new(self.conversation_id.clone(), event));
    }

    /// Emit a progress line
    pub fn progress(&self, text: impl Into<String>) {
        self.emit(OutputEvent::Progress(text.into()));
    }

    /// Emit a conversational message
    pub fn message(&self, text: impl Into<String>) {
        self.emit(OutputEvent::Message(text.into()));
    }

    /// An emitter that drops everything, for code paths with no host attached
    pub fn detached(conversation_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            conversation_id: conversation_id.into(),
        }
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(ConversationEvent::new("c", OutputEvent::Progress("x".to_string())));
        bus.emitter_for("c").message("still fine");
    }

    #[tokio::test]
    async fn test_emitter_tags_conversation() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("conv-42");

        emitter.progress("Analyzing");
        emitter.message("Here is your plan");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.conversation_id, "conv-42");
        assert_eq!(first.event, OutputEvent::Progress("Analyzing".to_string()));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, OutputEvent::Message("Here is your plan".to_string()));

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emitter_for("shared").progress("tick");

        assert_eq!(rx1.recv().await.unwrap().event.text(), "tick");
        assert_eq!(rx2.recv().await.unwrap().event.text(), "tick");
    }

    #[test]
    fn test_detached_emitter() {
        let emitter = EventEmitter::detached("nowhere");
        emitter.progress("dropped");
        assert_eq!(emitter.conversation_id(), "nowhere");
    }
}
