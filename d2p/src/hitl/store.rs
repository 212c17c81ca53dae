//! Gate persistence keyed by conversation id

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::gate::{GateError, PendingGate};

/// Storage for pending gates
///
/// All transitions that must not interleave (claiming a gate for resume) are
/// single calls so implementations can make them atomic.
pub trait GateStore: Send + Sync {
    /// Insert or replace the gate for its conversation
    fn put(&self, gate: PendingGate);

    fn get(&self, conversation_id: &str) -> Option<PendingGate>;

    fn remove(&self, conversation_id: &str) -> Option<PendingGate>;

    /// Atomically move the conversation's gate to RESUMING and return it
    fn begin_resume(&self, conversation_id: &str) -> Result<PendingGate, GateError>;

    /// Drop the gate and remember that it ran out of time
    ///
    /// Only a gate with this id that is still awaiting input is expired; a
    /// newer gate or one being resumed is left alone.
    fn expire(&self, conversation_id: &str, gate_id: &str) -> Option<PendingGate>;

    /// True (once) if the conversation's last gate expired
    fn take_expired(&self, conversation_id: &str) -> bool;

    /// Forget the gate and any expiry marker
    fn clear(&self, conversation_id: &str);
}

#[derive(Debug, Default)]
struct Inner {
    gates: HashMap<String, PendingGate>,
    expired: HashSet<String>,
}

/// Process-local gate store
#[derive(Debug, Default)]
pub struct InMemoryGateStore {
    inner: Mutex<Inner>,
}

impl InMemoryGateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("InMemoryGateStore: lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }
}

impl GateStore for InMemoryGateStore {
    fn put(&self, gate: PendingGate) {
        debug!(conversation_id = %gate.conversation_id, state = %gate.state(), "InMemoryGateStore::put: called");
        self.with(|inner| {
            inner.expired.remove(&gate.conversation_id);
            inner.gates.insert(gate.conversation_id.clone(), gate);
        })
    }

    fn get(&self, conversation_id: &str) -> Option<PendingGate> {
        self.with(|inner| inner.gates.get(conversation_id).cloned())
    }

    fn remove(&self, conversation_id: &str) -> Option<PendingGate> {
        debug!(%conversation_id, "InMemoryGateStore::remove: called");
        self.with(|inner| inner.gates.remove(conversation_id))
    }

    fn begin_resume(&self, conversation_id: &str) -> Result<PendingGate, GateError> {
        debug!(%conversation_id, "InMemoryGateStore::begin_resume: called");
        self.with(|inner| {
            let gate = inner
                .gates
                .get_mut(conversation_id)
                .ok_or_else(|| GateError::NotFound(conversation_id.to_string()))?;
            gate.begin_resume()?;
            Ok(gate.clone())
        })
    }

    fn expire(&self, conversation_id: &str, gate_id: &str) -> Option<PendingGate> {
        debug!(%conversation_id, %gate_id, "InMemoryGateStore::expire: called");
        self.with(|inner| {
            let current = inner.gates.get(conversation_id)?;
            if current.id != gate_id || !current.is_awaiting_input() {
                debug!(%conversation_id, "InMemoryGateStore::expire: gate moved on, not expiring");
                return None;
            }
            inner.expired.insert(conversation_id.to_string());
            inner.gates.remove(conversation_id)
        })
    }

    fn take_expired(&self, conversation_id: &str) -> bool {
        self.with(|inner| inner.expired.remove(conversation_id))
    }

    fn clear(&self, conversation_id: &str) {
        debug!(%conversation_id, "InMemoryGateStore::clear: called");
        self.with(|inner| {
            inner.gates.remove(conversation_id);
            inner.expired.remove(conversation_id);
        })
    }
}
