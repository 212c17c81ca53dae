//! Human-in-the-loop gate between gather-context and structure

mod form;
mod gate;
mod store;

pub use form::{ContextForm, FormError, OPTIONAL_FIELDS, REQUIRED_FIELDS};
pub use gate::{GateError, GateState, PendingGate};
pub use store::{GateStore, InMemoryGateStore};
