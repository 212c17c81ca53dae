//! The four-stage planning pipeline
//!
//! analyze -> gather-context -> (HITL gate) -> structure -> finalize

mod error;
mod planner;
mod result;
mod schema;
mod stage;

pub use error::{ErrorKind, PlannerError};
pub use planner::{Actor, Clarification, DEFAULT_QUESTIONS, Planner, PlannerSettings};
pub use result::PlannerResult;
pub use stage::Stage;
