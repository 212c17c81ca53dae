//! dump2plan - brain dump to structured project plan
//!
//! A four-stage LLM pipeline turns unstructured text into a validated,
//! prioritized plan of milestones and tasks. The run pauses once, between
//! gather-context and structure, to ask the user clarifying questions.
//!
//! ```text
//! analyze -> gather-context -> [HITL gate] -> structure -> finalize
//! ```
//!
//! # Modules
//!
//! - [`domain`] - plan data model and structural validation
//! - [`llm`] - LLM client trait, Anthropic client, structured-output adapter
//! - [`prompts`] - Handlebars prompt templates
//! - [`pipeline`] - the stages and their error/result types
//! - [`hitl`] - form submissions and the pending gate record
//! - [`session`] - conversation controller and per-conversation workers
//! - [`export`] - markdown and JSON rendering
//! - [`events`] - output channel
//! - [`user`] - user directory
//! - [`config`] - configuration types and loading
//! - [`cli`] / [`repl`] - command line and interactive front ends

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod export;
pub mod hitl;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod repl;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use domain::{
    ClarifiedContext, ExtractedIdeas, Milestone, PlanViolation, Priority, ProjectStructure, StructuredPlan, Task,
    UserInput, ValidationError,
};
pub use events::{ConversationEvent, EventBus, EventEmitter, OutputEvent, create_event_bus};
pub use export::{ExportFormat, from_json, to_json, to_markdown};
pub use hitl::{ContextForm, FormError, GateError, GateState, GateStore, InMemoryGateStore, PendingGate};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use pipeline::{ErrorKind, Planner, PlannerError, PlannerResult, PlannerSettings, Stage};
pub use session::{ControllerSettings, ConversationController, SessionError, SubmitOutcome};
pub use user::{InMemoryUserStore, User, UserStore};
