//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files, one per pipeline stage plus
//! the shared system prompt and the chat fallback.
//!
//! Template loading chain:
//! 1. `prompts.dir` from config (explicit override)
//! 2. `.dump2plan/prompts/{name}.pmt` (project override)
//! 3. `prompts/{name}.pmt` (repo default)
//! 4. Embedded fallback in code
//!
//! Templates use Handlebars syntax with HTML escaping disabled.

mod context;
pub mod embedded;
mod loader;

pub use context::{AnalyzeContext, ChatContext, FinalizeContext, GatherContext, StructureContext, SystemContext};
pub use loader::PromptLoader;
