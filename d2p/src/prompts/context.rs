//! Render contexts for each prompt template

use serde::Serialize;

use crate::domain::{ClarifiedContext, ExtractedIdeas};

/// Shared system prompt: who the assistant is for this stage
#[derive(Debug, Clone, Serialize)]
pub struct SystemContext<'a> {
    pub persona: &'a str,
    pub objective: &'a str,
    pub actor_persona: &'a str,
    pub user_name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeContext<'a> {
    pub input: &'a str,
}

/// The clarification request shown at the HITL gate
#[derive(Debug, Clone, Serialize)]
pub struct GatherContext<'a> {
    pub questions: &'a [String],
    pub project_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureContext<'a> {
    pub ideas: &'a ExtractedIdeas,
    pub context: &'a ClarifiedContext,
    /// Violations from a rejected previous attempt
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeContext<'a> {
    /// Pretty-printed ProjectStructure
    pub structure_json: String,
    pub ideas: &'a ExtractedIdeas,
    pub feedback: Option<String>,
}

/// Conversational fallback
#[derive(Debug, Clone, Serialize)]
pub struct ChatContext<'a> {
    pub persona: &'a str,
    pub objective: &'a str,
    pub user_name: &'a str,
    pub awaiting_input: bool,
    pub questions: &'a [String],
}
