//! Pipeline entry input and the analyze-stage output

use serde::{Deserialize, Serialize};

/// Raw brain dump text entering the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub content: String,
}

impl UserInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Ideas and action items extracted from a brain dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIdeas {
    /// Key topics identified in the brain dump
    #[serde(default, alias = "extractedTopics")]
    pub topics: Vec<String>,

    /// Actionable items extracted from the brain dump
    #[serde(default, alias = "extractedActions")]
    pub actions: Vec<String>,

    /// Constraints or limitations mentioned
    #[serde(default, alias = "extractedConstraints")]
    pub constraints: Vec<String>,

    /// Type of project identified
    pub project_type: String,

    /// Estimated complexity of the project
    pub estimated_complexity: String,

    /// Questions to ask the user before planning
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
}
