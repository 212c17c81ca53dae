//! Tool schemas for the structured stage outputs

use serde_json::{Value, json};

use crate::domain::{ExtractedIdeas, ProjectStructure, StructuredPlan};
use crate::llm::StructuredOutput;

fn string_list(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description
    })
}

fn milestone_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "description": "Unique milestone id, e.g. m1" },
            "name": { "type": "string" },
            "description": { "type": "string" },
            "orderIndex": { "type": "integer", "description": "Display order within the plan" },
            "taskIds": string_list("Ids of the tasks in this milestone")
        },
        "required": ["id", "name", "description", "orderIndex", "taskIds"]
    })
}

fn task_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "description": "Unique task id, e.g. t1" },
            "title": { "type": "string" },
            "description": { "type": "string" },
            "priority": { "type": "string", "enum": ["CRITICAL", "HIGH", "MEDIUM", "LOW"] },
            "milestoneId": { "type": "string", "description": "Id of the milestone this task belongs to" },
            "dependsOn": string_list("Ids of other tasks that must finish first"),
            "estimatedEffort": { "type": "string", "description": "e.g. 2 days" },
            "orderIndex": { "type": "integer", "description": "Display order within the milestone" }
        },
        "required": ["id", "title", "description", "priority", "milestoneId", "dependsOn", "estimatedEffort", "orderIndex"]
    })
}

fn structure_properties() -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    properties.insert("title".to_string(), json!({ "type": "string" }));
    properties.insert("summary".to_string(), json!({ "type": "string" }));
    properties.insert(
        "milestones".to_string(),
        json!({ "type": "array", "items": milestone_schema() }),
    );
    properties.insert("tasks".to_string(), json!({ "type": "array", "items": task_schema() }));
    properties.insert(
        "estimatedDuration".to_string(),
        json!({ "type": "string", "description": "Overall duration, e.g. 3 months" }),
    );
    properties
}

impl StructuredOutput for ExtractedIdeas {
    const SCHEMA_NAME: &'static str = "extracted_ideas";
    const DESCRIPTION: &'static str = "Submit the ideas extracted from the brain dump. Call this once.";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "topics": string_list("Key topics identified in the brain dump"),
                "actions": string_list("Actionable items, each starting with a verb"),
                "constraints": string_list("Constraints or limitations mentioned"),
                "projectType": { "type": "string", "description": "Kind of project, e.g. mobile app" },
                "estimatedComplexity": { "type": "string", "enum": ["low", "medium", "high"] },
                "clarifyingQuestions": string_list("Questions to ask before planning")
            },
            "required": ["topics", "actions", "constraints", "projectType", "estimatedComplexity", "clarifyingQuestions"]
        })
    }
}

impl StructuredOutput for ProjectStructure {
    const SCHEMA_NAME: &'static str = "project_structure";
    const DESCRIPTION: &'static str = "Submit the project structure with all milestones and tasks. Call this once.";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": structure_properties(),
            "required": ["title", "summary", "milestones", "tasks", "estimatedDuration"]
        })
    }
}

impl StructuredOutput for StructuredPlan {
    const SCHEMA_NAME: &'static str = "structured_plan";
    const DESCRIPTION: &'static str = "Submit the finalized, prioritized project plan. Call this once.";

    fn json_schema() -> Value {
        let mut properties = structure_properties();
        properties.insert("risks".to_string(), string_list("Risks that could derail the plan"));
        properties.insert("assumptions".to_string(), string_list("Assumptions the plan relies on"));
        json!({
            "type": "object",
            "properties": properties,
            "required": ["title", "summary", "milestones", "tasks", "estimatedDuration", "risks", "assumptions"]
        })
    }
}
