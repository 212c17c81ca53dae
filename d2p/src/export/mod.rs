//! Plan export: markdown checklist and JSON

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{StructuredPlan, ValidationError};

mod json;
mod markdown;

pub use json::{from_json, to_json};
pub use markdown::to_markdown;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("plan JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan is not valid: {0}")]
    Invalid(#[from] ValidationError),
}

/// Output format for `plan`, `export` and `/export`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    #[value(alias = "md")]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn render(&self, plan: &StructuredPlan) -> Result<String, ExportError> {
        match self {
            Self::Markdown => Ok(to_markdown(plan)),
            Self::Json => to_json(plan),
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{}' (expected markdown or json)", other)),
        }
    }
}
