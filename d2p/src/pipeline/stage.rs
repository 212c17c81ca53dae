//! The four planning stages

use serde::{Deserialize, Serialize};

/// A pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Analyze,
    GatherContext,
    Structure,
    Finalize,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::GatherContext => "gather-context",
            Self::Structure => "structure",
            Self::Finalize => "finalize",
        }
    }

    /// Prompt template rendered for this stage
    pub fn template(&self) -> &'static str {
        self.name()
    }

    /// Relative cost annotation; does not affect ordering
    pub fn cost(&self) -> f64 {
        match self {
            Self::Analyze => 0.1,
            Self::GatherContext => 0.05,
            Self::Structure => 0.3,
            Self::Finalize => 0.2,
        }
    }

    /// Short user-facing status line for the stage start
    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::Analyze => "Analyzing your brain dump...",
            Self::GatherContext => "Preparing clarifying questions...",
            Self::Structure => "Structuring milestones and tasks...",
            Self::Finalize => "Prioritizing and reviewing the plan...",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
