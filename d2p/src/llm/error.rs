//! Failures talking to the model provider
//!
//! These stay below the structured-output boundary: the generator reports
//! them as a [`GenerationError`](super::GenerationError) tagged with the
//! schema it was producing.

use std::time::Duration;
use thiserror::Error;

/// Longest provider error body kept in a message
const MAX_BODY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {}", summarize(message))]
    ApiError { status: u16, message: String },

    #[error("provider asked to wait {}s before the next request", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("request did not reach the provider: {0}")]
    Network(#[from] reqwest::Error),

    /// Every transient retry failed; `last` is the final failure
    #[error("provider still failing after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },

    #[error("unusable provider response: {0}")]
    InvalidResponse(String),

    #[error("LLM client misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    /// HTTP status behind the failure, when the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::RetriesExhausted { last, .. } => last.status(),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidResponse(_) | Self::Config(_) => None,
        }
    }
}

/// First line of an error body, cut to a readable length
fn summarize(body: &str) -> String {
    let line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    match line.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
