//! Structured generation: prompt in, typed value out
//!
//! [`StructuredGenerator`] is the decode boundary between the LLM and the
//! pipeline. It forces the model to call a `submit_<schema>` tool whose input
//! schema describes the target type, then decodes the tool input. If the model
//! answers in text instead, JSON in the text (bare or fenced) is accepted.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, ToolDefinition};
use crate::events::EventEmitter;

/// A type the LLM can be asked to produce
pub trait StructuredOutput: DeserializeOwned + Serialize + Send + 'static {
    /// Short snake_case name; the forced tool is `submit_<SCHEMA_NAME>`
    const SCHEMA_NAME: &'static str;

    /// Tool description shown to the model
    const DESCRIPTION: &'static str;

    /// JSON schema of the tool input
    fn json_schema() -> serde_json::Value;

    fn tool_name() -> String {
        format!("submit_{}", Self::SCHEMA_NAME)
    }

    fn tool_definition() -> ToolDefinition {
        ToolDefinition::new(Self::tool_name(), Self::DESCRIPTION, Self::json_schema())
    }
}

/// The adapter could not produce a conforming object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM call for {schema} failed: {message}")]
    Llm { schema: String, message: String },

    #[error("LLM call for {schema} timed out after {timeout_ms}ms")]
    Timeout { schema: String, timeout_ms: u64 },

    #[error("LLM did not produce a valid {schema} after {attempts} attempt(s): {message}")]
    Decode {
        schema: String,
        attempts: u32,
        message: String,
    },

    #[error("could not render the {template} prompt: {message}")]
    Prompt { template: String, message: String },
}

/// Limits and verbosity for structured generation
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Decode attempts per call (at least 1)
    pub max_attempts: u32,

    /// Bound on each LLM call
    pub timeout: Duration,

    pub max_tokens: u32,

    /// Echo prompts as progress events
    pub show_prompts: bool,

    /// Echo raw responses as progress events
    pub show_responses: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(120),
            max_tokens: 8192,
            show_prompts: false,
            show_responses: false,
        }
    }
}

/// One prompt for one model
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub system: &'a str,
    pub user: &'a str,
    /// Model id; empty means the client default
    pub model: &'a str,
}

/// Shared, stateless structured-output adapter
#[derive(Clone)]
pub struct StructuredGenerator {
    llm: Arc<dyn LlmClient>,
    settings: GenerationSettings,
}

impl StructuredGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        debug!(?settings, "StructuredGenerator::new: called");
        Self { llm, settings }
    }

    /// Produce a `T` from the prompt or fail with a [`GenerationError`]
    ///
    /// Transport failures and timeouts end the call immediately. Responses that
    /// do not decode are retried with the decode error fed back, up to the
    /// attempt budget.
    pub async fn generate<T: StructuredOutput>(
        &self,
        prompt: Prompt<'_>,
        emitter: &EventEmitter,
    ) -> Result<T, GenerationError> {
        let schema = T::SCHEMA_NAME;
        debug!(%schema, model = %prompt.model, "StructuredGenerator::generate: called");
        let attempts = self.settings.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let user = if attempt == 1 {
                prompt.user.to_string()
            } else {
                format!(
                    "{}\n\nYour previous answer could not be used: {}\nCall {} with a complete, valid object.",
                    prompt.user,
                    last_error,
                    T::tool_name()
                )
            };

            if self.settings.show_prompts {
                emitter.progress(format!("[prompt:{}]\n{}", schema, user));
            }

            let request = CompletionRequest::new(prompt.system, user, self.settings.max_tokens)
                .with_forced_tool(T::tool_definition())
                .with_model(prompt.model);

            let response = self.call(schema, request).await?;

            if self.settings.show_responses {
                emitter.progress(format!("[response:{}]\n{}", schema, describe_response(&response)));
            }

            match decode_response::<T>(&response) {
                Ok(value) => {
                    info!(%schema, attempt, "StructuredGenerator::generate: decoded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(%schema, attempt, error = %e, "StructuredGenerator::generate: decode failed");
                    last_error = e;
                }
            }
        }

        Err(GenerationError::Decode {
            schema: schema.to_string(),
            attempts,
            message: last_error,
        })
    }

    /// Free-text reply for conversational turns
    pub async fn reply(&self, prompt: Prompt<'_>, emitter: &EventEmitter) -> Result<String, GenerationError> {
        debug!(model = %prompt.model, "StructuredGenerator::reply: called");
        if self.settings.show_prompts {
            emitter.progress(format!("[prompt:chat]\n{}", prompt.user));
        }

        let request =
            CompletionRequest::new(prompt.system, prompt.user, self.settings.max_tokens).with_model(prompt.model);
        let response = self.call("chat", request).await?;

        if self.settings.show_responses {
            emitter.progress(format!("[response:chat]\n{}", describe_response(&response)));
        }

        response
            .content
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenerationError::Decode {
                schema: "chat".to_string(),
                attempts: 1,
                message: "empty reply".to_string(),
            })
    }

    async fn call(&self, schema: &str, request: CompletionRequest) -> Result<CompletionResponse, GenerationError> {
        match tokio::time::timeout(self.settings.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!(%schema, status = ?e.status(), error = %e, "StructuredGenerator::call: LLM error");
                Err(GenerationError::Llm {
                    schema: schema.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(%schema, timeout = ?self.settings.timeout, "StructuredGenerator::call: timed out");
                Err(GenerationError::Timeout {
                    schema: schema.to_string(),
                    timeout_ms: self.settings.timeout.as_millis() as u64,
                })
            }
        }
    }
}

fn describe_response(response: &CompletionResponse) -> String {
    if let Some(call) = response.tool_calls.first() {
        let input = serde_json::to_string_pretty(&call.input).unwrap_or_else(|_| call.input.to_string());
        return format!("{}({})", call.name, input);
    }
    response.content.clone().unwrap_or_default()
}

/// Decode a `T` from the forced tool call, falling back to JSON in the text
pub fn decode_response<T: StructuredOutput>(response: &CompletionResponse) -> Result<T, String> {
    let tool_name = T::tool_name();
    debug!(%tool_name, tool_calls = response.tool_calls.len(), "decode_response: called");

    if let Some(call) = response.tool_calls.iter().find(|c| c.name == tool_name) {
        return serde_json::from_value(call.input.clone()).map_err(|e| format!("invalid {} input: {}", tool_name, e));
    }

    let Some(content) = response.content.as_deref() else {
        return Err(format!("no {} call and no text in the response", tool_name));
    };

    let mut last_error = "no JSON object found in the response text".to_string();
    for candidate in json_candidates(content) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = format!("response JSON does not match {}: {}", T::SCHEMA_NAME, e),
        }
    }
    Err(last_error)
}

/// Substrings of `text` that may hold the JSON answer, most specific first
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        candidates.push(trimmed);
    }

    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        let Some(end) = body.find("```") else { break };
        candidates.push(body[..end].trim());
        rest = &body[end + 3..];
    }

    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}'))
        && open < close
    {
        candidates.push(&text[open..=close]);
    }

    candidates
}
