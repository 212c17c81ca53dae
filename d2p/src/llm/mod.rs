//! LLM client module for dump2plan
//!
//! [`LlmClient`] is the transport seam; [`StructuredGenerator`] turns prompts
//! into typed values on top of it.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod structured;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use structured::{
    GenerationError, GenerationSettings, Prompt, StructuredGenerator, StructuredOutput, decode_response,
};
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports the "anthropic" provider.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic",
                other
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        match create_client(&config) {
            Err(LlmError::Config(msg)) => assert!(msg.contains("carrier-pigeon")),
            Err(other) => panic!("Expected Config error, got {}", other),
            Ok(_) => panic!("Expected an error"),
        }
    }

    #[test]
    fn test_create_client_requires_api_key() {
        let config = LlmConfig {
            api_key_env: "D2P_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::Config(_))));
    }
}
