//! dump2plan configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main dump2plan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Conversational fallback and verbosity
    pub chat: ChatConfig,

    /// Per-stage actors (persona + model)
    pub actors: ActorsConfig,

    /// Process-wide assistant persona
    pub persona: String,

    /// Process-wide objective handed to every stage
    pub objective: String,

    /// Pipeline limits and policies
    pub pipeline: PipelineConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,

    /// Initial user directory
    pub users: Vec<UserConfig>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            chat: ChatConfig::default(),
            actors: ActorsConfig::default(),
            persona: "a pragmatic project planning assistant".to_string(),
            objective: "Turn unstructured brain dumps into clear, actionable, prioritized project plans".to_string(),
            pipeline: PipelineConfig::default(),
            prompts: PromptsConfig::default(),
            users: default_users(),
            log_level: None,
        }
    }
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set correctly.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.pipeline.max_generation_attempts == 0 {
            return Err(eyre::eyre!("pipeline.max-generation-attempts must be at least 1"));
        }
        if self.users.is_empty() {
            return Err(eyre::eyre!("users must contain at least one entry"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .dump2plan.yml
        let local_config = PathBuf::from(".dump2plan.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/dump2plan/dump2plan.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Peek at the configured log level before logging is set up
    ///
    /// Errors are swallowed: a broken config is reported again by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// `~/.config/dump2plan/dump2plan.yml` on Linux
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dump2plan").join("dump2plan.yml"))
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Default model, used when an actor does not name one
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("Environment variable {} is not set", self.api_key_env))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Chat fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model used for conversational replies
    pub llm: String,

    /// Echo rendered prompts as progress events
    #[serde(rename = "show-prompts")]
    pub show_prompts: bool,

    /// Echo raw LLM responses as progress events
    #[serde(rename = "show-responses")]
    pub show_responses: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            llm: "claude-3-5-haiku-latest".to_string(),
            show_prompts: false,
            show_responses: false,
        }
    }
}

/// A pipeline actor: who the stage speaks as and which model it uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    pub persona: String,

    /// Model id; empty means `llm.model`
    pub llm: String,
}

impl ActorConfig {
    fn new(persona: &str) -> Self {
        Self {
            persona: persona.to_string(),
            llm: String::new(),
        }
    }

    /// Model id for this actor, falling back to the provider default
    pub fn model<'a>(&'a self, llm: &'a LlmConfig) -> &'a str {
        if self.llm.trim().is_empty() { &llm.model } else { &self.llm }
    }
}

/// Actors for the analyze, structure and finalize stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorsConfig {
    pub analyzer: ActorConfig,
    pub planner: ActorConfig,
    pub reviewer: ActorConfig,
}

impl Default for ActorsConfig {
    fn default() -> Self {
        Self {
            analyzer: ActorConfig::new("an analyst who finds the actionable core of messy notes"),
            planner: ActorConfig::new("a project planner who breaks work into milestones and tasks"),
            reviewer: ActorConfig::new("a critical reviewer who prioritizes work and surfaces risks"),
        }
    }
}

/// Pipeline limits and policies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long a clarification gate waits for a valid form
    #[serde(rename = "hitl-timeout-ms")]
    pub hitl_timeout_ms: u64,

    /// Decode attempts per structured LLM call
    #[serde(rename = "max-generation-attempts")]
    pub max_generation_attempts: u32,

    /// Extra stage runs after a plan fails validation
    #[serde(rename = "max-validation-retries")]
    pub max_validation_retries: u32,

    /// Treat task dependency cycles as validation violations
    #[serde(rename = "reject-dependency-cycles")]
    pub reject_dependency_cycles: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hitl_timeout_ms: 30 * 60 * 1000,
            max_generation_attempts: 3,
            max_validation_retries: 1,
            reject_dependency_cycles: true,
        }
    }
}

impl PipelineConfig {
    pub fn hitl_timeout(&self) -> Duration {
        Duration::from_millis(self.hitl_timeout_ms)
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched first for `.pmt` overrides
    pub dir: Option<PathBuf>,
}

impl PromptsConfig {
    /// Override directory with `~/` expanded
    pub fn expanded_dir(&self) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        match dir.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(dir.clone()),
        }
    }
}

/// An entry in the initial user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,

    #[serde(rename = "display-name")]
    pub display_name: String,

    /// Defaults to `<username>@dump2plan.local`
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default = "default_role")]
    pub role: String,
}

impl UserConfig {
    pub fn new(display_name: &str, username: &str) -> Self {
        Self {
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: None,
            role: default_role(),
        }
    }
}

fn default_role() -> String {
    "USER".to_string()
}

fn default_users() -> Vec<UserConfig> {
    vec![
        UserConfig::new("User", "user"),
        UserConfig::new("Alice", "alice"),
        UserConfig::new("Bob", "bob"),
    ]
}
