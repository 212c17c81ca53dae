//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{Config, LlmConfig, user_config_path};
use crate::export::ExportFormat;

/// dump2plan - turn a brain dump into a project plan
#[derive(Parser)]
#[command(
    name = "d2p",
    about = "Turn an unstructured brain dump into a structured, prioritized project plan",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a brain dump, asking the clarifying questions interactively
    Plan {
        /// Brain dump text, or @FILE to read it from a file
        #[arg(value_name = "TEXT|@FILE")]
        input: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: ExportFormat,

        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// User the conversation is bound to
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Chat with the planner (brain dumps, answers and questions)
    Chat {
        /// User the conversation is bound to
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Validate a saved JSON plan and render it
    Export {
        /// Plan JSON written by `plan --format json` or `/export json`
        #[arg(value_name = "PLAN.json")]
        plan: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: ExportFormat,

        /// Write the rendering here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Resolve `@FILE` arguments to the file's contents
pub fn read_input(input: &str) -> eyre::Result<String> {
    debug!(input_len = input.len(), "read_input: called");
    match input.strip_prefix('@') {
        Some(path) => {
            debug!(%path, "read_input: reading from file");
            std::fs::read_to_string(path).map_err(|e| eyre::eyre!("Failed to read {}: {}", path, e))
        }
        None => Ok(input.to_string()),
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dump2plan")
        .join("logs")
        .join("dump2plan.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// First config file in the lookup chain that exists
pub fn find_config_path() -> Option<PathBuf> {
    debug!("find_config_path: called");
    let local = PathBuf::from(".dump2plan.yml");
    if local.exists() {
        return Some(local);
    }
    user_config_path().filter(|p| p.exists())
}

/// Generate the after_help text with API key and config status
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let api_key_env = Config::load(None)
        .map(|c| c.llm.api_key_env)
        .unwrap_or_else(|_| LlmConfig::default().api_key_env);
    let key_set = std::env::var(&api_key_env).is_ok();

    let mut help = String::new();

    help.push_str("Environment:\n");
    let icon = if key_set { "\u{2705}" } else { "\u{274C}" };
    let status = if key_set { "set" } else { "not set (needed by plan and chat)" };
    help.push_str(&format!("  {} {:<20} {}\n", icon, api_key_env, status));

    help.push('\n');
    match find_config_path() {
        Some(path) => help.push_str(&format!("Config: {}\n", path.display())),
        None => help.push_str("Config: built-in defaults\n"),
    }

    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));

    debug!("generate_after_help: returning help text");
    help
}
