//! Interactive terminal front end
//!
//! `d2p plan` asks the clarifying questions field by field; `d2p chat` routes
//! every line through the conversation controller.

mod form;
mod session;

pub use form::ask_context;
pub use session::ChatSession;

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::events::OutputEvent;
use crate::llm::create_client;
use crate::prompts::PromptLoader;
use crate::session::ConversationController;

/// Build a controller from configuration
///
/// Fails fast when the API key is missing or a prompt template does not compile.
pub fn build_controller(config: &Config) -> Result<Arc<ConversationController>> {
    debug!("build_controller: called");
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let worktree = std::env::current_dir().context("Failed to read current directory")?;
    let prompts = PromptLoader::new(&worktree, config.prompts.expanded_dir());
    prompts.check_all().context("Prompt templates are invalid")?;

    Ok(Arc::new(ConversationController::from_config(config, llm, Arc::new(prompts))))
}

/// Print a conversation's progress events to stderr as they arrive
pub fn spawn_progress_printer(controller: &ConversationController, conversation_id: &str) -> JoinHandle<()> {
    let mut rx = controller.subscribe();
    let conversation_id = conversation_id.to_string();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.conversation_id == conversation_id => {
                    if let OutputEvent::Progress(text) = event.event {
                        eprintln!("{}", text.dimmed());
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "spawn_progress_printer: lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Write to `output`, or to stdout when `None`
pub fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    debug!(?output, "write_output: called");
    match output {
        Some(path) => std::fs::write(path, text).context(format!("Failed to write {}", path.display())),
        None => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

/// Run the chat REPL
pub async fn run_interactive(config: &Config, username: Option<&str>) -> Result<()> {
    let controller = build_controller(config)?;
    let mut session = ChatSession::new(controller.clone(), username)?;
    let result = session.run().await;
    controller.shutdown();
    result
}
