//! Chat REPL session

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{spawn_progress_printer, write_output};
use crate::domain::StructuredPlan;
use crate::events::{ConversationEvent, OutputEvent};
use crate::export::ExportFormat;
use crate::pipeline::PlannerResult;
use crate::session::{ConversationController, SubmitOutcome};

/// Interactive chat bound to one conversation
pub struct ChatSession {
    controller: Arc<ConversationController>,
    conversation_id: String,
    messages: broadcast::Receiver<ConversationEvent>,
    progress: JoinHandle<()>,
    last_plan: Option<StructuredPlan>,
}

impl ChatSession {
    /// Open a conversation for `username` (the default user when `None`)
    pub fn new(controller: Arc<ConversationController>, username: Option<&str>) -> Result<Self> {
        debug!(?username, "ChatSession::new: called");
        let conversation_id = controller.start_conversation(username)?;
        let messages = controller.subscribe();
        let progress = spawn_progress_printer(&controller, &conversation_id);
        Ok(Self {
            controller,
            conversation_id,
            messages,
            progress,
            last_plan: None,
        })
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(&line).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "dump2plan".bright_cyan().bold());
        if let Some(user) = self.controller.user(&self.conversation_id) {
            println!("Hi {}! Paste a brain dump and I'll turn it into a plan.", user.display_name);
        }
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/reset" => {
                match self.controller.reset(&self.conversation_id) {
                    Ok(()) => {
                        self.last_plan = None;
                        println!("{}", "Conversation reset.".dimmed());
                    }
                    Err(e) => println!("{} {}", "Error:".red(), e),
                }
                SlashResult::Continue
            }
            "/state" => {
                self.print_state();
                SlashResult::Continue
            }
            "/export" => {
                self.export(&parts[1..]);
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:24} Show this help", "/help".yellow());
        println!("  {:24} Exit", "/quit".yellow());
        println!("  {:24} Drop the current plan and questions", "/reset".yellow());
        println!("  {:24} Show where the conversation stands", "/state".yellow());
        println!("  {:24} Save or print the last plan", "/export md|json [FILE]".yellow());
        println!();
        println!("{}", "Answering questions:".bright_cyan());
        println!("  Reply with the answers as key: value pairs, for example:");
        println!("    {}", "timeline: 3 months; teamSize: 2; budget: none".dimmed());
        println!("  {} is optional.", "additionalContext".yellow());
        println!();
    }

    fn print_state(&self) {
        println!();
        println!("  {:14} {}", "conversation".bright_cyan(), self.conversation_id);
        if let Some(user) = self.controller.user(&self.conversation_id) {
            println!("  {:14} {} <{}>", "user".bright_cyan(), user.display_name, user.email);
        }
        match self.controller.gate_state(&self.conversation_id) {
            Some(state) => println!("  {:14} {}", "gate".bright_cyan(), state),
            None => println!("  {:14} {}", "gate".bright_cyan(), "none".dimmed()),
        }
        if let Some(questions) = self.controller.pending_questions(&self.conversation_id) {
            for question in questions {
                println!("  {:14} {}", "", question);
            }
        }
        let plan = match &self.last_plan {
            Some(plan) => plan.title.normal(),
            None => "none".dimmed(),
        };
        println!("  {:14} {}", "plan".bright_cyan(), plan);
        println!();
    }

    fn export(&self, args: &[&str]) {
        let Some(plan) = &self.last_plan else {
            println!("{}", "No plan yet. Send a brain dump first.".yellow());
            return;
        };
        let format = match args.first().map(|f| f.parse::<ExportFormat>()) {
            None => ExportFormat::Markdown,
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                println!("{} {}", "Error:".red(), e);
                return;
            }
        };
        let output = args.get(1).map(PathBuf::from);

        let result = format
            .render(plan)
            .map_err(eyre::Report::from)
            .and_then(|text| write_output(&text, output.as_deref()));
        match (result, output) {
            (Ok(()), Some(path)) => println!("{} {}", "Saved".green(), path.display()),
            (Ok(()), None) => {}
            (Err(e), _) => println!("{} {}", "Error:".red(), e),
        }
    }

    async fn process_user_input(&mut self, input: &str) {
        match self.controller.submit_message(&self.conversation_id, input).await {
            Ok(SubmitOutcome::Planner(PlannerResult::Completed(plan))) => {
                self.last_plan = Some(plan);
            }
            Ok(SubmitOutcome::Planner(_)) | Ok(SubmitOutcome::Chat(_)) => {}
            Err(e) => println!("{} {}", "!".yellow(), e),
        }
        self.print_messages();
    }

    /// Print the messages emitted for this conversation since the last call
    fn print_messages(&mut self) {
        loop {
            match self.messages.try_recv() {
                Ok(event) if event.conversation_id == self.conversation_id => {
                    if let OutputEvent::Message(text) = event.event {
                        println!();
                        println!("{}", text);
                        println!();
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "ChatSession::print_messages: lagged");
                    continue;
                }
                Err(_) => break,
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.progress.abort();
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
