//! dump2plan - brain dump to project plan
//!
//! CLI entry point.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use dump2plan::cli::{Cli, Command, generate_after_help, get_log_path, read_input};
use dump2plan::config::Config;
use dump2plan::export::{ExportFormat, from_json};
use dump2plan::pipeline::PlannerResult;
use dump2plan::repl::{self, ask_context, build_controller, spawn_progress_printer, write_output};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "dump2plan loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Plan {
            input,
            format,
            output,
            user,
        }) => {
            debug!(?format, ?output, ?user, "main: matched Plan command");
            cmd_plan(&config, &input, format, output.as_deref(), user.as_deref()).await
        }
        Some(Command::Chat { user }) => {
            debug!(?user, "main: matched Chat command");
            repl::run_interactive(&config, user.as_deref()).await
        }
        Some(Command::Export { plan, format, output }) => {
            debug!(?plan, ?format, ?output, "main: matched Export command");
            cmd_export(&plan, format, output.as_deref())
        }
        None => {
            debug!("main: no command, starting chat");
            repl::run_interactive(&config, None).await
        }
    }
}

/// Run the whole pipeline for one brain dump
async fn cmd_plan(
    config: &Config,
    input: &str,
    format: ExportFormat,
    output: Option<&Path>,
    username: Option<&str>,
) -> Result<()> {
    let text = read_input(input)?;
    let controller = build_controller(config)?;
    let conversation_id = controller.start_conversation(username)?;
    let progress = spawn_progress_printer(&controller, &conversation_id);

    let mut result = controller.run_planner(&conversation_id, &text).await?;
    let outcome = loop {
        match result {
            PlannerResult::AwaitingInput { questions } => {
                let Some(form) = ask_context(&questions)? else {
                    break Err(eyre::eyre!("Cancelled"));
                };
                result = controller.resume_with_context(&conversation_id, form).await?;
            }
            PlannerResult::Completed(plan) => {
                info!(title = %plan.title, "cmd_plan: plan completed");
                let rendered = format.render(&plan)?;
                write_output(&rendered, output)?;
                if let Some(path) = output {
                    eprintln!("{} {}", "Saved".green(), path.display());
                }
                break Ok(());
            }
            PlannerResult::Failed(e) => {
                let message = e.user_message();
                break Err(eyre::Report::new(e).wrap_err(message));
            }
        }
    };

    progress.abort();
    controller.shutdown();
    outcome
}

/// Validate a saved plan and render it; needs no API key
fn cmd_export(plan: &Path, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(plan).context(format!("Failed to read {}", plan.display()))?;
    let parsed = from_json(&text).context(format!("{} is not a valid plan", plan.display()))?;
    let rendered = format.render(&parsed)?;
    write_output(&rendered, output)
}
