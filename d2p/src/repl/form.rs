//! Interactive answers to the clarifying questions

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::hitl::ContextForm;

/// One prompt per form field: label and whether a blank answer is allowed
const FIELDS: [(&str, bool); 4] = [
    ("Timeline", false),
    ("Team size", false),
    ("Budget constraints", false),
    ("Anything else (optional)", true),
];

/// Print the questions and read the form field by field
///
/// Returns `None` when the user cancels with Ctrl+C or Ctrl+D.
pub fn ask_context(questions: &[String]) -> Result<Option<ContextForm>> {
    debug!(questions = questions.len(), "ask_context: called");
    println!();
    println!("{}", "Before I create your plan, I have a few questions:".bright_cyan());
    for question in questions {
        println!("  - {}", question);
    }
    println!();
    println!("{}", "Answer below; Ctrl+C cancels.".dimmed());

    let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
    let mut answers: Vec<String> = Vec::with_capacity(FIELDS.len());

    for (label, optional) in FIELDS {
        loop {
            match rl.readline(&format!("{} ", format!("{}:", label).bright_green())) {
                Ok(line) => {
                    let answer = line.trim().to_string();
                    if answer.is_empty() && !optional {
                        println!("{}", "An answer is required.".yellow());
                        continue;
                    }
                    answers.push(answer);
                    break;
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    debug!("ask_context: cancelled");
                    return Ok(None);
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }
    }

    match answers.as_slice() {
        [timeline, team_size, budget, additional] => Ok(Some(ContextForm::new(
            timeline.clone(),
            team_size.clone(),
            budget.clone(),
            additional.clone(),
        ))),
        _ => Ok(None),
    }
}
