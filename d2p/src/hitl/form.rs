//! Form submissions for the clarifying questions
//!
//! A chat message counts as a submission when it is either a JSON object whose
//! keys are all form fields, or a block of `key: value` lines (or `;`-separated
//! pairs) whose keys are all form fields, and it answers at least one required
//! field. Parsing says nothing about completeness; that is
//! [`ContextForm::validate`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::ClarifiedContext;

/// Required and optional fields, by their wire names
pub const REQUIRED_FIELDS: [&str; 3] = ["timeline", "teamSize", "budgetConstraints"];
pub const OPTIONAL_FIELDS: [&str; 1] = ["additionalContext"];

/// Why a form submission was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("missing answers for: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },
}

/// Raw answers as submitted; any field may be missing or blank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextForm {
    pub timeline: Option<String>,
    pub team_size: Option<String>,
    pub budget_constraints: Option<String>,
    pub additional_context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Timeline,
    TeamSize,
    Budget,
    Additional,
}

impl Field {
    /// Match a key loosely: case, spaces, dashes and underscores are ignored
    fn from_key(key: &str) -> Option<Self> {
        let normalized: String = key
            .chars()
            .filter(|c| c.is_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "timeline" => Some(Self::Timeline),
            "teamsize" => Some(Self::TeamSize),
            "budgetconstraints" | "budget" => Some(Self::Budget),
            "additionalcontext" | "additionalnotes" => Some(Self::Additional),
            _ => None,
        }
    }
}

impl ContextForm {
    pub fn new(
        timeline: impl Into<String>,
        team_size: impl Into<String>,
        budget_constraints: impl Into<String>,
        additional_context: impl Into<String>,
    ) -> Self {
        Self {
            timeline: Some(timeline.into()),
            team_size: Some(team_size.into()),
            budget_constraints: Some(budget_constraints.into()),
            additional_context: Some(additional_context.into()),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Timeline => &mut self.timeline,
            Field::TeamSize => &mut self.team_size,
            Field::Budget => &mut self.budget_constraints,
            Field::Additional => &mut self.additional_context,
        }
    }

    /// Recognize a form submission in a chat message
    ///
    /// Returns `None` when the text is ordinary chat.
    pub fn parse(text: &str) -> Option<Self> {
        debug!(len = text.len(), "ContextForm::parse: called");
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let form = if trimmed.starts_with('{') {
            Self::parse_json(trimmed)
        } else {
            Self::parse_lines(trimmed)
        }?;
        form.answers_a_required_field().then_some(form)
    }

    /// A message naming only optional fields is chat, not a submission
    fn answers_a_required_field(&self) -> bool {
        self.timeline.is_some() || self.team_size.is_some() || self.budget_constraints.is_some()
    }

    fn parse_json(text: &str) -> Option<Self> {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
            debug!("ContextForm::parse_json: not a JSON object");
            return None;
        };
        if map.is_empty() {
            return None;
        }

        let mut form = Self::default();
        for (key, value) in map {
            let field = Field::from_key(&key)?;
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Null => continue,
                _ => return None,
            };
            *form.slot(field) = Some(text);
        }
        Some(form)
    }

    fn parse_lines(text: &str) -> Option<Self> {
        let mut form = Self::default();
        let mut current: Option<Field> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            // Indented lines continue the previous answer
            if line.starts_with(char::is_whitespace)
                && let Some(field) = current
            {
                let slot = form.slot(field);
                let joined = match slot.take() {
                    Some(prev) if !prev.is_empty() => format!("{} {}", prev, line.trim()),
                    _ => line.trim().to_string(),
                };
                *slot = Some(joined);
                continue;
            }

            // `a: 1; b: 2` packs several answers on one line
            for part in line.split(';').filter(|p| !p.trim().is_empty()) {
                let (key, value) = part.split_once(':')?;
                let field = Field::from_key(key.trim().trim_start_matches(['-', '*', ' ']))?;
                *form.slot(field) = Some(value.trim().to_string());
                current = Some(field);
            }
        }

        current.map(|_| form)
    }

    /// Accept the submission when every required answer is present and non-blank
    pub fn validate(&self) -> Result<ClarifiedContext, FormError> {
        debug!("ContextForm::validate: called");
        fn answer(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        let answers = [
            answer(&self.timeline),
            answer(&self.team_size),
            answer(&self.budget_constraints),
        ];
        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .zip(answers.iter())
            .filter(|(_, a)| a.is_none())
            .map(|(name, _)| *name)
            .collect();

        match answers {
            [Some(timeline), Some(team_size), Some(budget)] => Ok(ClarifiedContext::new(
                timeline,
                team_size,
                budget,
                answer(&self.additional_context).unwrap_or_default(),
            )),
            _ => Err(FormError::MissingFields { fields: missing }),
        }
    }
}
