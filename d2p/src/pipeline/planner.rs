//! Planner core: the stage operations
//!
//! Each stage is a method; sequencing and the HITL suspension between
//! gather-context and structure belong to the session controller. A stage
//! renders its template, asks the [`StructuredGenerator`] for a typed value,
//! and (for plan-shaped outputs) validates it before handing it on.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::PlannerError;
use super::stage::Stage;
use crate::config::Config;
use crate::domain::{
    ClarifiedContext, ExtractedIdeas, PlanShape, ProjectStructure, StructuredPlan, UserInput, ValidationError,
    ValidationOptions, check_completeness, validate_plan,
};
use crate::events::EventEmitter;
use crate::llm::{GenerationError, GenerationSettings, LlmClient, Prompt, StructuredGenerator, StructuredOutput};
use crate::prompts::{
    AnalyzeContext, ChatContext, FinalizeContext, GatherContext, PromptLoader, StructureContext, SystemContext,
};
use crate::user::User;

/// Asked when the analyze stage produced no clarifying questions
pub const DEFAULT_QUESTIONS: [&str; 3] = [
    "What is your target timeline?",
    "How many people are working on this?",
    "What budget constraints should the plan respect?",
];

/// Who a stage speaks as and which model it calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub persona: String,
    /// Empty means the client default
    pub model: String,
}

/// Everything the planner needs besides the LLM and the templates
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub persona: String,
    pub objective: String,
    pub analyzer: Actor,
    pub planner: Actor,
    pub reviewer: Actor,
    pub chat_model: String,
    /// Extra runs of a stage whose output failed validation
    pub max_validation_retries: u32,
    pub validation: ValidationOptions,
}

impl PlannerSettings {
    pub fn from_config(config: &Config) -> Self {
        let actor = |a: &crate::config::ActorConfig| Actor {
            persona: a.persona.clone(),
            model: a.model(&config.llm).to_string(),
        };
        Self {
            persona: config.persona.clone(),
            objective: config.objective.clone(),
            analyzer: actor(&config.actors.analyzer),
            planner: actor(&config.actors.planner),
            reviewer: actor(&config.actors.reviewer),
            chat_model: config.chat.llm.clone(),
            max_validation_retries: config.pipeline.max_validation_retries,
            validation: ValidationOptions {
                reject_cycles: config.pipeline.reject_dependency_cycles,
            },
        }
    }
}

/// Questions issued at the gate plus the rendered request text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub questions: Vec<String>,
    pub prompt: String,
}

/// Stateless stage runner shared by every conversation
pub struct Planner {
    generator: StructuredGenerator,
    prompts: Arc<PromptLoader>,
    settings: PlannerSettings,
}

impl Planner {
    pub fn new(generator: StructuredGenerator, prompts: Arc<PromptLoader>, settings: PlannerSettings) -> Self {
        debug!(?settings, "Planner::new: called");
        Self {
            generator,
            prompts,
            settings,
        }
    }

    /// Wire a planner from configuration
    pub fn from_config(config: &Config, llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        let generation = GenerationSettings {
            max_attempts: config.pipeline.max_generation_attempts,
            timeout: config.llm.timeout(),
            max_tokens: config.llm.max_tokens,
            show_prompts: config.chat.show_prompts,
            show_responses: config.chat.show_responses,
        };
        Self::new(
            StructuredGenerator::new(llm, generation),
            prompts,
            PlannerSettings::from_config(config),
        )
    }

    fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String, GenerationError> {
        self.prompts
            .render(template, context)
            .map_err(|e| GenerationError::Prompt {
                template: template.to_string(),
                message: e.to_string(),
            })
    }

    fn system_prompt(&self, actor: &Actor, user: &User) -> Result<String, GenerationError> {
        self.render(
            "system",
            &SystemContext {
                persona: &self.settings.persona,
                objective: &self.settings.objective,
                actor_persona: &actor.persona,
                user_name: &user.display_name,
            },
        )
    }

    /// Stage 1: extract ideas from the raw brain dump
    pub async fn analyze(
        &self,
        input: &UserInput,
        user: &User,
        emitter: &EventEmitter,
    ) -> Result<ExtractedIdeas, PlannerError> {
        let stage = Stage::Analyze;
        debug!(input_len = input.content.len(), "Planner::analyze: called");
        info!(%stage, conversation_id = %emitter.conversation_id(), "Stage started");
        emitter.progress(stage.progress_label());

        let generation_error = |source| PlannerError::Generation { stage, source };
        let system = self
            .system_prompt(&self.settings.analyzer, user)
            .map_err(generation_error)?;
        let prompt = self
            .render(stage.template(), &AnalyzeContext { input: &input.content })
            .map_err(generation_error)?;
        let ideas: ExtractedIdeas = self
            .generator
            .generate(
                Prompt {
                    system: &system,
                    user: &prompt,
                    model: &self.settings.analyzer.model,
                },
                emitter,
            )
            .await
            .map_err(generation_error)?;
        info!(
            %stage,
            topics = ideas.topics.len(),
            actions = ideas.actions.len(),
            questions = ideas.clarifying_questions.len(),
            "Stage completed"
        );
        Ok(ideas)
    }

    /// Stage 2 (suspension side): the questions to put to the user
    ///
    /// Falls back to [`DEFAULT_QUESTIONS`] when analysis asked none.
    pub fn gather_context(&self, ideas: &ExtractedIdeas) -> Result<Clarification, PlannerError> {
        let stage = Stage::GatherContext;
        debug!(questions = ideas.clarifying_questions.len(), "Planner::gather_context: called");
        info!(%stage, "Stage started");

        let mut questions: Vec<String> = ideas
            .clarifying_questions
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() {
            debug!("Planner::gather_context: no questions from analysis, using defaults");
            questions = DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect();
        }

        let prompt = self
            .render(
                stage.template(),
                &GatherContext {
                    questions: &questions,
                    project_type: &ideas.project_type,
                },
            )
            .map_err(|source| PlannerError::Generation { stage, source })?;

        Ok(Clarification { questions, prompt })
    }

    /// Stage 3: milestones and tasks from the ideas and the user's answers
    pub async fn structure(
        &self,
        ideas: &ExtractedIdeas,
        context: &ClarifiedContext,
        user: &User,
        emitter: &EventEmitter,
    ) -> Result<ProjectStructure, PlannerError> {
        let stage = Stage::Structure;
        debug!("Planner::structure: called");
        info!(%stage, conversation_id = %emitter.conversation_id(), "Stage started");
        emitter.progress(stage.progress_label());

        let structure = self
            .generate_validated(stage, &self.settings.planner, user, emitter, ProjectStructure::reconciled, |feedback| {
                self.render(
                    stage.template(),
                    &StructureContext {
                        ideas,
                        context,
                        feedback,
                    },
                )
            })
            .await?;

        info!(
            %stage,
            milestones = structure.milestones.len(),
            tasks = structure.tasks.len(),
            "Stage completed"
        );
        Ok(structure)
    }

    /// Stage 4: prioritized, validated plan plus the advisory completeness check
    pub async fn finalize(
        &self,
        structure: &ProjectStructure,
        ideas: &ExtractedIdeas,
        user: &User,
        emitter: &EventEmitter,
    ) -> Result<StructuredPlan, PlannerError> {
        let stage = Stage::Finalize;
        debug!("Planner::finalize: called");
        info!(%stage, conversation_id = %emitter.conversation_id(), "Stage started");
        emitter.progress(stage.progress_label());

        let structure_json = serde_json::to_string_pretty(structure).map_err(|e| PlannerError::Generation {
            stage,
            source: GenerationError::Prompt {
                template: stage.template().to_string(),
                message: e.to_string(),
            },
        })?;

        let plan = self
            .generate_validated(stage, &self.settings.reviewer, user, emitter, StructuredPlan::reconciled, |feedback| {
                self.render(
                    stage.template(),
                    &FinalizeContext {
                        structure_json: structure_json.clone(),
                        ideas,
                        feedback,
                    },
                )
            })
            .await?;

        let report = check_completeness(&plan, ideas);
        if !report.is_complete() {
            warn!(
                unmapped = ?report.unmapped_actions,
                "Finalized plan may not cover every extracted action"
            );
            emitter.progress(format!(
                "Note: these actions may not be covered by any task: {}",
                report.unmapped_actions.join("; ")
            ));
        }

        info!(
            %stage,
            milestones = plan.milestones.len(),
            tasks = plan.tasks.len(),
            risks = plan.risks.len(),
            "Stage completed"
        );
        Ok(plan)
    }

    /// Run a plan-shaped stage, re-running it with the violations fed back
    async fn generate_validated<T, R>(
        &self,
        stage: Stage,
        actor: &Actor,
        user: &User,
        emitter: &EventEmitter,
        reconcile: fn(&T) -> T,
        render: R,
    ) -> Result<T, PlannerError>
    where
        T: StructuredOutput + PlanShape,
        R: Fn(Option<String>) -> Result<String, GenerationError>,
    {
        let generation_error = |source| PlannerError::Generation { stage, source };
        let system = self.system_prompt(actor, user).map_err(generation_error)?;

        let mut feedback = None;
        let mut last_violation: Option<ValidationError> = None;

        for run in 0..=self.settings.max_validation_retries {
            debug!(%stage, run, "Planner::generate_validated: generating");
            let prompt = render(feedback.take()).map_err(generation_error)?;
            let raw: T = self
                .generator
                .generate(
                    Prompt {
                        system: &system,
                        user: &prompt,
                        model: &actor.model,
                    },
                    emitter,
                )
                .await
                .map_err(generation_error)?;

            let candidate = reconcile(&raw);
            match validate_plan(&candidate, self.settings.validation) {
                Ok(()) => return Ok(candidate),
                Err(e) => {
                    warn!(%stage, run, error = %e, "Stage output failed validation");
                    emitter.progress(format!("The {} output had {} problem(s); retrying...", stage, e.violations.len()));
                    feedback = Some(e.feedback());
                    last_violation = Some(e);
                }
            }
        }

        Err(PlannerError::Validation {
            stage,
            source: last_violation.unwrap_or(ValidationError { violations: vec![] }),
        })
    }

    /// Conversational reply for messages that are neither brain dumps nor forms
    pub async fn chat(
        &self,
        message: &str,
        user: &User,
        pending_questions: Option<&[String]>,
        emitter: &EventEmitter,
    ) -> Result<String, GenerationError> {
        debug!(message_len = message.len(), awaiting = pending_questions.is_some(), "Planner::chat: called");
        let system = self.render(
            "chat",
            &ChatContext {
                persona: &self.settings.persona,
                objective: &self.settings.objective,
                user_name: &user.display_name,
                awaiting_input: pending_questions.is_some(),
                questions: pending_questions.unwrap_or(&[]),
            },
        )?;
        self.generator
            .reply(
                Prompt {
                    system: &system,
                    user: message,
                    model: &self.settings.chat_model,
                },
                emitter,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::sample_plan;
    use crate::domain::{Priority, StructuredPlan};
    use crate::hitl::ContextForm;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::{MockLlmClient, MockReply};

    fn ideas_json() -> serde_json::Value {
        serde_json::json!({
            "topics": ["habits"],
            "actions": ["build habit tracker", "add reminders"],
            "constraints": ["3 months"],
            "projectType": "mobile app",
            "estimatedComplexity": "medium",
            "clarifyingQuestions": ["Which platforms?"]
        })
    }

    fn ideas() -> ExtractedIdeas {
        serde_json::from_value(ideas_json()).unwrap()
    }

    fn context() -> ClarifiedContext {
        ContextForm::parse("timeline: 3 months\nteamSize: 2\nbudgetConstraints: none")
            .unwrap()
            .validate()
            .unwrap()
    }

    fn structure_json() -> serde_json::Value {
        let plan = sample_plan();
        serde_json::json!({
            "title": plan.title,
            "summary": plan.summary,
            "milestones": plan.milestones,
            "tasks": plan.tasks,
            "estimatedDuration": plan.estimated_duration
        })
    }

    fn settings() -> PlannerSettings {
        PlannerSettings::from_config(&Config::default())
    }

    fn planner(replies: Vec<MockReply>, settings: PlannerSettings) -> (Planner, Arc<MockLlmClient>) {
        let client = Arc::new(MockLlmClient::with_replies(replies));
        let generator = StructuredGenerator::new(client.clone(), GenerationSettings::default());
        (
            Planner::new(generator, Arc::new(PromptLoader::embedded_only()), settings),
            client,
        )
    }

    fn reply(schema: &str, input: serde_json::Value) -> MockReply {
        MockReply::Response(CompletionResponse::tool_call(format!("submit_{}", schema), input))
    }

    fn user() -> User {
        User::new("Alice", "alice", "USER")
    }

    #[tokio::test]
    async fn test_analyze_uses_analyzer_model_and_input() {
        let mut settings = settings();
        settings.analyzer.model = "analyzer-model".to_string();
        let (planner, client) = planner(vec![reply("extracted_ideas", ideas_json())], settings);

        let ideas = planner
            .analyze(
                &UserInput::new("Build a habit-tracking app"),
                &user(),
                &EventEmitter::detached("c"),
            )
            .await
            .unwrap();
        assert_eq!(ideas.project_type, "mobile app");

        let request = &client.requests()[0];
        assert_eq!(request.model.as_deref(), Some("analyzer-model"));
        assert!(request.messages[0].content.contains("Build a habit-tracking app"));
        assert!(request.system_prompt.contains("Alice"));
    }

    #[tokio::test]
    async fn test_analyze_generation_failure() {
        let (planner, _client) = planner(vec![MockReply::Error("overloaded".to_string())], settings());
        let err = planner
            .analyze(&UserInput::new("x"), &user(), &EventEmitter::detached("c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::pipeline::ErrorKind::Generation);
        assert_eq!(err.stage(), Some(Stage::Analyze));
    }

    #[test]
    fn test_gather_context_renders_questions() {
        let (planner, _client) = planner(vec![], settings());
        let clarification = planner.gather_context(&ideas()).unwrap();
        assert_eq!(clarification.questions, vec!["Which platforms?"]);
        assert!(clarification.prompt.starts_with("Before I create your plan, I have a few questions:\n"));
        assert!(clarification.prompt.contains("Which platforms?"));
    }

    #[test]
    fn test_gather_context_falls_back_to_default_questions() {
        let (planner, _client) = planner(vec![], settings());
        let mut ideas = ideas();
        ideas.clarifying_questions = vec!["  ".to_string()];
        let clarification = planner.gather_context(&ideas).unwrap();
        assert_eq!(clarification.questions.len(), DEFAULT_QUESTIONS.len());
    }

    #[tokio::test]
    async fn test_structure_reconciles_task_ids() {
        let mut raw = structure_json();
        raw["milestones"][0]["taskIds"] = serde_json::json!([]);
        let (planner, client) = planner(vec![reply("project_structure", raw)], settings());

        let structure = planner
            .structure(&ideas(), &context(), &user(), &EventEmitter::detached("c"))
            .await
            .unwrap();
        assert_eq!(structure.milestones[0].task_ids, vec!["t1", "t2"]);

        let prompt = &client.requests()[0].messages[0].content;
        assert!(prompt.contains("Timeline: 3 months"));
        assert!(prompt.contains("Team size: 2"));
    }

    #[tokio::test]
    async fn test_structure_retries_once_with_violation_feedback() {
        let mut bad = structure_json();
        bad["tasks"][0]["dependsOn"] = serde_json::json!(["t1"]);
        let (planner, client) = planner(
            vec![reply("project_structure", bad), reply("project_structure", structure_json())],
            settings(),
        );

        let structure = planner
            .structure(&ideas(), &context(), &user(), &EventEmitter::detached("c"))
            .await
            .unwrap();
        assert_eq!(structure.tasks.len(), 3);
        assert_eq!(client.call_count(), 2);
        assert!(client.requests()[1].messages[0].content.contains("task 't1' depends on itself"));
    }

    #[tokio::test]
    async fn test_structure_fails_after_retry_budget() {
        let mut bad = structure_json();
        bad["tasks"][2]["milestoneId"] = serde_json::json!("m9");
        let (planner, client) = planner(
            vec![reply("project_structure", bad.clone()), reply("project_structure", bad)],
            settings(),
        );

        let err = planner
            .structure(&ideas(), &context(), &user(), &EventEmitter::detached("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Validation { stage: Stage::Structure, .. }));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_finalize_reports_uncovered_actions() {
        let bus = crate::events::EventBus::new(32);
        let mut rx = bus.subscribe();
        let mut plan = serde_json::to_value(sample_plan()).unwrap();
        plan["tasks"][0]["title"] = serde_json::json!("Build habit tracker MVP");
        plan["tasks"][0]["priority"] = serde_json::json!("CRITICAL");
        let (planner, client) = planner(vec![reply("structured_plan", plan)], settings());

        let structure: ProjectStructure = serde_json::from_value(structure_json()).unwrap();
        let plan: StructuredPlan = planner
            .finalize(&structure, &ideas(), &user(), &bus.emitter_for("c"))
            .await
            .unwrap();
        assert_eq!(plan.tasks[0].priority, Priority::Critical);
        assert!(client.requests()[0].messages[0].content.contains("\"milestoneId\""));

        let mut notes = vec![];
        while let Ok(event) = rx.try_recv() {
            notes.push(event.event.text().to_string());
        }
        assert!(notes.iter().any(|n| n.contains("add reminders")));
    }

    #[tokio::test]
    async fn test_chat_uses_chat_model() {
        let mut settings = settings();
        settings.chat_model = "chat-model".to_string();
        let (planner, client) = planner(
            vec![MockReply::Response(CompletionResponse::text("Hi Alice!"))],
            settings,
        );

        let questions = vec!["Which platforms?".to_string()];
        let reply = planner
            .chat("hello?", &user(), Some(&questions), &EventEmitter::detached("c"))
            .await
            .unwrap();
        assert_eq!(reply, "Hi Alice!");

        let request = &client.requests()[0];
        assert_eq!(request.model.as_deref(), Some("chat-model"));
        assert!(request.tools.is_empty());
        assert!(request.system_prompt.contains("Which platforms?"));
    }
}
