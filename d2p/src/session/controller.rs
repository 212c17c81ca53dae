//! ConversationController - host-facing entry point
//!
//! Routes chat messages, owns one worker per conversation, and enforces the
//! HITL wait window. The wait window is enforced twice: a timer expires the
//! gate proactively, and every resume re-checks the issue time in case the
//! timer has not fired yet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::worker::{Job, Worker};
use crate::config::Config;
use crate::events::{ConversationEvent, EventBus};
use crate::hitl::{ContextForm, GateState, GateStore, InMemoryGateStore, PendingGate};
use crate::llm::LlmClient;
use crate::pipeline::{Planner, PlannerError, PlannerResult};
use crate::prompts::PromptLoader;
use crate::user::{InMemoryUserStore, User, UserStore};

/// Controller knobs
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub hitl_timeout: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hitl_timeout: config.pipeline.hitl_timeout(),
        }
    }
}

/// What `submit_message` did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message started a run or answered the gate
    Planner(PlannerResult),
    /// The message was ordinary chat while the gate waits
    Chat(String),
}

struct Conversation {
    user: User,
    inbox: mpsc::Sender<Job>,
    worker: JoinHandle<()>,
    timer: Option<JoinHandle<()>>,
}

impl Conversation {
    fn abort(&mut self) {
        self.worker.abort();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct ConversationController {
    planner: Arc<Planner>,
    gates: Arc<dyn GateStore>,
    users: Arc<dyn UserStore>,
    bus: Arc<EventBus>,
    settings: ControllerSettings,
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl ConversationController {
    pub fn new(
        planner: Arc<Planner>,
        gates: Arc<dyn GateStore>,
        users: Arc<dyn UserStore>,
        bus: Arc<EventBus>,
        settings: ControllerSettings,
    ) -> Self {
        debug!(?settings, "ConversationController::new: called");
        Self {
            planner,
            gates,
            users,
            bus,
            settings,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Wire a controller with in-memory stores from configuration
    pub fn from_config(config: &Config, llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self::new(
            Arc::new(Planner::from_config(config, llm, prompts)),
            Arc::new(InMemoryGateStore::new()),
            Arc::new(InMemoryUserStore::from_config(&config.users)),
            Arc::new(EventBus::with_default_capacity()),
            ControllerSettings::from_config(config),
        )
    }

    fn conversations(&self) -> MutexGuard<'_, HashMap<String, Conversation>> {
        match self.conversations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ConversationController: conversation map lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn spawn_worker(&self, conversation_id: &str, user: &User) -> (mpsc::Sender<Job>, JoinHandle<()>) {
        Worker::new(
            conversation_id.to_string(),
            user.clone(),
            self.planner.clone(),
            self.gates.clone(),
            self.bus.emitter_for(conversation_id),
        )
        .spawn()
    }

    /// Open a conversation bound to a user (the default user when `None`)
    pub fn start_conversation(&self, username: Option<&str>) -> Result<String, SessionError> {
        debug!(?username, "ConversationController::start_conversation: called");
        let user = match username {
            Some(name) => self
                .users
                .find_by_username(name)
                .ok_or_else(|| SessionError::UnknownUser(name.to_string()))?,
            None => self.users.default_user(),
        };

        let conversation_id = uuid::Uuid::now_v7().to_string();
        let (inbox, worker) = self.spawn_worker(&conversation_id, &user);
        info!(%conversation_id, user = %user.username, "Conversation started");
        self.conversations().insert(
            conversation_id.clone(),
            Conversation {
                user,
                inbox,
                worker,
                timer: None,
            },
        );
        Ok(conversation_id)
    }

    /// User bound to a conversation
    pub fn user(&self, conversation_id: &str) -> Option<User> {
        self.conversations().get(conversation_id).map(|c| c.user.clone())
    }

    fn inbox(&self, conversation_id: &str) -> Result<mpsc::Sender<Job>, SessionError> {
        self.conversations()
            .get(conversation_id)
            .map(|c| c.inbox.clone())
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.to_string()))
    }

    fn enqueue(&self, conversation_id: &str, inbox: &mpsc::Sender<Job>, job: Job) -> Result<(), SessionError> {
        inbox.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::Busy(conversation_id.to_string()),
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    /// Start a fresh run from a brain dump
    ///
    /// Any earlier gate for the conversation is discarded. Returns
    /// `AwaitingInput` once the clarifying questions are out.
    pub async fn run_planner(&self, conversation_id: &str, user_text: &str) -> Result<PlannerResult, SessionError> {
        debug!(%conversation_id, len = user_text.len(), "ConversationController::run_planner: called");
        if user_text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let inbox = self.inbox(conversation_id)?;
        let (reply, rx) = oneshot::channel();
        self.enqueue(
            conversation_id,
            &inbox,
            Job::Run {
                text: user_text.to_string(),
                reply,
            },
        )?;
        self.disarm_timer(conversation_id);

        let result = rx.await.unwrap_or(PlannerResult::Failed(PlannerError::Interrupted));
        if result.is_awaiting_input() {
            self.arm_timer(conversation_id);
        }
        Ok(result)
    }

    /// Answer the clarifying questions of a suspended run
    ///
    /// Rejected with [`SessionError::NotAwaitingInput`] unless the gate is
    /// AWAITING_INPUT. A gate whose wait window has passed yields
    /// `Failed(HitlTimeout)` and is gone afterwards.
    pub async fn resume_with_context(
        &self,
        conversation_id: &str,
        form: ContextForm,
    ) -> Result<PlannerResult, SessionError> {
        debug!(%conversation_id, "ConversationController::resume_with_context: called");
        let inbox = self.inbox(conversation_id)?;

        self.expire_if_overdue(conversation_id);
        if self.gates.take_expired(conversation_id) {
            info!(%conversation_id, "Submission arrived after the gate expired");
            return Ok(PlannerResult::Failed(self.timeout_error()));
        }

        // Reserve the inbox slot before claiming the gate so a busy worker
        // leaves the gate untouched
        let permit = inbox.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::Busy(conversation_id.to_string()),
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })?;
        let gate = self
            .gates
            .begin_resume(conversation_id)
            .map_err(|_| SessionError::NotAwaitingInput {
                conversation_id: conversation_id.to_string(),
                state: self.gate_state(conversation_id),
            })?;

        let (reply, rx) = oneshot::channel();
        permit.send(Job::Resume { gate, form, reply });

        let result = rx.await.unwrap_or(PlannerResult::Failed(PlannerError::Interrupted));
        if !result.is_awaiting_input() {
            self.disarm_timer(conversation_id);
        }
        Ok(result)
    }

    /// Route a chat message
    ///
    /// - gate awaiting input and the message is a form: resume
    /// - gate awaiting input otherwise: conversational reply, gate untouched
    /// - no gate: the message is a brain dump and starts a run
    pub async fn submit_message(&self, conversation_id: &str, text: &str) -> Result<SubmitOutcome, SessionError> {
        debug!(%conversation_id, len = text.len(), "ConversationController::submit_message: called");
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.inbox(conversation_id)?;
        self.expire_if_overdue(conversation_id);

        match self.gates.get(conversation_id) {
            Some(gate) if gate.is_awaiting_input() => match ContextForm::parse(text) {
                Some(form) => {
                    debug!(%conversation_id, "submit_message: routing to resume");
                    Ok(SubmitOutcome::Planner(self.resume_with_context(conversation_id, form).await?))
                }
                None => {
                    debug!(%conversation_id, "submit_message: routing to chat");
                    Ok(SubmitOutcome::Chat(self.chat(conversation_id, text, gate).await?))
                }
            },
            Some(gate) => Err(SessionError::NotAwaitingInput {
                conversation_id: conversation_id.to_string(),
                state: Some(gate.state()),
            }),
            None => {
                if ContextForm::parse(text).is_some() && self.gates.take_expired(conversation_id) {
                    info!(%conversation_id, "Form arrived after the gate expired");
                    return Ok(SubmitOutcome::Planner(PlannerResult::Failed(self.timeout_error())));
                }
                debug!(%conversation_id, "submit_message: routing to run_planner");
                Ok(SubmitOutcome::Planner(self.run_planner(conversation_id, text).await?))
            }
        }
    }

    async fn chat(&self, conversation_id: &str, text: &str, gate: PendingGate) -> Result<String, SessionError> {
        let inbox = self.inbox(conversation_id)?;
        let (reply, rx) = oneshot::channel();
        self.enqueue(
            conversation_id,
            &inbox,
            Job::Chat {
                text: text.to_string(),
                questions: Some(gate.questions),
                reply,
            },
        )?;
        match rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Drop the conversation's gate, timer and in-flight work
    ///
    /// Callers waiting on the old worker see `Failed(Interrupted)`. The
    /// conversation stays open with a fresh worker.
    pub fn reset(&self, conversation_id: &str) -> Result<(), SessionError> {
        debug!(%conversation_id, "ConversationController::reset: called");
        let mut conversations = self.conversations();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| SessionError::UnknownConversation(conversation_id.to_string()))?;

        conversation.abort();
        self.gates.clear(conversation_id);
        let (inbox, worker) = self.spawn_worker(conversation_id, &conversation.user);
        conversation.inbox = inbox;
        conversation.worker = worker;
        info!(%conversation_id, "Conversation reset");
        Ok(())
    }

    /// Current gate state, if the conversation has a gate
    pub fn gate_state(&self, conversation_id: &str) -> Option<GateState> {
        self.gates.get(conversation_id).map(|g| g.state())
    }

    /// Clarifying questions the conversation is waiting on
    pub fn pending_questions(&self, conversation_id: &str) -> Option<Vec<String>> {
        self.gates
            .get(conversation_id)
            .filter(|g| g.is_awaiting_input())
            .map(|g| g.questions)
    }

    /// Progress and message events for every conversation
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.bus.subscribe()
    }

    /// Stop every worker and timer and forget all conversations
    pub fn shutdown(&self) {
        let mut conversations = self.conversations();
        info!(count = conversations.len(), "ConversationController::shutdown: called");
        for (conversation_id, mut conversation) in conversations.drain() {
            conversation.abort();
            self.gates.clear(&conversation_id);
        }
    }

    fn timeout_error(&self) -> PlannerError {
        PlannerError::HitlTimeout {
            timeout_ms: self.settings.hitl_timeout.as_millis() as u64,
        }
    }

    fn expire_if_overdue(&self, conversation_id: &str) {
        let Some(gate) = self.gates.get(conversation_id) else {
            return;
        };
        if gate.is_expired_at(Utc::now(), self.settings.hitl_timeout)
            && self.gates.expire(conversation_id, &gate.id).is_some()
        {
            warn!(%conversation_id, gate_id = %gate.id, "Gate expired before an answer arrived");
            self.bus
                .emitter_for(conversation_id)
                .message(self.timeout_error().user_message());
        }
    }

    fn arm_timer(&self, conversation_id: &str) {
        let Some(gate) = self.gates.get(conversation_id) else {
            return;
        };
        let gates = self.gates.clone();
        let emitter = self.bus.emitter_for(conversation_id);
        let timeout = self.settings.hitl_timeout;
        let message = self.timeout_error().user_message();
        let cid = conversation_id.to_string();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if gates.expire(&cid, &gate.id).is_some() {
                warn!(conversation_id = %cid, gate_id = %gate.id, "Gate expired before an answer arrived");
                emitter.message(message);
            }
        });

        if let Some(conversation) = self.conversations().get_mut(conversation_id) {
            if let Some(old) = conversation.timer.replace(timer) {
                old.abort();
            }
        } else {
            timer.abort();
        }
    }

    fn disarm_timer(&self, conversation_id: &str) {
        if let Some(timer) = self
            .conversations()
            .get_mut(conversation_id)
            .and_then(|c| c.timer.take())
        {
            timer.abort();
        }
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::sample_plan;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::llm::{CompletionResponse, GenerationSettings, StructuredGenerator};
    use crate::pipeline::{ErrorKind, PlannerSettings};

    fn ideas() -> serde_json::Value {
        serde_json::json!({
            "topics": ["habits"],
            "actions": ["build habit tracker"],
            "constraints": [],
            "projectType": "mobile app",
            "estimatedComplexity": "medium",
            "clarifyingQuestions": ["Which platforms?"]
        })
    }

    fn tool(schema: &str, input: serde_json::Value) -> MockReply {
        MockReply::Response(CompletionResponse::tool_call(format!("submit_{}", schema), input))
    }

    fn controller(replies: Vec<MockReply>, hitl_timeout: Duration) -> (ConversationController, Arc<MockLlmClient>) {
        let client = Arc::new(MockLlmClient::with_replies(replies));
        let planner = Planner::new(
            StructuredGenerator::new(client.clone(), GenerationSettings::default()),
            Arc::new(PromptLoader::embedded_only()),
            PlannerSettings::from_config(&Config::default()),
        );
        let controller = ConversationController::new(
            Arc::new(planner),
            Arc::new(InMemoryGateStore::new()),
            Arc::new(InMemoryUserStore::default()),
            Arc::new(EventBus::new(64)),
            ControllerSettings { hitl_timeout },
        );
        (controller, client)
    }

    fn form() -> ContextForm {
        ContextForm::new("3 months", "2", "none", "")
    }

    #[tokio::test]
    async fn test_start_conversation_binds_user() {
        let (controller, _client) = controller(vec![], Duration::from_secs(60));
        let id = controller.start_conversation(Some("alice")).unwrap();
        assert_eq!(controller.user(&id).unwrap().username, "alice");

        let id = controller.start_conversation(None).unwrap();
        assert_eq!(controller.user(&id).unwrap().username, "user");

        assert_eq!(
            controller.start_conversation(Some("mallory")),
            Err(SessionError::UnknownUser("mallory".to_string()))
        );
    }

    #[tokio::test]
    async fn test_run_and_resume_completes_plan() {
        let (controller, client) = controller(
            vec![
                tool("extracted_ideas", ideas()),
                tool("project_structure", serde_json::to_value(sample_plan()).unwrap()),
                tool("structured_plan", serde_json::to_value(sample_plan()).unwrap()),
            ],
            Duration::from_secs(60),
        );
        let id = controller.start_conversation(None).unwrap();

        let result = controller.run_planner(&id, "Build a habit app").await.unwrap();
        assert_eq!(
            result,
            PlannerResult::AwaitingInput {
                questions: vec!["Which platforms?".to_string()]
            }
        );
        assert_eq!(controller.gate_state(&id), Some(GateState::AwaitingInput));

        let result = controller.resume_with_context(&id, form()).await.unwrap();
        assert_eq!(result.plan().unwrap().title, "Test Project");
        assert_eq!(controller.gate_state(&id), None);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_resume_without_gate_is_rejected() {
        let (controller, client) = controller(vec![], Duration::from_secs(60));
        let id = controller.start_conversation(None).unwrap();
        let err = controller.resume_with_context(&id, form()).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::NotAwaitingInput {
                conversation_id: id.clone(),
                state: None
            }
        );
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_form_reprompts() {
        let (controller, _client) = controller(vec![tool("extracted_ideas", ideas())], Duration::from_secs(60));
        let id = controller.start_conversation(None).unwrap();
        controller.run_planner(&id, "Build a habit app").await.unwrap();

        let result = controller
            .resume_with_context(&id, ContextForm::new("", "2", "none", ""))
            .await
            .unwrap();
        assert!(result.is_awaiting_input());
        let gate = controller.gates.get(&id).unwrap();
        assert_eq!(gate.state(), GateState::AwaitingInput);
        assert_eq!(gate.rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_form_during_finish_is_rejected() {
        let (controller, client) = controller(
            vec![
                tool("extracted_ideas", ideas()),
                MockReply::Delay(
                    Duration::from_millis(300),
                    CompletionResponse::tool_call(
                        "submit_project_structure",
                        serde_json::to_value(sample_plan()).unwrap(),
                    ),
                ),
                tool("structured_plan", serde_json::to_value(sample_plan()).unwrap()),
            ],
            Duration::from_secs(60),
        );
        let controller = Arc::new(controller);
        let id = controller.start_conversation(None).unwrap();
        controller.run_planner(&id, "Build a habit app").await.unwrap();

        let text = "timeline: 3 months\nteamSize: 2\nbudget: none";
        let first = {
            let controller = controller.clone();
            let id = id.clone();
            tokio::spawn(async move { controller.submit_message(&id, text).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.gate_state(&id), Some(GateState::Resumed));

        let repeat = controller.submit_message(&id, text).await;
        assert_eq!(
            repeat,
            Err(SessionError::NotAwaitingInput {
                conversation_id: id.clone(),
                state: Some(GateState::Resumed)
            })
        );

        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SubmitOutcome::Planner(PlannerResult::Completed(_))));
        assert_eq!(controller.gate_state(&id), None);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_analyze_failure_leaves_no_gate() {
        let (controller, _client) = controller(vec![MockReply::Error("down".to_string())], Duration::from_secs(60));
        let id = controller.start_conversation(None).unwrap();
        let result = controller.run_planner(&id, "Build a habit app").await.unwrap();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Generation);
        assert_eq!(controller.gate_state(&id), None);
    }

    #[tokio::test]
    async fn test_hitl_timeout_then_fresh_run() {
        let (controller, _client) = controller(
            vec![tool("extracted_ideas", ideas()), tool("extracted_ideas", ideas())],
            Duration::from_millis(50),
        );
        let id = controller.start_conversation(None).unwrap();
        controller.run_planner(&id, "Build a habit app").await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let result = controller.resume_with_context(&id, form()).await.unwrap();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::HitlTimeout);
        assert_eq!(controller.gate_state(&id), None);

        let result = controller.run_planner(&id, "Build a habit app").await.unwrap();
        assert!(result.is_awaiting_input());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (controller, _client) = controller(vec![], Duration::from_secs(60));
        let id = controller.start_conversation(None).unwrap();
        assert_eq!(controller.submit_message(&id, "  ").await, Err(SessionError::EmptyMessage));
        assert!(matches!(
            controller.submit_message("nope", "hi").await,
            Err(SessionError::UnknownConversation(_))
        ));
    }
}
