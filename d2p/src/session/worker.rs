//! Per-conversation worker
//!
//! Owns no state of its own: everything that must survive between jobs lives
//! in the gate store. Jobs run one at a time in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::{ClarifiedContext, ExtractedIdeas, UserInput};
use crate::events::EventEmitter;
use crate::export::to_markdown;
use crate::hitl::{ContextForm, GateStore, PendingGate};
use crate::llm::GenerationError;
use crate::pipeline::{Planner, PlannerError, PlannerResult};
use crate::user::User;

/// Bounded inbox depth per conversation
pub const INBOX_CAPACITY: usize = 1;

pub(crate) enum Job {
    Run {
        text: String,
        reply: oneshot::Sender<PlannerResult>,
    },
    /// The gate has already been claimed (RESUMING) by the controller
    Resume {
        gate: PendingGate,
        form: ContextForm,
        reply: oneshot::Sender<PlannerResult>,
    },
    Chat {
        text: String,
        questions: Option<Vec<String>>,
        reply: oneshot::Sender<Result<String, GenerationError>>,
    },
}

pub(crate) struct Worker {
    conversation_id: String,
    user: User,
    planner: Arc<Planner>,
    gates: Arc<dyn GateStore>,
    emitter: EventEmitter,
}

impl Worker {
    pub(crate) fn new(
        conversation_id: String,
        user: User,
        planner: Arc<Planner>,
        gates: Arc<dyn GateStore>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            conversation_id,
            user,
            planner,
            gates,
            emitter,
        }
    }

    /// Start the worker; the sender is the conversation's inbox
    pub(crate) fn spawn(self) -> (mpsc::Sender<Job>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    async fn run(self, mut inbox: mpsc::Receiver<Job>) {
        debug!(conversation_id = %self.conversation_id, "Worker::run: started");
        while let Some(job) = inbox.recv().await {
            match job {
                Job::Run { text, reply } => {
                    let result = self.run_planner(&text).await;
                    let _ = reply.send(result);
                }
                Job::Resume { gate, form, reply } => {
                    let result = self.resume(gate, form).await;
                    let _ = reply.send(result);
                }
                Job::Chat { text, questions, reply } => {
                    let result = self.chat(&text, questions.as_deref()).await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!(conversation_id = %self.conversation_id, "Worker::run: inbox closed");
    }

    /// analyze, then suspend at the gate
    async fn run_planner(&self, text: &str) -> PlannerResult {
        debug!(conversation_id = %self.conversation_id, "Worker::run_planner: called");
        self.gates.clear(&self.conversation_id);

        let ideas = match self
            .planner
            .analyze(&UserInput::new(text), &self.user, &self.emitter)
            .await
        {
            Ok(ideas) => ideas,
            Err(e) => return self.fail(e),
        };

        let clarification = match self.planner.gather_context(&ideas) {
            Ok(c) => c,
            Err(e) => return self.fail(e),
        };

        let gate = PendingGate::new(
            &self.conversation_id,
            ideas,
            clarification.questions.clone(),
            clarification.prompt.clone(),
        );
        info!(conversation_id = %self.conversation_id, gate_id = %gate.id, "Waiting for clarifying answers");
        self.gates.put(gate);
        self.emitter.message(clarification.prompt);

        PlannerResult::AwaitingInput {
            questions: clarification.questions,
        }
    }

    /// Validate the submission and, when it holds, run structure and finalize
    async fn resume(&self, mut gate: PendingGate, form: ContextForm) -> PlannerResult {
        debug!(conversation_id = %self.conversation_id, gate_id = %gate.id, "Worker::resume: called");
        match gate.complete(&form) {
            Ok(context) => {
                // RESUMED stays visible until the run ends so repeats are turned away
                self.gates.put(gate.clone());
                let result = self.finish(&gate.ideas, &context).await;
                self.gates.remove(&self.conversation_id);
                result
            }
            Err(e) => {
                warn!(
                    conversation_id = %self.conversation_id,
                    rejected = gate.rejected_count(),
                    error = %e,
                    "Form submission rejected"
                );
                if let Err(e) = gate.reopen() {
                    warn!(error = %e, "Worker::resume: could not reopen gate");
                }
                self.gates.put(gate.clone());
                self.emitter.message(format!("I still need a few answers ({}).\n\n{}", e, gate.prompt));
                PlannerResult::AwaitingInput {
                    questions: gate.questions,
                }
            }
        }
    }

    async fn finish(&self, ideas: &ExtractedIdeas, context: &ClarifiedContext) -> PlannerResult {
        let structure = match self.planner.structure(ideas, context, &self.user, &self.emitter).await {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        let plan = match self.planner.finalize(&structure, ideas, &self.user, &self.emitter).await {
            Ok(p) => p,
            Err(e) => return self.fail(e),
        };

        info!(
            conversation_id = %self.conversation_id,
            title = %plan.title,
            tasks = plan.tasks.len(),
            "Plan completed"
        );
        self.emitter.message(to_markdown(&plan));
        PlannerResult::Completed(plan)
    }

    async fn chat(&self, text: &str, questions: Option<&[String]>) -> Result<String, GenerationError> {
        debug!(conversation_id = %self.conversation_id, "Worker::chat: called");
        let reply = self.planner.chat(text, &self.user, questions, &self.emitter).await?;
        self.emitter.message(reply.clone());
        Ok(reply)
    }

    fn fail(&self, error: PlannerError) -> PlannerResult {
        warn!(
            conversation_id = %self.conversation_id,
            kind = ?error.kind(),
            stage = ?error.stage(),
            error = %error,
            "Planner run failed"
        );
        self.emitter.message(error.user_message());
        PlannerResult::Failed(error)
    }
}
