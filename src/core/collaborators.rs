//! Collaborator contracts: escalation, external orchestrator and qualifier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ProcessingMode, SchedulerError, Task, TaskId};

/// A task handed to a human for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    /// Escalated task.
    pub task_id: TaskId,
    /// Owning client.
    pub client_id: String,
    /// Scheduling class of the task.
    pub processing_mode: ProcessingMode,
    /// Why the task needs a human.
    pub reason: String,
    /// Underlying error, if the escalation stems from a failure.
    pub error: Option<String>,
    /// Question to put to the user.
    pub pending_question: Option<String>,
    /// Context for the question.
    pub question_context: Option<String>,
    /// Whether the user must approve an action rather than answer a question.
    pub is_approval: bool,
}

impl Escalation {
    /// Escalation for `task` with a reason and no question.
    pub fn for_task(task: &Task, reason: impl Into<String>) -> Self {
        Self {
            task_id: task.id,
            client_id: task.client_id.clone(),
            processing_mode: task.processing_mode(),
            reason: reason.into(),
            error: None,
            pending_question: None,
            question_context: None,
            is_approval: false,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach a question for the user.
    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>, context: Option<String>) -> Self {
        self.pending_question = Some(question.into());
        self.question_context = context;
        self
    }

    /// Mark as requiring approval.
    #[must_use]
    pub const fn approval(mut self, is_approval: bool) -> Self {
        self.is_approval = is_approval;
        self
    }
}

/// Human-facing queue for tasks that cannot complete automatically.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    /// Record an escalation. The scheduler sets task state separately.
    async fn escalate(&self, escalation: Escalation) -> Result<(), SchedulerError>;
}

/// What an interrupted orchestrator thread is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// A pure question; no approval semantics.
    Clarification,
    /// A destructive or externally visible action needs sign-off.
    Approval,
}

impl InterruptKind {
    /// Derive the kind from the orchestrator's action tag.
    ///
    /// Missing tags and the clarification tags mean a question; any other tag
    /// names an action awaiting approval.
    #[must_use]
    pub fn from_action(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            None | Some("" | "clarify" | "clarification" | "question" | "ask_user") => {
                Self::Clarification
            }
            Some(_) => Self::Approval,
        }
    }
}

/// Status reported by the external orchestrator for a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorStatus {
    /// Still working.
    Running,
    /// Waiting for the user.
    Interrupted {
        /// Action tag, if any.
        action: Option<String>,
        /// What the thread is asking.
        description: Option<String>,
    },
    /// Finished.
    Done {
        /// Final summary.
        summary: Option<String>,
    },
    /// Failed.
    Error {
        /// Failure detail.
        error: Option<String>,
    },
}

/// Client for the external long-running orchestrator.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Current status of `thread_id`. Errors mean the orchestrator is unreachable.
    async fn status(&self, thread_id: &str) -> Result<OrchestratorStatus, SchedulerError>;
}

/// External qualifier promoting `QUALIFYING` tasks.
#[async_trait]
pub trait Qualifier: Send + Sync {
    /// Qualify one pending task. Returns `true` if a task was processed.
    async fn qualify_next(&self) -> Result<bool, SchedulerError>;
}
