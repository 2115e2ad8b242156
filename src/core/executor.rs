//! Task execution trait and the context handed to each run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{EventSink, ExecutionError, SchedulerEvent, Task, TaskId};

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The payload finished; `output` is the final result.
    Completed {
        /// Final output text.
        output: String,
    },
    /// The payload was handed to the external orchestrator.
    Delegated {
        /// Orchestrator thread to poll.
        thread_id: String,
    },
}

/// Progress callback bound to one task.
#[derive(Clone)]
pub struct ProgressSink {
    task_id: TaskId,
    correlation_id: String,
    events: Arc<dyn EventSink>,
}

impl ProgressSink {
    /// Bind a sink to a task.
    pub fn new(task: &Task, events: Arc<dyn EventSink>) -> Self {
        Self {
            task_id: task.id,
            correlation_id: task.correlation_id.clone(),
            events,
        }
    }

    /// Forward an intermediate message.
    pub fn report(&self, message: impl Into<String>, metadata: HashMap<String, String>) {
        self.events.publish(SchedulerEvent::Progress {
            task_id: self.task_id,
            correlation_id: self.correlation_id.clone(),
            message: message.into(),
            metadata,
        });
    }
}

/// Per-run context: cancellation, progress and checkpointing.
///
/// Executors must call [`check`](Self::check) (or select on
/// [`cancelled`](Self::cancelled)) between payload steps.
#[derive(Clone)]
pub struct ExecutionContext {
    token: CancellationToken,
    progress: ProgressSink,
    checkpoint: Arc<Mutex<Option<String>>>,
}

impl ExecutionContext {
    /// Create a context around a job token.
    #[must_use]
    pub fn new(token: CancellationToken, progress: ProgressSink) -> Self {
        Self {
            token,
            progress,
            checkpoint: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether the scheduler asked this run to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Return `Err(Cancelled)` carrying the latest checkpoint if cancellation was requested.
    pub fn check(&self) -> Result<(), ExecutionError> {
        if self.token.is_cancelled() {
            return Err(ExecutionError::Cancelled {
                checkpoint: self.latest_checkpoint(),
            });
        }
        Ok(())
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Token for passing into external calls.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Report progress.
    pub fn progress(&self, message: impl Into<String>) {
        self.progress.report(message, HashMap::new());
    }

    /// Report progress with metadata.
    pub fn progress_with(&self, message: impl Into<String>, metadata: HashMap<String, String>) {
        self.progress.report(message, metadata);
    }

    /// Record resumable progress. Replaces any earlier checkpoint.
    pub fn checkpoint(&self, state: impl Into<String>) {
        *self.checkpoint.lock() = Some(state.into());
    }

    /// Latest recorded checkpoint.
    #[must_use]
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.checkpoint.lock().clone()
    }
}

/// Runs a task's payload. Implemented by the host application.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use gpu_slot_scheduler::core::{
///     ExecutionContext, ExecutionError, ExecutionOutcome, Task, TaskExecutor,
/// };
///
/// struct EchoExecutor;
///
/// #[async_trait]
/// impl TaskExecutor for EchoExecutor {
///     async fn run(
///         &self,
///         task: &Task,
///         ctx: ExecutionContext,
///     ) -> Result<ExecutionOutcome, ExecutionError> {
///         ctx.check()?;
///         ctx.progress("thinking");
///         Ok(ExecutionOutcome::Completed { output: task.content.clone() })
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    /// Execute `task` until it completes, delegates, fails or observes cancellation.
    ///
    /// Timeouts are the executor's concern and should surface as a
    /// communication-class [`ExecutionError`].
    async fn run(
        &self,
        task: &Task,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}
