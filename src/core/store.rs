//! Task store abstraction. The store is the single source of truth for task state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{QueueSnapshot, SchedulerError, Task, TaskId, TaskState};

/// Durable repository of tasks.
///
/// Selection queries only return tasks in an eligible state
/// ([`TaskState::is_eligible`]).
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task.
    async fn create_task(&self, task: Task) -> Result<(), SchedulerError>;

    /// Load a task by id.
    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, SchedulerError>;

    /// Next eligible foreground task by `queue_position`, ties by creation time.
    async fn next_foreground_task(&self) -> Result<Option<Task>, SchedulerError>;

    /// Oldest eligible background task.
    async fn next_background_task(&self) -> Result<Option<Task>, SchedulerError>;

    /// Set a task's state.
    async fn update_state(&self, id: TaskId, state: TaskState) -> Result<(), SchedulerError>;

    /// Remove a task.
    async fn delete_task(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Append resumable progress to a task.
    async fn append_progress_context(&self, id: TaskId, text: &str)
        -> Result<(), SchedulerError>;

    /// Mark a task as holding the GPU slot, for queue introspection.
    async fn mark_running(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Clear the running marker if it still names `id`.
    async fn clear_running(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Record delegation: state becomes `PYTHON_ORCHESTRATING`.
    async fn mark_orchestrating(
        &self,
        id: TaskId,
        thread_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError>;

    /// Clear the orchestrator thread id and start time.
    async fn clear_orchestration(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Attach a failure or escalation reason.
    async fn set_error_reason(&self, id: TaskId, reason: &str) -> Result<(), SchedulerError>;

    /// All tasks currently in `state`.
    async fn tasks_in_state(&self, state: TaskState) -> Result<Vec<Task>, SchedulerError>;

    /// Timestamp of the newest user message attached to a task's conversation.
    async fn latest_user_message_at(
        &self,
        id: TaskId,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError>;

    /// Queue depth and up to `preview_limit` pending previews.
    async fn queue_snapshot(&self, preview_limit: usize) -> Result<QueueSnapshot, SchedulerError>;
}
