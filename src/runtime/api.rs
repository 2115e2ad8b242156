//! API-facing request/response models for hosts embedding the scheduler.

use serde::{Deserialize, Serialize};

use crate::core::{
    ProcessingMode, QueueStatus, Scheduler, SchedulerError, SchedulerStats, Task, TaskId,
    TaskState, TaskStore, TaskType,
};

/// Task submission payload from a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Owning client.
    pub client_id: String,
    /// Optional project scope.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Scheduling class.
    pub processing_mode: ProcessingMode,
    /// Payload category.
    pub task_type: TaskType,
    /// Opaque payload.
    pub content: String,
    /// Foreground ordering; ignored for background work.
    #[serde(default)]
    pub queue_position: Option<i64>,
    /// Correlation id; generated when absent.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Task status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current state.
    pub state: TaskState,
    /// Scheduling class.
    pub processing_mode: ProcessingMode,
    /// Whether the task holds the GPU slot right now.
    pub running: bool,
    /// Failure or escalation reason.
    pub reason: Option<String>,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: loops started and not shutting down.
    pub ok: bool,
    /// Whether a job holds the GPU slot.
    pub slot_occupied: bool,
    /// Consecutive communication failures; non-zero means a dependency is down.
    pub consecutive_failures: u32,
}

/// Enqueue a submission in `QUALIFYING` for the qualifier to pick up.
pub async fn submit_task(
    store: &dyn TaskStore,
    req: TaskSubmission,
) -> Result<TaskId, SchedulerError> {
    let mut task = Task::for_mode(req.processing_mode, req.task_type, req.client_id, req.content);
    if task.is_foreground() {
        task.queue_position = req.queue_position;
    }
    if let Some(project_id) = req.project_id {
        task = task.with_project(project_id);
    }
    if let Some(correlation_id) = req.correlation_id {
        task = task.with_correlation_id(correlation_id);
    }
    let task_id = task.id;
    store.create_task(task).await?;
    tracing::debug!(task_id = %task_id, "task submitted");
    Ok(task_id)
}

/// Status of one task.
pub async fn task_status(
    scheduler: &Scheduler,
    store: &dyn TaskStore,
    task_id: TaskId,
) -> Result<TaskStatusResponse, SchedulerError> {
    let task = store
        .get_task(task_id)
        .await?
        .ok_or(SchedulerError::TaskNotFound(task_id))?;
    Ok(TaskStatusResponse {
        task_id,
        state: task.state,
        processing_mode: task.processing_mode(),
        running: scheduler.current_task() == Some(task_id),
        reason: task.error_reason,
    })
}

/// Running task plus pending queue.
pub async fn queue_status(scheduler: &Scheduler) -> Result<QueueStatus, SchedulerError> {
    scheduler.queue_status().await
}

/// Return a health payload.
#[must_use]
pub fn health(scheduler: &Scheduler) -> Health {
    let SchedulerStats {
        started,
        shutting_down,
        consecutive_failures,
        current_task,
        ..
    } = scheduler.stats();
    Health {
        ok: started && !shutting_down,
        slot_occupied: current_task.is_some(),
        consecutive_failures,
    }
}
