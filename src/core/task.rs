//! Task model: identity, processing class and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier.
pub type TaskId = Uuid;

/// Scheduling class of a task. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingMode {
    /// Interactive, user-visible work. Always wins the GPU slot.
    Foreground,
    /// Autonomous work that only fills idle time.
    Background,
}

/// Lifecycle state of a task in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting for the external qualifier.
    Qualifying,
    /// Eligible for the GPU slot.
    ReadyForGpu,
    /// Dispatched; foreground tasks stay here after completion as conversation context.
    DispatchedGpu,
    /// Delegated to the external long-running orchestrator.
    PythonOrchestrating,
    /// Failed terminally.
    Error,
    /// Waiting for a human.
    UserTask,
}

impl TaskState {
    /// Whether the execution loop may select a task in this state.
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::ReadyForGpu)
    }
}

/// Payload category. Opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Chat or other direct user input.
    UserInput,
    /// Materialized from a scheduled definition.
    ScheduledJob,
    /// Wiki page ingestion.
    WikiIngestion,
    /// Bugtracker issue ingestion.
    BugtrackerIngestion,
    /// Email ingestion.
    EmailIngestion,
    /// Git history ingestion.
    GitIngestion,
    /// Any other producer-defined category.
    Other(String),
}

/// Central unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Cross-component tracing id.
    pub correlation_id: String,
    /// Owning client.
    pub client_id: String,
    /// Optional project scope.
    pub project_id: Option<String>,
    /// Payload category.
    pub task_type: TaskType,
    processing_mode: ProcessingMode,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Ordering among foreground tasks; `None` for background tasks.
    pub queue_position: Option<i64>,
    /// Opaque payload for the executor.
    pub content: String,
    /// Creation time, used for FIFO ordering and tie breaks.
    pub created_at: DateTime<Utc>,
    /// External orchestrator thread, set while delegated.
    pub orchestrator_thread_id: Option<String>,
    /// When delegation started.
    pub orchestration_started_at: Option<DateTime<Utc>>,
    /// Opaque executor resumption state.
    pub agent_checkpoint_json: Option<String>,
    /// Progress appended when a run was interrupted.
    pub progress_context: Vec<String>,
    /// Reason attached on escalation or failure.
    pub error_reason: Option<String>,
}

impl Task {
    fn new(
        mode: ProcessingMode,
        task_type: TaskType,
        client_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            correlation_id: id.to_string(),
            client_id: client_id.into(),
            project_id: None,
            task_type,
            processing_mode: mode,
            state: TaskState::Qualifying,
            queue_position: None,
            content: content.into(),
            created_at: Utc::now(),
            orchestrator_thread_id: None,
            orchestration_started_at: None,
            agent_checkpoint_json: None,
            progress_context: Vec::new(),
            error_reason: None,
        }
    }

    /// New foreground task at `queue_position`.
    pub fn foreground(
        client_id: impl Into<String>,
        content: impl Into<String>,
        queue_position: i64,
    ) -> Self {
        let mut task = Self::new(
            ProcessingMode::Foreground,
            TaskType::UserInput,
            client_id,
            content,
        );
        task.queue_position = Some(queue_position);
        task
    }

    /// New background task of the given type.
    pub fn background(
        task_type: TaskType,
        client_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(ProcessingMode::Background, task_type, client_id, content)
    }

    /// New task of an arbitrary mode, used when materializing scheduled work.
    pub fn for_mode(
        mode: ProcessingMode,
        task_type: TaskType,
        client_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(mode, task_type, client_id, content)
    }

    /// Set the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    /// Override the creation time.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Attach a project scope.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Use an explicit correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Scheduling class.
    #[must_use]
    pub const fn processing_mode(&self) -> ProcessingMode {
        self.processing_mode
    }

    /// Whether this is interactive work.
    #[must_use]
    pub fn is_foreground(&self) -> bool {
        self.processing_mode == ProcessingMode::Foreground
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreground_constructor() {
        let task = Task::foreground("client-1", "hello", 3);
        assert!(task.is_foreground());
        assert_eq!(task.queue_position, Some(3));
        assert_eq!(task.state, TaskState::Qualifying);
        assert_eq!(task.correlation_id, task.id.to_string());
    }

    #[test]
    fn test_background_has_no_position() {
        let task = Task::background(TaskType::EmailIngestion, "client-1", "mail");
        assert_eq!(task.processing_mode(), ProcessingMode::Background);
        assert_eq!(task.queue_position, None);
    }

    #[test]
    fn test_state_serializes_screaming_snake() {
        let json = serde_json::to_string(&TaskState::PythonOrchestrating).unwrap();
        assert_eq!(json, "\"PYTHON_ORCHESTRATING\"");
        let state: TaskState = serde_json::from_str("\"READY_FOR_GPU\"").unwrap();
        assert_eq!(state, TaskState::ReadyForGpu);
    }

    #[test]
    fn test_only_ready_is_eligible() {
        assert!(TaskState::ReadyForGpu.is_eligible());
        assert!(!TaskState::DispatchedGpu.is_eligible());
        assert!(!TaskState::UserTask.is_eligible());
    }
}
