//! In-memory task store with foreground position ordering and background FIFO.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::{
    Escalation, EscalationSink, ProcessingMode, QueueSnapshot, SchedulerError, Task, TaskId,
    TaskPreview, TaskState, TaskStore,
};

/// Execution order between two eligible tasks.
///
/// Foreground before background; foreground by `queue_position` then creation
/// time; background by creation time only.
fn execution_order(a: &Task, b: &Task) -> Ordering {
    match (a.processing_mode(), b.processing_mode()) {
        (ProcessingMode::Foreground, ProcessingMode::Background) => Ordering::Less,
        (ProcessingMode::Background, ProcessingMode::Foreground) => Ordering::Greater,
        (ProcessingMode::Foreground, ProcessingMode::Foreground) => a
            .queue_position
            .unwrap_or(i64::MAX)
            .cmp(&b.queue_position.unwrap_or(i64::MAX))
            .then_with(|| a.created_at.cmp(&b.created_at)),
        (ProcessingMode::Background, ProcessingMode::Background) => {
            a.created_at.cmp(&b.created_at)
        }
    }
}

#[derive(Default)]
struct StoreState {
    tasks: HashMap<TaskId, Task>,
    running: Option<TaskId>,
    user_messages: HashMap<TaskId, Vec<DateTime<Utc>>>,
    escalations: Vec<Escalation>,
}

impl StoreState {
    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, SchedulerError> {
        self.tasks.get_mut(&id).ok_or(SchedulerError::TaskNotFound(id))
    }

    fn next_eligible(&self, mode: ProcessingMode) -> Option<Task> {
        self.tasks
            .values()
            .filter(|t| t.processing_mode() == mode && t.state.is_eligible())
            .min_by(|a, b| execution_order(a, b))
            .cloned()
    }
}

/// In-memory store for development and testing.
///
/// Also records escalations so tests can assert on them.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task synchronously.
    pub fn insert(&self, task: Task) {
        self.inner.lock().tasks.insert(task.id, task);
    }

    /// Snapshot of a task.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.inner.lock().tasks.get(&id).cloned()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }

    /// Move a foreground task to a new queue position.
    pub fn reorder(&self, id: TaskId, position: i64) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        let task = state.task_mut(id)?;
        if !task.is_foreground() {
            return Err(SchedulerError::Store(format!(
                "task {id} is background and has no queue position"
            )));
        }
        task.queue_position = Some(position);
        Ok(())
    }

    /// Record a user message on a task's conversation.
    pub fn record_user_message(&self, id: TaskId, at: DateTime<Utc>) {
        self.inner.lock().user_messages.entry(id).or_default().push(at);
    }

    /// Task currently marked running.
    pub fn running(&self) -> Option<TaskId> {
        self.inner.lock().running
    }

    /// Escalations recorded so far.
    pub fn escalations(&self) -> Vec<Escalation> {
        self.inner.lock().escalations.clone()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, task: Task) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        if state.tasks.contains_key(&task.id) {
            return Err(SchedulerError::Store(format!("task {} already exists", task.id)));
        }
        state.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        Ok(self.get(id))
    }

    async fn next_foreground_task(&self) -> Result<Option<Task>, SchedulerError> {
        Ok(self.inner.lock().next_eligible(ProcessingMode::Foreground))
    }

    async fn next_background_task(&self) -> Result<Option<Task>, SchedulerError> {
        Ok(self.inner.lock().next_eligible(ProcessingMode::Background))
    }

    async fn update_state(&self, id: TaskId, new_state: TaskState) -> Result<(), SchedulerError> {
        self.inner.lock().task_mut(id)?.state = new_state;
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        state.tasks.remove(&id).ok_or(SchedulerError::TaskNotFound(id))?;
        state.user_messages.remove(&id);
        if state.running == Some(id) {
            state.running = None;
        }
        Ok(())
    }

    async fn append_progress_context(
        &self,
        id: TaskId,
        text: &str,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        let task = state.task_mut(id)?;
        task.progress_context.push(text.to_string());
        task.agent_checkpoint_json = Some(text.to_string());
        Ok(())
    }

    async fn mark_running(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        state.task_mut(id)?;
        state.running = Some(id);
        Ok(())
    }

    async fn clear_running(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        if state.running == Some(id) {
            state.running = None;
        }
        Ok(())
    }

    async fn mark_orchestrating(
        &self,
        id: TaskId,
        thread_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        let task = state.task_mut(id)?;
        task.state = TaskState::PythonOrchestrating;
        task.orchestrator_thread_id = Some(thread_id.to_string());
        task.orchestration_started_at = Some(started_at);
        Ok(())
    }

    async fn clear_orchestration(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut state = self.inner.lock();
        let task = state.task_mut(id)?;
        task.orchestrator_thread_id = None;
        task.orchestration_started_at = None;
        Ok(())
    }

    async fn set_error_reason(&self, id: TaskId, reason: &str) -> Result<(), SchedulerError> {
        self.inner.lock().task_mut(id)?.error_reason = Some(reason.to_string());
        Ok(())
    }

    async fn tasks_in_state(&self, wanted: TaskState) -> Result<Vec<Task>, SchedulerError> {
        let state = self.inner.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.state == wanted)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn latest_user_message_at(
        &self,
        id: TaskId,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        Ok(self
            .inner
            .lock()
            .user_messages
            .get(&id)
            .and_then(|messages| messages.iter().max().copied()))
    }

    async fn queue_snapshot(&self, preview_limit: usize) -> Result<QueueSnapshot, SchedulerError> {
        let state = self.inner.lock();
        let mut eligible: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| t.state.is_eligible() && state.running != Some(t.id))
            .collect();
        eligible.sort_by(|a, b| execution_order(a, b));
        let foreground_depth = eligible.iter().filter(|t| t.is_foreground()).count();
        Ok(QueueSnapshot {
            foreground_depth,
            background_depth: eligible.len() - foreground_depth,
            pending: eligible
                .into_iter()
                .take(preview_limit)
                .map(TaskPreview::of)
                .collect(),
        })
    }
}

#[async_trait]
impl EscalationSink for InMemoryTaskStore {
    async fn escalate(&self, escalation: Escalation) -> Result<(), SchedulerError> {
        self.inner.lock().escalations.push(escalation);
        Ok(())
    }
}
