//! Tests for the embedding API

use std::sync::Arc;

use async_trait::async_trait;
use gpu_slot_scheduler::builders::SchedulerBuilder;
use gpu_slot_scheduler::config::SchedulerConfig;
use gpu_slot_scheduler::core::{
    ExecutionContext, ExecutionError, ExecutionOutcome, ForegroundLoad, ProcessingMode,
    Scheduler, SchedulerError, Task, TaskExecutor, TaskState, TaskType,
};
use gpu_slot_scheduler::infra::InMemoryTaskStore;
use gpu_slot_scheduler::runtime::{health, queue_status, submit_task, task_status, TaskSubmission};
use uuid::Uuid;

struct Idle;

#[async_trait]
impl TaskExecutor for Idle {
    async fn run(
        &self,
        _task: &Task,
        _ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Ok(ExecutionOutcome::Completed {
            output: String::new(),
        })
    }
}

fn setup() -> (Arc<Scheduler>, Arc<InMemoryTaskStore>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
        .store(store.clone())
        .executor(Arc::new(Idle))
        .load(Arc::new(ForegroundLoad::new()))
        .escalations(store.clone())
        .build()
        .unwrap();
    (scheduler, store)
}

fn submission(mode: ProcessingMode) -> TaskSubmission {
    TaskSubmission {
        client_id: "client-1".into(),
        project_id: Some("proj-9".into()),
        processing_mode: mode,
        task_type: TaskType::UserInput,
        content: "summarize the thread".into(),
        queue_position: Some(4),
        correlation_id: Some("req-42".into()),
    }
}

#[tokio::test]
async fn test_submit_enters_qualification() {
    let (scheduler, store) = setup();
    let id = submit_task(store.as_ref(), submission(ProcessingMode::Foreground))
        .await
        .unwrap();

    let task = store.get(id).unwrap();
    assert_eq!(task.state, TaskState::Qualifying);
    assert_eq!(task.queue_position, Some(4));
    assert_eq!(task.correlation_id, "req-42");
    assert_eq!(task.project_id.as_deref(), Some("proj-9"));

    let status = task_status(&scheduler, store.as_ref(), id).await.unwrap();
    assert_eq!(status.state, TaskState::Qualifying);
    assert!(!status.running);
}

#[tokio::test]
async fn test_background_submission_ignores_position() {
    let (_scheduler, store) = setup();
    let id = submit_task(store.as_ref(), submission(ProcessingMode::Background))
        .await
        .unwrap();
    assert_eq!(store.get(id).unwrap().queue_position, None);
}

#[tokio::test]
async fn test_status_of_unknown_task() {
    let (scheduler, store) = setup();
    let missing = Uuid::new_v4();
    assert!(matches!(
        task_status(&scheduler, store.as_ref(), missing).await,
        Err(SchedulerError::TaskNotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_queue_status_counts_eligible_work() {
    let (scheduler, store) = setup();
    store.insert(Task::foreground("c", "a", 1).with_state(TaskState::ReadyForGpu));
    store.insert(
        Task::background(TaskType::GitIngestion, "c", "b").with_state(TaskState::ReadyForGpu),
    );
    store.insert(Task::foreground("c", "not yet", 2));

    let status = queue_status(&scheduler).await.unwrap();
    assert!(status.running.is_none());
    assert_eq!(status.foreground_depth, 1);
    assert_eq!(status.background_depth, 1);
}

#[test]
fn test_health_before_start() {
    let (scheduler, _store) = setup();
    let report = health(&scheduler);
    assert!(!report.ok);
    assert!(!report.slot_occupied);
}
