//! Shared fakes and harness for scheduler integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gpu_slot_scheduler::builders::SchedulerBuilder;
use gpu_slot_scheduler::config::SchedulerConfig;
use gpu_slot_scheduler::core::{
    ErrorCode, ExecutionContext, ExecutionError, ExecutionOutcome, InMemoryEventSink, LoadSignal,
    OrchestratorClient, OrchestratorStatus, Scheduler, SchedulerError, Task, TaskExecutor,
    TaskState, TaskType,
};
use gpu_slot_scheduler::infra::InMemoryTaskStore;
use parking_lot::Mutex;

/// Executor driven by a closure, so each test scripts its own payload.
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(Task, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExecutionOutcome, ExecutionError>> + Send + 'static,
{
    async fn run(
        &self,
        task: &Task,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        (self.0)(task.clone(), ctx).await
    }
}

/// Wrap a closure as an executor. The bound gives the closure its signature.
pub fn scripted<F, Fut>(f: F) -> Arc<dyn TaskExecutor>
where
    F: Fn(Task, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExecutionOutcome, ExecutionError>> + Send + 'static,
{
    Arc::new(FnExecutor(f))
}

/// Executor that fails every run with `code`.
pub fn failing(code: ErrorCode, message: &'static str) -> Arc<dyn TaskExecutor> {
    scripted(move |_task, _ctx| std::future::ready(Err(ExecutionError::new(code, message))))
}

/// Executor that records run order and completes with `done: <content>`.
#[derive(Default)]
pub struct RecordingExecutor {
    pub runs: Mutex<Vec<Task>>,
}

impl RecordingExecutor {
    pub fn run_ids(&self) -> Vec<gpu_slot_scheduler::core::TaskId> {
        self.runs.lock().iter().map(|t| t.id).collect()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn run(
        &self,
        task: &Task,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        ctx.check()?;
        self.runs.lock().push(task.clone());
        ctx.progress("working");
        Ok(ExecutionOutcome::Completed {
            output: format!("done: {}", task.content),
        })
    }
}

/// Load signal whose readings are set by the test.
#[derive(Debug, Default)]
pub struct FakeLoad {
    active: AtomicU32,
    idle: Mutex<Duration>,
}

impl FakeLoad {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn busy(active: u32, idle_for: Duration) -> Self {
        let load = Self::default();
        load.set(active, idle_for);
        load
    }

    pub fn set(&self, active: u32, idle_for: Duration) {
        self.active.store(active, Ordering::SeqCst);
        *self.idle.lock() = idle_for;
    }
}

impl LoadSignal for FakeLoad {
    fn active_foreground_count(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    fn idle_duration(&self) -> Duration {
        *self.idle.lock()
    }
}

/// Orchestrator returning scripted statuses per thread; unknown threads are unreachable.
#[derive(Default)]
pub struct FakeOrchestrator {
    statuses: Mutex<HashMap<String, OrchestratorStatus>>,
    pub polls: AtomicU32,
}

impl FakeOrchestrator {
    pub fn set(&self, thread_id: &str, status: OrchestratorStatus) {
        self.statuses.lock().insert(thread_id.to_string(), status);
    }
}

#[async_trait]
impl OrchestratorClient for FakeOrchestrator {
    async fn status(&self, thread_id: &str) -> Result<OrchestratorStatus, SchedulerError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| SchedulerError::Orchestrator("connection refused".into()))
    }
}

pub fn ready_foreground(content: &str, position: i64) -> Task {
    Task::foreground("client-1", content, position).with_state(TaskState::ReadyForGpu)
}

pub fn ready_background(content: &str) -> Task {
    Task::background(TaskType::WikiIngestion, "client-1", content)
        .with_state(TaskState::ReadyForGpu)
}

/// Config with short loop intervals for tests.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        idle_interval_ms: 10,
        loop_error_backoff_ms: 20,
        qualification_interval_ms: 10,
        shutdown_grace_ms: 1_000,
        ..SchedulerConfig::default()
    }
}

pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<InMemoryTaskStore>,
    pub events: Arc<InMemoryEventSink>,
    pub load: Arc<FakeLoad>,
}

pub fn harness(executor: Arc<dyn TaskExecutor>) -> Harness {
    harness_with(fast_config(), executor, Arc::new(FakeLoad::idle()), |b| b)
}

pub fn harness_with(
    config: SchedulerConfig,
    executor: Arc<dyn TaskExecutor>,
    load: Arc<FakeLoad>,
    extra: impl FnOnce(SchedulerBuilder) -> SchedulerBuilder,
) -> Harness {
    let store = Arc::new(InMemoryTaskStore::new());
    let events = Arc::new(InMemoryEventSink::new(1_000));
    let builder = SchedulerBuilder::new(config)
        .store(store.clone())
        .executor(executor)
        .load(load.clone())
        .escalations(store.clone())
        .events(events.clone());
    let scheduler = extra(builder).build().expect("scheduler builds");
    Harness {
        scheduler,
        store,
        events,
        load,
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
