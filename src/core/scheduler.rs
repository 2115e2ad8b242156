//! The scheduler engine.
//!
//! Owns the GPU slot ([`CurrentJob`]) and four independently supervised loops:
//!
//! - **execution**: selects the next eligible task (foreground first, background
//!   only through the idle gate) and runs it in the slot
//! - **orchestrator polling**: follows tasks delegated to the external orchestrator
//! - **dispatch**: materializes scheduled definitions ahead of their due time
//! - **qualification**: drives the external qualifier
//!
//! Every loop runs under [`Scheduler::start`]'s supervisor: a failing or
//! panicking iteration is logged and followed by `loop_error_backoff`, never by
//! loop termination. All loops and the in-flight job hang off one
//! [`CancellationToken`], so [`Scheduler::stop`] cascades to everything.
//!
//! The tick methods (`execution_tick`, `orchestration_tick`, `dispatch_tick`,
//! `qualification_tick`) are public so hosts and tests can drive single
//! iterations deterministically without starting the loops.

mod dispatch;
mod execution;
mod orchestration;
mod qualification;

pub use dispatch::DispatchReport;
pub use execution::RunOutcome;
pub use orchestration::OrchestrationReport;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::SchedulerConfig;
use crate::core::{
    CancelReason, CronSource, CurrentJob, Escalation, EscalationSink, EventSink, FailureCounter,
    LoadSignal, OrchestratorClient, Preemptor, ProcessingMode, Qualifier, QueueStatus,
    SchedulerError, SchedulerEvent, Task, TaskExecutor, TaskId, TaskPreview, TaskStore,
};
use crate::util::clock;

/// Supervised loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Execution,
    OrchestratorPolling,
    Dispatch,
    Qualification,
}

impl LoopKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::OrchestratorPolling => "orchestrator_polling",
            Self::Dispatch => "dispatch",
            Self::Qualification => "qualification",
        }
    }
}

/// Collaborators wired into a scheduler. Assembled by
/// [`SchedulerBuilder`](crate::builders::SchedulerBuilder).
pub(crate) struct Collaborators {
    pub store: Arc<dyn TaskStore>,
    pub executor: Arc<dyn TaskExecutor>,
    pub load: Arc<dyn LoadSignal>,
    pub escalations: Arc<dyn EscalationSink>,
    pub events: Arc<dyn EventSink>,
    pub orchestrator: Option<Arc<dyn OrchestratorClient>>,
    pub cron: Option<Arc<dyn CronSource>>,
    pub qualifier: Option<Arc<dyn Qualifier>>,
}

/// Point-in-time view of scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Whether the loops were started.
    pub started: bool,
    /// Whether shutdown was requested.
    pub shutting_down: bool,
    /// Consecutive communication failures.
    pub consecutive_failures: u32,
    /// Task currently holding the GPU slot.
    pub current_task: Option<TaskId>,
    /// Processing class of the current task.
    pub current_mode: Option<ProcessingMode>,
}

/// GPU-slot scheduler. See the module docs.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn TaskExecutor>,
    load: Arc<dyn LoadSignal>,
    escalations: Arc<dyn EscalationSink>,
    events: Arc<dyn EventSink>,
    orchestrator: Option<Arc<dyn OrchestratorClient>>,
    cron: Option<Arc<dyn CronSource>>,
    qualifier: Option<Arc<dyn Qualifier>>,
    current: Arc<CurrentJob>,
    payload_lock: tokio::sync::Mutex<()>,
    failures: FailureCounter,
    started: AtomicBool,
    shutdown: CancellationToken,
    loops: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Scheduler {
    pub(crate) fn new(config: SchedulerConfig, parts: Collaborators) -> Self {
        Self {
            config,
            store: parts.store,
            executor: parts.executor,
            load: parts.load,
            escalations: parts.escalations,
            events: parts.events,
            orchestrator: parts.orchestrator,
            cron: parts.cron,
            qualifier: parts.qualifier,
            current: Arc::new(CurrentJob::new()),
            payload_lock: tokio::sync::Mutex::new(()),
            failures: FailureCounter::new(),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Spawn the loops. Only the first call on a live scheduler does anything;
    /// later calls, and calls after [`stop`](Self::stop), return `false`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.shutdown.is_cancelled() {
            warn!("scheduler already stopped; start ignored");
            return false;
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("scheduler already started; start ignored");
            return false;
        }

        let mut kinds = vec![LoopKind::Execution];
        if self.orchestrator.is_some() {
            kinds.push(LoopKind::OrchestratorPolling);
        }
        if self.cron.is_some() {
            kinds.push(LoopKind::Dispatch);
        }
        if self.qualifier.is_some() {
            kinds.push(LoopKind::Qualification);
        }

        let mut loops = self.loops.lock();
        for kind in kinds {
            let span = info_span!("scheduler_loop", name = kind.name());
            let handle = tokio::spawn(Arc::clone(self).supervise(kind).instrument(span));
            loops.push((kind.name(), handle));
        }
        info!(loops = loops.len(), "scheduler started");
        true
    }

    /// Cancel every loop and the in-flight job, then wait up to
    /// `shutdown_grace` for the loops to exit. Stragglers are aborted.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        if let Some(task_id) = self.current.cancel_and_clear(CancelReason::Shutdown) {
            info!(task_id = %task_id, "cancelled in-flight job for shutdown");
        }

        let loops = std::mem::take(&mut *self.loops.lock());
        if loops.is_empty() {
            return;
        }
        let (names, handles): (Vec<_>, Vec<_>) = loops.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let grace = self.config.shutdown_grace();
        match tokio::time::timeout(grace, join_all(handles)).await {
            Ok(results) => {
                for (name, result) in names.iter().zip(results) {
                    if let Err(err) = result {
                        warn!(name, error = %err, "loop ended abnormally");
                    }
                }
                info!("scheduler stopped");
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis(),
                    "loops did not stop within grace period; aborting"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }

    /// Whether [`start`](Self::start) succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Cancel whatever job holds the GPU slot on behalf of a foreground request.
    pub fn interrupt_now(&self) -> Option<TaskId> {
        self.preemptor().interrupt_now()
    }

    /// Cloneable preemption trigger, for wiring into a load signal.
    #[must_use]
    pub fn preemptor(&self) -> Preemptor {
        Preemptor::new(Arc::clone(&self.current))
    }

    /// Task currently holding the GPU slot.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskId> {
        self.current.current().map(|job| job.task_id())
    }

    /// Consecutive communication failures.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.current()
    }

    /// Snapshot of scheduler state.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let job = self.current.current();
        SchedulerStats {
            started: self.is_started(),
            shutting_down: self.shutdown.is_cancelled(),
            consecutive_failures: self.failures.current(),
            current_task: job.as_ref().map(|j| j.task_id()),
            current_mode: job.as_ref().map(|j| j.mode()),
        }
    }

    /// Current queue status: the running task plus the store's pending view.
    pub async fn queue_status(&self) -> Result<QueueStatus, SchedulerError> {
        let running = match self.current_task() {
            Some(task_id) => self
                .store
                .get_task(task_id)
                .await?
                .map(|task| TaskPreview::of(&task)),
            None => None,
        };
        let snapshot = self
            .store
            .queue_snapshot(self.config.queue_preview_limit)
            .await?;
        Ok(QueueStatus::from_snapshot(running, snapshot))
    }

    /// Publish a queue-status event. Failures only cost observers one update.
    async fn publish_queue_status(&self, running: Option<&Task>) {
        match self
            .store
            .queue_snapshot(self.config.queue_preview_limit)
            .await
        {
            Ok(snapshot) => {
                let status = QueueStatus::from_snapshot(running.map(TaskPreview::of), snapshot);
                self.events.publish(SchedulerEvent::QueueStatus(status));
            }
            Err(err) => debug!(error = %err, "queue snapshot unavailable"),
        }
    }

    /// Hand a task to a human. The caller sets task state.
    async fn escalate(&self, escalation: Escalation) {
        let task_id = escalation.task_id;
        if let Err(err) = self.escalations.escalate(escalation).await {
            warn!(task_id = %task_id, error = %err, "escalation failed");
        }
    }

    /// One iteration of `kind`, returning how long to sleep before the next.
    async fn tick(&self, kind: LoopKind) -> Result<Duration, SchedulerError> {
        match kind {
            LoopKind::Execution => self.execution_tick().await,
            LoopKind::OrchestratorPolling => {
                let report = self.orchestration_tick().await?;
                if report.polled > 0 {
                    debug!(?report, "orchestrator poll cycle");
                }
                Ok(self.config.orchestrator_poll_interval())
            }
            LoopKind::Dispatch => {
                let report = self.dispatch_tick(clock::now()).await?;
                if report.materialized > 0 || report.failed > 0 {
                    info!(?report, "dispatch cycle");
                }
                Ok(self.config.dispatch_interval())
            }
            LoopKind::Qualification => self.qualification_tick().await,
        }
    }

    /// Run `kind` until shutdown, isolating errors and panics per iteration.
    async fn supervise(self: Arc<Self>, kind: LoopKind) {
        info!("loop started");
        while !self.shutdown.is_cancelled() {
            let delay = match AssertUnwindSafe(self.tick(kind)).catch_unwind().await {
                Ok(Ok(delay)) => delay,
                Ok(Err(err)) => {
                    error!(error = %err, "loop iteration failed");
                    self.config.loop_error_backoff()
                }
                Err(panic) => {
                    error!(panic = %panic_message(panic.as_ref()), "loop iteration panicked");
                    self.config.loop_error_backoff()
                }
            };
            if delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        info!("loop stopped");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
