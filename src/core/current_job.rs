//! The single "current job" reference that owns the GPU slot.
//!
//! Exactly one [`JobHandle`] may be installed at a time. The three mutators
//! are compare-and-swap operations:
//!
//! - [`CurrentJob::try_set`]: empty → handle
//! - [`CurrentJob::clear_if`]: handle with matching id → empty
//! - [`CurrentJob::cancel_and_clear`]: any handle → empty, cancelling it
//!
//! `clear_if` compares job ids so a finishing job can never clear a newer job
//! that was installed after it was preempted. The critical sections are
//! synchronous; the `parking_lot` guard is `!Send`, so it cannot be held
//! across an `.await` inside the scheduler's spawned loops.
//!
//! Emptying the slot only requests cancellation. The preempted executor may
//! still be finishing a step; the scheduler awaits it before the next run's
//! payload starts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::{ProcessingMode, TaskId};

/// Why a running job was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A foreground request started and needs the slot.
    ForegroundRequest,
    /// The scheduler is shutting down.
    Shutdown,
}

/// Handle for one execution attempt.
#[derive(Debug)]
pub struct JobHandle {
    job_id: u64,
    task_id: TaskId,
    mode: ProcessingMode,
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
}

impl JobHandle {
    /// Job sequence number, unique per scheduler.
    #[must_use]
    pub const fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Task being executed.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Processing class of the task.
    #[must_use]
    pub const fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Token the executor observes.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel with a reason. The first reason wins.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Whether cancellation was requested, directly or via a parent token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by [`cancel`](Self::cancel). Parent-token cancellation
    /// (scheduler shutdown) is reported as [`CancelReason::Shutdown`].
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self.reason.get() {
            Some(reason) => Some(*reason),
            None if self.token.is_cancelled() => Some(CancelReason::Shutdown),
            None => None,
        }
    }
}

/// Owner of the GPU slot reference.
#[derive(Debug, Default)]
pub struct CurrentJob {
    slot: Mutex<Option<Arc<JobHandle>>>,
    next_job_id: AtomicU64,
}

impl CurrentJob {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle for a task. The handle's token is a child of `parent`.
    pub fn new_handle(
        &self,
        task_id: TaskId,
        mode: ProcessingMode,
        parent: &CancellationToken,
    ) -> Arc<JobHandle> {
        Arc::new(JobHandle {
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1,
            task_id,
            mode,
            token: parent.child_token(),
            reason: OnceLock::new(),
        })
    }

    /// Install `handle` if the slot is empty.
    pub fn try_set(&self, handle: Arc<JobHandle>) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(handle);
        true
    }

    /// Clear the slot only if it still holds `job_id`.
    pub fn clear_if(&self, job_id: u64) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(current) if current.job_id == job_id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Take whatever job is installed and cancel it. Returns the cancelled task.
    pub fn cancel_and_clear(&self, reason: CancelReason) -> Option<TaskId> {
        let taken = self.slot.lock().take();
        taken.map(|handle| {
            handle.cancel(reason);
            handle.task_id
        })
    }

    /// Snapshot of the installed job.
    pub fn current(&self) -> Option<Arc<JobHandle>> {
        self.slot.lock().clone()
    }

    /// Whether a job is installed.
    pub fn is_occupied(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Cloneable handle exposing only the preemption trigger.
///
/// Given to the load signal so the start of a foreground request can free the
/// slot without holding a reference to the whole scheduler.
#[derive(Debug, Clone)]
pub struct Preemptor {
    current: Arc<CurrentJob>,
}

impl Preemptor {
    /// Wrap a shared slot.
    #[must_use]
    pub const fn new(current: Arc<CurrentJob>) -> Self {
        Self { current }
    }

    /// Cancel whatever job holds the slot, on behalf of a foreground request.
    pub fn interrupt_now(&self) -> Option<TaskId> {
        let preempted = self
            .current
            .cancel_and_clear(CancelReason::ForegroundRequest);
        if let Some(task_id) = preempted {
            tracing::info!(task_id = %task_id, "preempted running job for foreground request");
        }
        preempted
    }
}
