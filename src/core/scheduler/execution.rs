//! Execution loop: selection under the idle gate, the run itself and the
//! disposition of its result.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::CommunicationErrorPolicy;
use crate::core::events::PREVIEW_CHARS;
use crate::core::{
    backoff_delay, classify, CancelReason, ErrorCode, Escalation, ExecutionContext,
    ExecutionError, ExecutionOutcome, FailureClass, JobHandle, ProgressSink, SchedulerError,
    SchedulerEvent, Task, TaskState,
};
use crate::util::clock;

use super::{panic_message, Scheduler};

/// What happened to one selected task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The payload finished and the task moved to its post-completion state.
    Completed,
    /// The payload was handed to the orchestrator; the slot was released.
    Delegated {
        /// Orchestrator thread now tracking the task.
        thread_id: String,
    },
    /// The run was cancelled. The task keeps its state and stays eligible.
    Cancelled {
        /// Why the job was cancelled.
        reason: Option<CancelReason>,
        /// Whether resumable progress was appended to the task.
        checkpointed: bool,
    },
    /// A downstream dependency failed; the loop backs off.
    CommunicationFailure {
        /// Consecutive failures including this one.
        consecutive_failures: u32,
        /// Sleep before the next selection.
        backoff: Duration,
    },
    /// The payload failed for a task-specific reason and was escalated.
    LogicFailure,
    /// A background task lost the idle gate between selection and start.
    Yielded,
    /// Another job already held the slot; nothing ran.
    SlotBusy,
}

impl Scheduler {
    /// One execution-loop iteration. Returns the delay before the next one.
    pub async fn execution_tick(&self) -> Result<Duration, SchedulerError> {
        let Some(task) = self.select_next().await? else {
            return Ok(self.config.idle_interval());
        };
        let delay = match self.run_task(task).await? {
            RunOutcome::CommunicationFailure { backoff, .. } => backoff,
            RunOutcome::SlotBusy => self.config.idle_interval(),
            _ => Duration::ZERO,
        };
        Ok(delay)
    }

    /// Next task to run: any eligible foreground task, otherwise the oldest
    /// background task if the idle gate admits it.
    pub async fn select_next(&self) -> Result<Option<Task>, SchedulerError> {
        if let Some(task) = self.store.next_foreground_task().await? {
            return Ok(Some(task));
        }
        let gate_open = self.background_gate_open();
        if !gate_open && self.config.background_max_starvation().is_none() {
            return Ok(None);
        }
        let Some(task) = self.store.next_background_task().await? else {
            return Ok(None);
        };
        if gate_open {
            return Ok(Some(task));
        }
        if self.is_starved(&task) {
            info!(task_id = %task.id, "background task exceeded starvation bound; admitting under load");
            return Ok(Some(task));
        }
        debug!(
            active = self.load.active_foreground_count(),
            "background work held back by foreground load"
        );
        Ok(None)
    }

    /// Background work is admitted when no foreground request is in flight or
    /// foreground has been idle for the threshold.
    fn background_gate_open(&self) -> bool {
        self.load.active_foreground_count() == 0
            || self
                .load
                .is_idle_for(self.config.background_idle_threshold())
    }

    fn is_starved(&self, task: &Task) -> bool {
        self.config.background_max_starvation().is_some_and(|bound| {
            (clock::now() - task.created_at)
                .to_std()
                .is_ok_and(|age| age >= bound)
        })
    }

    fn background_admitted(&self, task: &Task) -> bool {
        self.background_gate_open() || self.is_starved(task)
    }

    /// Run `task` in the GPU slot and apply the result.
    ///
    /// The slot is released on every path; a job preempted in the meantime
    /// cannot clear a newer job because release compares job ids. Runs are
    /// serialized on the payload lock, so at most one executor is ever live.
    pub async fn run_task(&self, task: Task) -> Result<RunOutcome, SchedulerError> {
        let job = self
            .current
            .new_handle(task.id, task.processing_mode(), &self.shutdown);
        if !self.current.try_set(Arc::clone(&job)) {
            warn!(task_id = %task.id, "gpu slot occupied; run skipped");
            return Ok(RunOutcome::SlotBusy);
        }
        // A preempted payload leaves the slot at once but may still be
        // draining; wait for it before starting ours.
        let _drained = self.payload_lock.lock().await;
        if job.is_cancelled() {
            self.current.clear_if(job.job_id());
            let reason = job.cancel_reason();
            debug!(task_id = %task.id, ?reason, "cancelled before the payload started");
            return Ok(RunOutcome::Cancelled {
                reason,
                checkpointed: false,
            });
        }
        // A foreground request that began after selection saw an empty slot
        // and could not preempt us.
        if !task.is_foreground() && !self.background_admitted(&task) {
            self.current.clear_if(job.job_id());
            debug!(task_id = %task.id, "yielding slot to foreground request");
            return Ok(RunOutcome::Yielded);
        }
        if let Err(err) = self.store.mark_running(task.id).await {
            self.current.clear_if(job.job_id());
            return Err(err);
        }
        self.publish_queue_status(Some(&task)).await;
        info!(
            task_id = %task.id,
            job_id = job.job_id(),
            mode = ?task.processing_mode(),
            "running task"
        );

        let ctx = ExecutionContext::new(
            job.token().clone(),
            ProgressSink::new(&task, Arc::clone(&self.events)),
        );
        let result = self.execute(&task, &job, ctx).await;
        let settled = self.settle(&task, &job, result).await;

        self.current.clear_if(job.job_id());
        if let Err(err) = self.store.clear_running(task.id).await {
            warn!(task_id = %task.id, error = %err, "failed to clear running marker");
        }
        self.publish_queue_status(None).await;
        settled
    }

    /// Drive the executor as its own tokio task, racing it against the job token.
    ///
    /// A cancelled executor is awaited until it returns, so its payload never
    /// overlaps the next job's. One that ignores the token past
    /// `shutdown_grace` is aborted.
    async fn execute(
        &self,
        task: &Task,
        job: &JobHandle,
        ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let executor = Arc::clone(&self.executor);
        let payload = task.clone();
        let run_ctx = ctx.clone();
        let mut handle = tokio::spawn(async move { executor.run(&payload, run_ctx).await });

        let finished = tokio::select! {
            joined = &mut handle => Some(joined),
            () = job.token().cancelled() => None,
        };
        let joined = match finished {
            Some(joined) => joined,
            None => {
                let grace = self.config.shutdown_grace();
                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            task_id = %task.id,
                            grace_ms = grace.as_millis(),
                            "executor ignored cancellation; aborting"
                        );
                        handle.abort();
                        handle.await
                    }
                }
            }
        };

        match joined {
            Ok(Err(ExecutionError::Cancelled { checkpoint })) => Err(ExecutionError::Cancelled {
                checkpoint: checkpoint.or_else(|| ctx.latest_checkpoint()),
            }),
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                Err(ExecutionError::new(
                    ErrorCode::InternalState,
                    format!("executor panicked: {}", panic_message(payload.as_ref())),
                ))
            }
            Err(_) => Err(ExecutionError::Cancelled {
                checkpoint: ctx.latest_checkpoint(),
            }),
        }
    }

    async fn settle(
        &self,
        task: &Task,
        job: &JobHandle,
        result: Result<ExecutionOutcome, ExecutionError>,
    ) -> Result<RunOutcome, SchedulerError> {
        match result {
            Ok(ExecutionOutcome::Completed { output }) => self.on_completed(task, output).await,
            Ok(ExecutionOutcome::Delegated { thread_id }) => {
                self.on_delegated(task, thread_id).await
            }
            Err(err) => match classify(&err) {
                FailureClass::Cancellation => self.on_cancelled(task, job, err).await,
                FailureClass::Communication => self.on_communication_error(task, &err).await,
                FailureClass::Logic => self.on_logic_error(task, &err).await,
            },
        }
    }

    async fn on_completed(&self, task: &Task, output: String) -> Result<RunOutcome, SchedulerError> {
        self.failures.reset();
        // The executor may have escalated or delegated the task itself while running.
        let stored = self.store.get_task(task.id).await?.map(|t| t.state);
        let handed_off = matches!(
            stored,
            Some(TaskState::UserTask | TaskState::PythonOrchestrating)
        );
        if task.is_foreground() {
            if handed_off {
                info!(task_id = %task.id, state = ?stored, "foreground task handed off during run; state kept");
            } else {
                self.store
                    .update_state(task.id, TaskState::DispatchedGpu)
                    .await?;
            }
            self.events.publish(SchedulerEvent::FinalResult {
                task_id: task.id,
                correlation_id: task.correlation_id.clone(),
                client_id: task.client_id.clone(),
                output,
            });
            info!(task_id = %task.id, "foreground task completed");
            return Ok(RunOutcome::Completed);
        }

        if handed_off {
            info!(task_id = %task.id, state = ?stored, "background task handed off during run; kept");
        } else {
            self.store.delete_task(task.id).await?;
            info!(task_id = %task.id, "background task completed and removed");
        }
        Ok(RunOutcome::Completed)
    }

    async fn on_delegated(
        &self,
        task: &Task,
        thread_id: String,
    ) -> Result<RunOutcome, SchedulerError> {
        self.failures.reset();
        self.store
            .mark_orchestrating(task.id, &thread_id, clock::now())
            .await?;
        info!(task_id = %task.id, thread_id = %thread_id, "task delegated to orchestrator");
        Ok(RunOutcome::Delegated { thread_id })
    }

    async fn on_cancelled(
        &self,
        task: &Task,
        job: &JobHandle,
        err: ExecutionError,
    ) -> Result<RunOutcome, SchedulerError> {
        let checkpoint = match err {
            ExecutionError::Cancelled { checkpoint } => checkpoint,
            ExecutionError::Failed { .. } => None,
        };
        let checkpointed = match checkpoint {
            Some(progress) => {
                self.store
                    .append_progress_context(task.id, &progress)
                    .await?;
                true
            }
            None => false,
        };
        let reason = job.cancel_reason();
        info!(task_id = %task.id, ?reason, checkpointed, "task run cancelled");
        Ok(RunOutcome::Cancelled {
            reason,
            checkpointed,
        })
    }

    async fn on_communication_error(
        &self,
        task: &Task,
        err: &ExecutionError,
    ) -> Result<RunOutcome, SchedulerError> {
        let consecutive_failures = self.failures.record_failure();
        let backoff = backoff_delay(
            consecutive_failures,
            self.config.backoff_base(),
            self.config.backoff_cap(),
        );
        let (code, message) = match err {
            ExecutionError::Failed { code, message } if code.is_communication() => {
                (Some(*code), message.clone())
            }
            ExecutionError::Failed { message, .. } => {
                (ErrorCode::communication_code_in(message), message.clone())
            }
            ExecutionError::Cancelled { .. } => (None, err.to_string()),
        };
        warn!(
            task_id = %task.id,
            consecutive_failures,
            backoff_ms = backoff.as_millis(),
            error = %err,
            "communication error; backing off"
        );
        self.events.publish(SchedulerEvent::CommunicationError {
            task_id: task.id,
            code,
            message,
            consecutive_failures,
            backoff_ms: u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
        });

        let drop_task = !task.is_foreground()
            && self.config.communication_error_policy == CommunicationErrorPolicy::Drop;
        if drop_task {
            self.store.delete_task(task.id).await?;
            debug!(task_id = %task.id, "background task dropped after communication error");
        }
        Ok(RunOutcome::CommunicationFailure {
            consecutive_failures,
            backoff,
        })
    }

    async fn on_logic_error(
        &self,
        task: &Task,
        err: &ExecutionError,
    ) -> Result<RunOutcome, SchedulerError> {
        let reason = err.to_string();
        warn!(task_id = %task.id, error = %reason, "task failed; escalating");
        self.store.set_error_reason(task.id, &reason).await?;
        self.store.update_state(task.id, TaskState::UserTask).await?;

        let mut escalation =
            Escalation::for_task(task, "task execution failed").with_error(reason.clone());
        if task.is_foreground() {
            escalation = escalation.with_question(
                format!("Your request could not be completed: {reason}. How should I proceed?"),
                Some(clock::preview(&task.content, PREVIEW_CHARS)),
            );
        }
        self.escalate(escalation).await;
        Ok(RunOutcome::LogicFailure)
    }
}
