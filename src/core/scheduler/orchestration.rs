//! Orchestrator result polling for delegated tasks.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::core::{
    Escalation, InterruptKind, OrchestratorStatus, SchedulerError, SchedulerEvent, Task,
    TaskState,
};

use super::Scheduler;

/// Counts from one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    /// Delegated tasks examined.
    pub polled: usize,
    /// Still running.
    pub running: usize,
    /// Handed to a human after an interrupt.
    pub escalated: usize,
    /// Re-queued because the user wrote during delegation.
    pub requeued: usize,
    /// Finished and moved to their post-completion state.
    pub completed: usize,
    /// Marked `ERROR`.
    pub failed: usize,
    /// Status could not be fetched; retried next cycle.
    pub unreachable: usize,
    /// Status fetched but the store update failed.
    pub store_errors: usize,
}

/// Disposition of one delegated task.
enum Resolution {
    Running,
    Escalated,
    Requeued,
    Completed,
    Failed,
}

impl Scheduler {
    /// Poll the orchestrator once for every `PYTHON_ORCHESTRATING` task.
    ///
    /// Without an orchestrator client this is a no-op.
    pub async fn orchestration_tick(&self) -> Result<OrchestrationReport, SchedulerError> {
        let mut report = OrchestrationReport::default();
        let Some(client) = self.orchestrator.as_ref() else {
            return Ok(report);
        };

        for task in self
            .store
            .tasks_in_state(TaskState::PythonOrchestrating)
            .await?
        {
            report.polled += 1;
            let resolution = match task.orchestrator_thread_id.as_deref() {
                None => {
                    self.fail_delegation(&task, "delegated task has no orchestrator thread id")
                        .await
                }
                Some(thread_id) => match client.status(thread_id).await {
                    Ok(status) => self.apply_status(&task, status).await,
                    Err(err) => {
                        debug!(task_id = %task.id, thread_id, error = %err, "orchestrator unreachable");
                        report.unreachable += 1;
                        continue;
                    }
                },
            };
            match resolution {
                Ok(Resolution::Running) => report.running += 1,
                Ok(Resolution::Escalated) => report.escalated += 1,
                Ok(Resolution::Requeued) => report.requeued += 1,
                Ok(Resolution::Completed) => report.completed += 1,
                Ok(Resolution::Failed) => report.failed += 1,
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "failed to apply orchestrator status");
                    report.store_errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn apply_status(
        &self,
        task: &Task,
        status: OrchestratorStatus,
    ) -> Result<Resolution, SchedulerError> {
        match status {
            OrchestratorStatus::Running => Ok(Resolution::Running),
            OrchestratorStatus::Interrupted {
                action,
                description,
            } => self.on_interrupted(task, action, description).await,
            OrchestratorStatus::Done { summary } => self.on_done(task, summary).await,
            OrchestratorStatus::Error { error } => {
                let reason = error.unwrap_or_else(|| "orchestrator reported an error".into());
                self.fail_delegation(task, &reason).await
            }
        }
    }

    async fn on_interrupted(
        &self,
        task: &Task,
        action: Option<String>,
        description: Option<String>,
    ) -> Result<Resolution, SchedulerError> {
        let kind = InterruptKind::from_action(action.as_deref());
        let question =
            description.unwrap_or_else(|| "The orchestrator is waiting for your input.".into());
        let reason = match kind {
            InterruptKind::Clarification => "orchestrator needs clarification",
            InterruptKind::Approval => "orchestrator action requires approval",
        };

        self.store.set_error_reason(task.id, reason).await?;
        self.store.update_state(task.id, TaskState::UserTask).await?;
        self.escalate(
            Escalation::for_task(task, reason)
                .with_question(question.clone(), action.clone())
                .approval(kind == InterruptKind::Approval),
        )
        .await;

        if task.is_foreground() {
            let mut metadata = HashMap::new();
            metadata.insert("status".to_string(), "interrupted".to_string());
            if let Some(action) = action {
                metadata.insert("action".to_string(), action);
            }
            self.events.publish(SchedulerEvent::Progress {
                task_id: task.id,
                correlation_id: task.correlation_id.clone(),
                message: question,
                metadata,
            });
        }
        info!(task_id = %task.id, ?kind, "delegated task interrupted; escalated");
        Ok(Resolution::Escalated)
    }

    async fn on_done(
        &self,
        task: &Task,
        summary: Option<String>,
    ) -> Result<Resolution, SchedulerError> {
        let last_message = self.store.latest_user_message_at(task.id).await?;
        let user_wrote_meanwhile = matches!(
            (last_message, task.orchestration_started_at),
            (Some(last), Some(started)) if last > started
        );

        if user_wrote_meanwhile {
            self.store.update_state(task.id, TaskState::ReadyForGpu).await?;
            self.clear_orchestration(task).await;
            info!(task_id = %task.id, "new user input during delegation; task re-queued");
            return Ok(Resolution::Requeued);
        }

        if task.is_foreground() {
            self.store
                .update_state(task.id, TaskState::DispatchedGpu)
                .await?;
            self.clear_orchestration(task).await;
        } else {
            self.store.delete_task(task.id).await?;
        }
        self.events.publish(SchedulerEvent::FinalResult {
            task_id: task.id,
            correlation_id: task.correlation_id.clone(),
            client_id: task.client_id.clone(),
            output: summary.unwrap_or_default(),
        });
        info!(task_id = %task.id, "delegated task finished");
        Ok(Resolution::Completed)
    }

    async fn fail_delegation(&self, task: &Task, reason: &str) -> Result<Resolution, SchedulerError> {
        warn!(task_id = %task.id, reason, "delegated task failed");
        self.store.set_error_reason(task.id, reason).await?;
        self.store.update_state(task.id, TaskState::Error).await?;
        self.escalate(Escalation::for_task(task, "delegated execution failed").with_error(reason))
            .await;
        Ok(Resolution::Failed)
    }

    async fn clear_orchestration(&self, task: &Task) {
        if let Err(err) = self.store.clear_orchestration(task.id).await {
            warn!(task_id = %task.id, error = %err, "failed to clear orchestration fields");
        }
    }
}
