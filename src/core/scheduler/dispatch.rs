//! Time-based dispatch of scheduled definitions.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::core::{
    next_occurrence, CronSource, ScheduledDefinition, SchedulerError, Task, TaskState,
};

use super::Scheduler;

/// Counts from one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Definitions due in the window.
    pub due: usize,
    /// Tasks created.
    pub materialized: usize,
    /// Recurring definitions moved to their next occurrence.
    pub rescheduled: usize,
    /// Definitions deleted: one-shot, exhausted or unparsable recurrence.
    pub retired: usize,
    /// Definitions whose dispatch failed; left untouched for the next cycle.
    pub failed: usize,
}

enum Followup {
    Rescheduled,
    Retired,
}

impl Scheduler {
    /// Materialize every definition due in `[now, now + dispatch_advance_window]`
    /// as a `READY_FOR_GPU` task.
    ///
    /// A failure on one definition is logged and does not stop the others.
    /// Without a cron source this is a no-op.
    pub async fn dispatch_tick(&self, now: DateTime<Utc>) -> Result<DispatchReport, SchedulerError> {
        let mut report = DispatchReport::default();
        let Some(source) = self.cron.as_deref() else {
            return Ok(report);
        };
        let advance = TimeDelta::from_std(self.config.dispatch_advance_window())
            .map_err(|err| SchedulerError::Config(format!("dispatch window: {err}")))?;

        let due = source
            .find_definitions_due_between(now, now + advance)
            .await?;
        report.due = due.len();
        for definition in due {
            match self.dispatch_definition(source, &definition, now).await {
                Ok(followup) => {
                    report.materialized += 1;
                    match followup {
                        Followup::Rescheduled => report.rescheduled += 1,
                        Followup::Retired => report.retired += 1,
                    }
                }
                Err(err) => {
                    warn!(definition_id = %definition.id, error = %err, "dispatch failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn dispatch_definition(
        &self,
        source: &dyn CronSource,
        definition: &ScheduledDefinition,
        now: DateTime<Utc>,
    ) -> Result<Followup, SchedulerError> {
        let task = Task::for_mode(
            definition.processing_mode,
            definition.task_type.clone(),
            definition.client_id.clone(),
            definition.content.clone(),
        )
        .with_correlation_id(definition.correlation_id.clone())
        .with_state(TaskState::ReadyForGpu);
        let task_id = task.id;
        self.store.create_task(task).await?;

        // The definition is only advanced after the task exists; if advancing
        // fails the task is withdrawn so the next cycle does not duplicate it.
        match advance_definition(source, definition, now).await {
            Ok(followup) => {
                info!(
                    definition_id = %definition.id,
                    task_id = %task_id,
                    scheduled_at = %definition.scheduled_at,
                    "scheduled definition dispatched"
                );
                Ok(followup)
            }
            Err(err) => {
                if let Err(undo) = self.store.delete_task(task_id).await {
                    warn!(
                        definition_id = %definition.id,
                        task_id = %task_id,
                        error = %undo,
                        "could not withdraw task after failed dispatch"
                    );
                }
                Err(err)
            }
        }
    }
}

async fn advance_definition(
    source: &dyn CronSource,
    definition: &ScheduledDefinition,
    now: DateTime<Utc>,
) -> Result<Followup, SchedulerError> {
    let Some(expr) = definition.cron_expression.as_deref() else {
        source.delete(definition.id).await?;
        return Ok(Followup::Retired);
    };
    let after = definition.scheduled_at.max(now);
    match next_occurrence(expr, after) {
        Ok(Some(next)) => {
            source.update_next_occurrence(definition.id, next).await?;
            debug!(definition_id = %definition.id, next = %next, "recurring definition rescheduled");
            Ok(Followup::Rescheduled)
        }
        Ok(None) => {
            source.delete(definition.id).await?;
            info!(definition_id = %definition.id, "recurrence exhausted; definition removed");
            Ok(Followup::Retired)
        }
        Err(err) => {
            source.delete(definition.id).await?;
            warn!(definition_id = %definition.id, error = %err, "invalid recurrence; definition removed");
            Ok(Followup::Retired)
        }
    }
}
