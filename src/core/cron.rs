//! Scheduled definitions and recurrence evaluation.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ::cron::Schedule;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ProcessingMode, SchedulerError, TaskType};

/// Identifier of a scheduled definition.
pub type DefinitionId = Uuid;

/// Future-scheduled work, owned by the cron source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDefinition {
    /// Definition identifier.
    pub id: DefinitionId,
    /// Owning client.
    pub client_id: String,
    /// Payload for the materialized task.
    pub content: String,
    /// Recurrence rule; `None` for one-shot definitions.
    pub cron_expression: Option<String>,
    /// Next due time.
    pub scheduled_at: DateTime<Utc>,
    /// Correlation id copied onto materialized tasks.
    pub correlation_id: String,
    /// Scheduling class of materialized tasks.
    #[serde(default = "default_mode")]
    pub processing_mode: ProcessingMode,
    /// Payload category of materialized tasks.
    #[serde(default = "default_task_type")]
    pub task_type: TaskType,
}

const fn default_mode() -> ProcessingMode {
    ProcessingMode::Background
}

const fn default_task_type() -> TaskType {
    TaskType::ScheduledJob
}

impl ScheduledDefinition {
    /// One-shot background definition due at `scheduled_at`.
    pub fn once(
        client_id: impl Into<String>,
        content: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            client_id: client_id.into(),
            content: content.into(),
            cron_expression: None,
            scheduled_at,
            correlation_id: id.to_string(),
            processing_mode: default_mode(),
            task_type: default_task_type(),
        }
    }

    /// Recurring background definition with its first occurrence at `scheduled_at`.
    pub fn recurring(
        client_id: impl Into<String>,
        content: impl Into<String>,
        cron_expression: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let mut def = Self::once(client_id, content, scheduled_at);
        def.cron_expression = Some(cron_expression.into());
        def
    }
}

/// Store of scheduled definitions.
#[async_trait]
pub trait CronSource: Send + Sync {
    /// Definitions with `from <= scheduled_at <= to`.
    async fn find_definitions_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDefinition>, SchedulerError>;

    /// Move a recurring definition to its next occurrence.
    async fn update_next_occurrence(
        &self,
        id: DefinitionId,
        next: DateTime<Utc>,
    ) -> Result<(), SchedulerError>;

    /// Remove a definition.
    async fn delete(&self, id: DefinitionId) -> Result<(), SchedulerError>;
}

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate requires 6 fields (sec min hr dom mon dow), but users
/// typically write 5-field cron (min hr dom mon dow).
pub fn parse_cron(expr: &str) -> Result<Schedule, SchedulerError> {
    let fields = expr.split_whitespace().count();
    let schedule = if fields == 5 {
        Schedule::from_str(&format!("0 {expr}"))?
    } else {
        Schedule::from_str(expr)?
    };
    Ok(schedule)
}

/// First occurrence of `expr` strictly after `after`, if any.
pub fn next_occurrence(
    expr: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, SchedulerError> {
    Ok(parse_cron(expr)?.after(&after).next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_cron_six_field() {
        assert!(parse_cron("0 */5 * * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_five_field_auto_prefix() {
        let schedule = parse_cron("0 * * * *").unwrap();
        assert!(schedule.upcoming(Utc).next().is_some());
    }

    #[test]
    fn test_parse_cron_invalid() {
        assert!(matches!(parse_cron("not a cron"), Err(SchedulerError::Cron(_))));
    }

    #[test]
    fn test_next_occurrence_daily() {
        let after = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        let next = next_occurrence("0 0 * * *", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_exhausted_year() {
        // Year field pinned to the past: no further occurrence.
        let after = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(next_occurrence("0 0 0 1 1 * 2020", after).unwrap(), None);
    }

    #[test]
    fn test_definition_defaults_to_background_scheduled_job() {
        let def = ScheduledDefinition::once("c", "run report", Utc::now());
        assert_eq!(def.processing_mode, ProcessingMode::Background);
        assert_eq!(def.task_type, TaskType::ScheduledJob);
        assert!(def.cron_expression.is_none());
    }
}
