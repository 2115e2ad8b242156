//! In-memory cron source.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::{CronSource, DefinitionId, ScheduledDefinition, SchedulerError};

/// Simple in-memory definition store for development/testing.
#[derive(Default)]
pub struct InMemoryCronSource {
    definitions: Mutex<HashMap<DefinitionId, ScheduledDefinition>>,
}

impl InMemoryCronSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(&self, definition: ScheduledDefinition) {
        self.definitions.lock().insert(definition.id, definition);
    }

    /// Snapshot of a definition.
    pub fn get(&self, id: DefinitionId) -> Option<ScheduledDefinition> {
        self.definitions.lock().get(&id).cloned()
    }

    /// Number of stored definitions.
    pub fn len(&self) -> usize {
        self.definitions.lock().len()
    }

    /// Whether no definitions are stored.
    pub fn is_empty(&self) -> bool {
        self.definitions.lock().is_empty()
    }
}

#[async_trait]
impl CronSource for InMemoryCronSource {
    async fn find_definitions_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledDefinition>, SchedulerError> {
        let mut due: Vec<ScheduledDefinition> = self
            .definitions
            .lock()
            .values()
            .filter(|d| d.scheduled_at >= from && d.scheduled_at <= to)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(due)
    }

    async fn update_next_occurrence(
        &self,
        id: DefinitionId,
        next: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let mut definitions = self.definitions.lock();
        let definition = definitions
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::Cron(format!("definition {id} not found")))?;
        definition.scheduled_at = next;
        Ok(())
    }

    async fn delete(&self, id: DefinitionId) -> Result<(), SchedulerError> {
        self.definitions.lock().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_window_filter() {
        let source = InMemoryCronSource::new();
        let now = Utc::now();
        let inside = ScheduledDefinition::once("c", "soon", now + Duration::minutes(5));
        let outside = ScheduledDefinition::once("c", "later", now + Duration::hours(5));
        source.insert(inside.clone());
        source.insert(outside);
        let due = source
            .find_definitions_due_between(now, now + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, inside.id);
    }

    #[tokio::test]
    async fn test_update_missing_definition_fails() {
        let source = InMemoryCronSource::new();
        let result = source
            .update_next_occurrence(uuid::Uuid::new_v4(), Utc::now())
            .await;
        assert!(result.is_err());
    }
}
