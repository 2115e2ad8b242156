//! Qualification loop driving the external qualifier.

use std::time::Duration;

use super::Scheduler;
use crate::core::SchedulerError;

impl Scheduler {
    /// Ask the qualifier to promote one task.
    ///
    /// Returns a zero delay while the qualifier keeps finding work, so a
    /// backlog drains without waiting a full interval per task.
    pub async fn qualification_tick(&self) -> Result<Duration, SchedulerError> {
        let Some(qualifier) = self.qualifier.as_ref() else {
            return Ok(self.config.qualification_interval());
        };
        if qualifier.qualify_next().await? {
            Ok(Duration::ZERO)
        } else {
            Ok(self.config.qualification_interval())
        }
    }
}
