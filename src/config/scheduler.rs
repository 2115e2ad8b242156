//! Scheduler and orchestrator client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to a task whose run failed with a communication error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationErrorPolicy {
    /// Delete background tasks; producers are expected to resubmit.
    #[default]
    Drop,
    /// Keep the task eligible and retry it after the backoff.
    Retain,
}

/// Timing and policy knobs for the scheduler loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep between execution polls when nothing is eligible.
    pub idle_interval_ms: u64,
    /// Foreground idle time required before background work is admitted under load.
    pub background_idle_threshold_secs: u64,
    /// Age after which a background task bypasses the idle gate. `None` = unbounded.
    pub background_max_starvation_secs: Option<u64>,
    /// Backoff per consecutive communication failure.
    pub backoff_base_ms: u64,
    /// Upper bound for the communication backoff.
    pub backoff_cap_ms: u64,
    /// Disposition of tasks hit by communication errors.
    pub communication_error_policy: CommunicationErrorPolicy,
    /// Orchestrator result polling interval.
    pub orchestrator_poll_interval_secs: u64,
    /// Time-based dispatch interval.
    pub dispatch_interval_secs: u64,
    /// How far ahead scheduled definitions are materialized.
    pub dispatch_advance_window_secs: u64,
    /// Qualification polling interval when the qualifier has nothing to do.
    pub qualification_interval_ms: u64,
    /// Sleep after a loop body fails or panics.
    pub loop_error_backoff_ms: u64,
    /// Grace period `stop` waits for loops to observe cancellation.
    pub shutdown_grace_ms: u64,
    /// Pending previews included in queue-status events.
    pub queue_preview_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: 1_000,
            background_idle_threshold_secs: 30,
            background_max_starvation_secs: None,
            backoff_base_ms: 30_000,
            backoff_cap_ms: 300_000,
            communication_error_policy: CommunicationErrorPolicy::Drop,
            orchestrator_poll_interval_secs: 5,
            dispatch_interval_secs: 600,
            dispatch_advance_window_secs: 900,
            qualification_interval_ms: 1_000,
            loop_error_backoff_ms: 5_000,
            shutdown_grace_ms: 3_000,
            queue_preview_limit: 5,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_interval_ms == 0 {
            return Err("idle_interval_ms must be greater than 0".into());
        }
        if self.backoff_base_ms == 0 {
            return Err("backoff_base_ms must be greater than 0".into());
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err("backoff_cap_ms must be at least backoff_base_ms".into());
        }
        if self.orchestrator_poll_interval_secs == 0 {
            return Err("orchestrator_poll_interval_secs must be greater than 0".into());
        }
        if self.dispatch_interval_secs == 0 {
            return Err("dispatch_interval_secs must be greater than 0".into());
        }
        if self.dispatch_advance_window_secs < self.dispatch_interval_secs {
            return Err(
                "dispatch_advance_window_secs must cover at least one dispatch_interval_secs"
                    .into(),
            );
        }
        if self.qualification_interval_ms == 0 {
            return Err("qualification_interval_ms must be greater than 0".into());
        }
        if self.loop_error_backoff_ms == 0 {
            return Err("loop_error_backoff_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables over the
    /// defaults, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            target: &mut T,
        ) -> Result<(), String> {
            if let Some(raw) = lookup(key) {
                *target = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("{key}: invalid value `{raw}`"))?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        parse(&lookup, "SCHEDULER_IDLE_INTERVAL_MS", &mut cfg.idle_interval_ms)?;
        parse(
            &lookup,
            "SCHEDULER_BACKGROUND_IDLE_THRESHOLD_SECS",
            &mut cfg.background_idle_threshold_secs,
        )?;
        if let Some(raw) = lookup("SCHEDULER_BACKGROUND_MAX_STARVATION_SECS") {
            let secs = raw
                .trim()
                .parse()
                .map_err(|_| format!("SCHEDULER_BACKGROUND_MAX_STARVATION_SECS: invalid value `{raw}`"))?;
            cfg.background_max_starvation_secs = Some(secs);
        }
        parse(&lookup, "SCHEDULER_BACKOFF_BASE_MS", &mut cfg.backoff_base_ms)?;
        parse(&lookup, "SCHEDULER_BACKOFF_CAP_MS", &mut cfg.backoff_cap_ms)?;
        if let Some(raw) = lookup("SCHEDULER_COMMUNICATION_ERROR_POLICY") {
            cfg.communication_error_policy = match raw.trim() {
                "drop" => CommunicationErrorPolicy::Drop,
                "retain" => CommunicationErrorPolicy::Retain,
                other => {
                    return Err(format!(
                        "SCHEDULER_COMMUNICATION_ERROR_POLICY: invalid value `{other}`"
                    ))
                }
            };
        }
        parse(
            &lookup,
            "SCHEDULER_ORCHESTRATOR_POLL_INTERVAL_SECS",
            &mut cfg.orchestrator_poll_interval_secs,
        )?;
        parse(&lookup, "SCHEDULER_DISPATCH_INTERVAL_SECS", &mut cfg.dispatch_interval_secs)?;
        parse(
            &lookup,
            "SCHEDULER_DISPATCH_ADVANCE_WINDOW_SECS",
            &mut cfg.dispatch_advance_window_secs,
        )?;
        parse(
            &lookup,
            "SCHEDULER_QUALIFICATION_INTERVAL_MS",
            &mut cfg.qualification_interval_ms,
        )?;
        parse(&lookup, "SCHEDULER_LOOP_ERROR_BACKOFF_MS", &mut cfg.loop_error_backoff_ms)?;
        parse(&lookup, "SCHEDULER_SHUTDOWN_GRACE_MS", &mut cfg.shutdown_grace_ms)?;
        parse(&lookup, "SCHEDULER_QUEUE_PREVIEW_LIMIT", &mut cfg.queue_preview_limit)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Execution-loop idle sleep.
    #[must_use]
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Foreground idle threshold for background admission.
    #[must_use]
    pub const fn background_idle_threshold(&self) -> Duration {
        Duration::from_secs(self.background_idle_threshold_secs)
    }

    /// Optional background starvation bound.
    #[must_use]
    pub fn background_max_starvation(&self) -> Option<Duration> {
        self.background_max_starvation_secs.map(Duration::from_secs)
    }

    /// Communication backoff base.
    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Communication backoff cap.
    #[must_use]
    pub const fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    /// Orchestrator polling interval.
    #[must_use]
    pub const fn orchestrator_poll_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator_poll_interval_secs)
    }

    /// Dispatch loop interval.
    #[must_use]
    pub const fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    /// Dispatch look-ahead window.
    #[must_use]
    pub const fn dispatch_advance_window(&self) -> Duration {
        Duration::from_secs(self.dispatch_advance_window_secs)
    }

    /// Qualification idle interval.
    #[must_use]
    pub const fn qualification_interval(&self) -> Duration {
        Duration::from_millis(self.qualification_interval_ms)
    }

    /// Loop fault backoff.
    #[must_use]
    pub const fn loop_error_backoff(&self) -> Duration {
        Duration::from_millis(self.loop_error_backoff_ms)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// HTTP orchestrator client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base URL, e.g. `http://localhost:8090`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl OrchestratorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("base_url `{}` must be an http(s) URL", self.base_url));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
