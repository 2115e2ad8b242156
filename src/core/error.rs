//! Error types for scheduler operations and task execution failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::TaskId;

/// Errors produced by scheduler components and collaborators.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task store query or update failed.
    #[error("store error: {0}")]
    Store(String),
    /// Requested task does not exist in the store.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// External orchestrator could not be queried.
    #[error("orchestrator error: {0}")]
    Orchestrator(String),
    /// Cron expression could not be parsed or evaluated.
    #[error("cron error: {0}")]
    Cron(String),
    /// Configuration is missing or invalid.
    #[error("config error: {0}")]
    Config(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for SchedulerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Orchestrator(err.to_string())
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(format!("serialization: {err}"))
    }
}

impl From<::cron::error::Error> for SchedulerError {
    fn from(err: ::cron::error::Error) -> Self {
        Self::Cron(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Fixed failure taxonomy reported by task executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Connection to the model-serving layer failed.
    LlmConnectionFailed,
    /// Model-serving layer reported itself unavailable.
    LlmUnavailable,
    /// Model call timed out.
    LlmTimeout,
    /// Model-serving layer could not be reached.
    LlmUnreachable,
    /// Generic network failure.
    NetworkError,
    /// Network operation timed out.
    NetworkTimeout,
    /// Task payload failed for a task-specific reason.
    TaskExecutionError,
    /// Task payload was malformed.
    InvalidPayload,
    /// Executor hit an unexpected internal state.
    InternalState,
}

impl ErrorCode {
    /// Codes that indicate a downstream dependency outage.
    pub const COMMUNICATION: [Self; 6] = [
        Self::LlmConnectionFailed,
        Self::LlmUnavailable,
        Self::LlmTimeout,
        Self::LlmUnreachable,
        Self::NetworkError,
        Self::NetworkTimeout,
    ];

    /// Wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LlmConnectionFailed => "LLM_CONNECTION_FAILED",
            Self::LlmUnavailable => "LLM_UNAVAILABLE",
            Self::LlmTimeout => "LLM_TIMEOUT",
            Self::LlmUnreachable => "LLM_UNREACHABLE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::TaskExecutionError => "TASK_EXECUTION_ERROR",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::InternalState => "INTERNAL_STATE",
        }
    }

    /// Whether this code belongs to the communication class.
    #[must_use]
    pub fn is_communication(self) -> bool {
        Self::COMMUNICATION.contains(&self)
    }

    /// Find the first communication code mentioned in a free-form message.
    #[must_use]
    pub fn communication_code_in(message: &str) -> Option<Self> {
        Self::COMMUNICATION
            .into_iter()
            .find(|code| message.contains(code.as_str()))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure surfaced by a [`TaskExecutor`](crate::core::TaskExecutor) run.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The payload failed.
    #[error("{code}: {message}")]
    Failed {
        /// Taxonomy code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
    /// The run observed cancellation and stopped.
    #[error("execution cancelled")]
    Cancelled {
        /// Resumable progress captured at the cancellation point.
        checkpoint: Option<String>,
    },
}

impl ExecutionError {
    /// Build a failure with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Failed {
            code,
            message: message.into(),
        }
    }

    /// Build a failure from a free-form message, inferring a communication code
    /// when the message names one and falling back to `TASK_EXECUTION_ERROR`.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let code =
            ErrorCode::communication_code_in(&message).unwrap_or(ErrorCode::TaskExecutionError);
        Self::Failed { code, message }
    }

    /// Cancellation without a checkpoint.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::Cancelled { checkpoint: None }
    }
}

/// Disposition class of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Downstream dependency outage; retry the loop with backoff.
    Communication,
    /// Task-specific failure; escalate without backoff.
    Logic,
    /// Expected outcome of preemption, not a failure.
    Cancellation,
}

/// Classify an execution error against the fixed taxonomy.
#[must_use]
pub fn classify(err: &ExecutionError) -> FailureClass {
    match err {
        ExecutionError::Cancelled { .. } => FailureClass::Cancellation,
        ExecutionError::Failed { code, message } => {
            if code.is_communication() || ErrorCode::communication_code_in(message).is_some() {
                FailureClass::Communication
            } else {
                FailureClass::Logic
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_codes_classify_as_communication() {
        for code in ErrorCode::COMMUNICATION {
            let err = ExecutionError::new(code, "boom");
            assert_eq!(classify(&err), FailureClass::Communication, "{code}");
        }
    }

    #[test]
    fn test_other_codes_classify_as_logic() {
        for code in [
            ErrorCode::TaskExecutionError,
            ErrorCode::InvalidPayload,
            ErrorCode::InternalState,
        ] {
            assert_eq!(classify(&ExecutionError::new(code, "bad")), FailureClass::Logic);
        }
    }

    #[test]
    fn test_message_match_overrides_logic_code() {
        let err = ExecutionError::new(
            ErrorCode::TaskExecutionError,
            "wrapped: LLM_TIMEOUT after 120s",
        );
        assert_eq!(classify(&err), FailureClass::Communication);
    }

    #[test]
    fn test_from_message_infers_code() {
        match ExecutionError::from_message("NETWORK_ERROR: connection reset") {
            ExecutionError::Failed { code, .. } => assert_eq!(code, ErrorCode::NetworkError),
            ExecutionError::Cancelled { .. } => panic!("unexpected cancellation"),
        }
        match ExecutionError::from_message("index out of range") {
            ExecutionError::Failed { code, .. } => {
                assert_eq!(code, ErrorCode::TaskExecutionError);
            }
            ExecutionError::Cancelled { .. } => panic!("unexpected cancellation"),
        }
    }

    #[test]
    fn test_cancellation_is_not_a_failure() {
        assert_eq!(
            classify(&ExecutionError::cancelled()),
            FailureClass::Cancellation
        );
    }

    #[test]
    fn test_display() {
        let err = ExecutionError::new(ErrorCode::LlmUnavailable, "503");
        assert_eq!(err.to_string(), "LLM_UNAVAILABLE: 503");
        assert_eq!(
            SchedulerError::Store("disk full".into()).to_string(),
            "store error: disk full"
        );
    }
}
