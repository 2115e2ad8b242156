//! Core scheduling abstractions: task model, collaborator traits, the GPU slot
//! and the scheduler engine.

pub mod backoff;
pub mod collaborators;
pub mod cron;
pub mod current_job;
pub mod error;
pub mod events;
pub mod executor;
pub mod load;
pub mod scheduler;
pub mod store;
pub mod task;

pub use backoff::{backoff_delay, FailureCounter};
pub use collaborators::{
    Escalation, EscalationSink, InterruptKind, OrchestratorClient, OrchestratorStatus, Qualifier,
};
pub use cron::{next_occurrence, parse_cron, CronSource, DefinitionId, ScheduledDefinition};
pub use current_job::{CancelReason, CurrentJob, JobHandle, Preemptor};
pub use error::{classify, AppResult, ErrorCode, ExecutionError, FailureClass, SchedulerError};
pub use events::{
    BroadcastEventSink, EventSink, InMemoryEventSink, NullEventSink, QueueSnapshot, QueueStatus,
    SchedulerEvent, TaskPreview, PREVIEW_CHARS,
};
pub use executor::{ExecutionContext, ExecutionOutcome, ProgressSink, TaskExecutor};
pub use load::{ForegroundLoad, ForegroundRequestGuard, LoadSignal};
pub use scheduler::{DispatchReport, OrchestrationReport, RunOutcome, Scheduler, SchedulerStats};
pub use store::TaskStore;
pub use task::{ProcessingMode, Task, TaskId, TaskState, TaskType};
