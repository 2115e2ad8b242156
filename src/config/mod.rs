//! Configuration models for the scheduler loops and collaborator clients.

pub mod scheduler;

pub use scheduler::{CommunicationErrorPolicy, OrchestratorConfig, SchedulerConfig};
