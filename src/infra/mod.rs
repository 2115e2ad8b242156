//! Infrastructure adapters for task stores, cron sources and the orchestrator.

pub mod cron;
pub mod orchestrator;
pub mod store;

pub use cron::InMemoryCronSource;
pub use orchestrator::HttpOrchestratorClient;
pub use store::InMemoryTaskStore;
