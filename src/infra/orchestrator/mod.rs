//! External orchestrator clients.

pub mod http;

pub use http::HttpOrchestratorClient;
