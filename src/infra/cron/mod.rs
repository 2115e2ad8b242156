//! Cron source backends.

pub mod memory;

pub use memory::InMemoryCronSource;
