//! # GPU Slot Scheduler
//!
//! A single-slot task scheduling and preemption engine for AI backends that
//! serve interactive requests and autonomous background work from one scarce
//! model-execution resource.
//!
//! ## Core Problem Solved
//!
//! One heavy model can serve only one task at a time, yet the backend receives:
//!
//! - **Foreground work**: chat requests a user is waiting on
//! - **Background work**: ingestion, scheduled jobs and self-generated tasks
//! - **Delegated work**: long-running jobs handed to an external orchestrator
//!
//! The scheduler guarantees at most one task holds the GPU slot, lets any
//! foreground request preempt background work instantly, admits background work
//! only when foreground is idle, and recovers from dependency outages with a
//! linear backoff instead of hammering a dead model server.
//!
//! ## Key Features
//!
//! - **Two-class priority**: foreground by queue position, background FIFO behind
//!   an idle gate
//! - **Preemption**: [`core::Preemptor`] cancels the current job with a
//!   compare-and-swap on the slot, and the interrupted task's checkpoint is kept
//! - **Failure taxonomy**: communication errors back off the loop; logic errors
//!   escalate the task to a human
//! - **Delegation polling**: tracks tasks handed to an external orchestrator
//! - **Cron dispatch**: materializes scheduled definitions ahead of time
//! - **Supervision**: every loop survives errors and panics in its own body
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gpu_slot_scheduler::builders::SchedulerBuilder;
//! use gpu_slot_scheduler::config::SchedulerConfig;
//! use gpu_slot_scheduler::core::ForegroundLoad;
//! use gpu_slot_scheduler::infra::InMemoryTaskStore;
//!
//! let store = Arc::new(InMemoryTaskStore::new());
//! let load = Arc::new(ForegroundLoad::new());
//! let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
//!     .store(store.clone())
//!     .executor(Arc::new(MyExecutor))
//!     .load(load.clone())
//!     .escalations(store.clone())
//!     .build()?;
//! load.attach_preemptor(scheduler.preemptor());
//! scheduler.start();
//!
//! // In a request handler: beginning the request preempts background work.
//! let _guard = load.begin_request();
//!
//! // On shutdown:
//! scheduler.stop().await;
//! ```
//!
//! For complete scenarios, see `tests/scheduler_engine_test.rs`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and the scheduler engine.
pub mod core;
/// Configuration models for the scheduler and orchestrator client.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure adapters for task stores, cron sources and the orchestrator.
pub mod infra;
/// API surface for hosts embedding the scheduler.
pub mod runtime;
/// Shared utilities.
pub mod util;
