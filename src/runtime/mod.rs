//! API surface for hosts embedding the scheduler.

pub mod api;

pub use api::{
    health, queue_status, submit_task, task_status, Health, TaskStatusResponse, TaskSubmission,
};
