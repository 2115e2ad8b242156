//! Tests for builder modules

use std::sync::Arc;

use async_trait::async_trait;
use gpu_slot_scheduler::builders::SchedulerBuilder;
use gpu_slot_scheduler::config::SchedulerConfig;
use gpu_slot_scheduler::core::{
    ExecutionContext, ExecutionError, ExecutionOutcome, ForegroundLoad, SchedulerError, Task,
    TaskExecutor,
};
use gpu_slot_scheduler::infra::InMemoryTaskStore;

struct Echo;

#[async_trait]
impl TaskExecutor for Echo {
    async fn run(
        &self,
        task: &Task,
        _ctx: ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Ok(ExecutionOutcome::Completed {
            output: task.content.clone(),
        })
    }
}

fn complete(config: SchedulerConfig) -> SchedulerBuilder {
    let store = Arc::new(InMemoryTaskStore::new());
    SchedulerBuilder::new(config)
        .store(store.clone())
        .executor(Arc::new(Echo))
        .load(Arc::new(ForegroundLoad::new()))
        .escalations(store)
}

#[test]
fn test_builder_with_required_parts() {
    let scheduler = complete(SchedulerConfig::default()).build().unwrap();
    assert!(!scheduler.is_started());
    assert_eq!(scheduler.config().idle_interval_ms, 1_000);
}

#[test]
fn test_builder_missing_executor() {
    let store = Arc::new(InMemoryTaskStore::new());
    let result = SchedulerBuilder::new(SchedulerConfig::default())
        .store(store.clone())
        .load(Arc::new(ForegroundLoad::new()))
        .escalations(store)
        .build();
    match result {
        Err(SchedulerError::Config(msg)) => assert!(msg.contains("executor")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("build must fail without an executor"),
    }
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = SchedulerConfig {
        loop_error_backoff_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(matches!(
        complete(config).build(),
        Err(SchedulerError::Config(_))
    ));
}
