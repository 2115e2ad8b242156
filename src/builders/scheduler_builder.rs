//! Builder assembling a [`Scheduler`] from configuration and collaborators.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::scheduler::Collaborators;
use crate::core::{
    CronSource, EscalationSink, EventSink, LoadSignal, NullEventSink, OrchestratorClient,
    Qualifier, Scheduler, SchedulerError, TaskExecutor, TaskStore,
};

/// Fluent builder for [`Scheduler`].
///
/// The task store, executor, load signal and escalation sink are required.
/// Events default to [`NullEventSink`]. Loops whose collaborator is absent
/// (orchestrator, cron source, qualifier) are not started.
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
///     .store(store.clone())
///     .executor(Arc::new(MyExecutor))
///     .load(load.clone())
///     .escalations(store.clone())
///     .orchestrator(Arc::new(HttpOrchestratorClient::new(&orchestrator_cfg)?))
///     .build()?;
/// load.attach_preemptor(scheduler.preemptor());
/// scheduler.start();
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn TaskStore>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    load: Option<Arc<dyn LoadSignal>>,
    escalations: Option<Arc<dyn EscalationSink>>,
    events: Option<Arc<dyn EventSink>>,
    orchestrator: Option<Arc<dyn OrchestratorClient>>,
    cron: Option<Arc<dyn CronSource>>,
    qualifier: Option<Arc<dyn Qualifier>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Task store (required).
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Task executor (required).
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Foreground load signal (required).
    #[must_use]
    pub fn load(mut self, load: Arc<dyn LoadSignal>) -> Self {
        self.load = Some(load);
        self
    }

    /// Escalation sink (required).
    #[must_use]
    pub fn escalations(mut self, escalations: Arc<dyn EscalationSink>) -> Self {
        self.escalations = Some(escalations);
        self
    }

    /// Event sink for progress, results and queue status.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Orchestrator client; enables the result-polling loop.
    #[must_use]
    pub fn orchestrator(mut self, orchestrator: Arc<dyn OrchestratorClient>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Scheduled-definition source; enables the dispatch loop.
    #[must_use]
    pub fn cron(mut self, cron: Arc<dyn CronSource>) -> Self {
        self.cron = Some(cron);
        self
    }

    /// External qualifier; enables the qualification loop.
    #[must_use]
    pub fn qualifier(mut self, qualifier: Arc<dyn Qualifier>) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Validate the configuration and assemble the scheduler.
    pub fn build(self) -> Result<Arc<Scheduler>, SchedulerError> {
        self.config
            .validate()
            .map_err(|e| SchedulerError::Config(format!("config invalid: {e}")))?;

        let parts = Collaborators {
            store: required(self.store, "task store")?,
            executor: required(self.executor, "task executor")?,
            load: required(self.load, "load signal")?,
            escalations: required(self.escalations, "escalation sink")?,
            events: self.events.unwrap_or_else(|| Arc::new(NullEventSink)),
            orchestrator: self.orchestrator,
            cron: self.cron,
            qualifier: self.qualifier,
        };
        Ok(Arc::new(Scheduler::new(self.config, parts)))
    }
}

fn required<T: ?Sized>(value: Option<Arc<T>>, what: &str) -> Result<Arc<T>, SchedulerError> {
    value.ok_or_else(|| SchedulerError::Config(format!("missing {what}")))
}
