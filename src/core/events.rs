//! Scheduler notifications: progress, final results, communication errors and
//! queue status.
//!
//! Provides a bounded in-memory sink for tests and dev, and a broadcast sink
//! for streaming consumers.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::{ErrorCode, ProcessingMode, Task, TaskId};
use crate::util::clock::preview;

/// Characters of task content kept in a preview.
pub const PREVIEW_CHARS: usize = 80;

/// Short description of a task for queue-status consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPreview {
    /// Task identifier.
    pub task_id: TaskId,
    /// Owning client.
    pub client_id: String,
    /// Scheduling class.
    pub processing_mode: ProcessingMode,
    /// Truncated content.
    pub preview: String,
}

impl TaskPreview {
    /// Preview of `task` with content cut to [`PREVIEW_CHARS`].
    #[must_use]
    pub fn of(task: &Task) -> Self {
        Self {
            task_id: task.id,
            client_id: task.client_id.clone(),
            processing_mode: task.processing_mode(),
            preview: preview(&task.content, PREVIEW_CHARS),
        }
    }
}

/// Store-side view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Eligible foreground tasks.
    pub foreground_depth: usize,
    /// Eligible background tasks.
    pub background_depth: usize,
    /// Next eligible tasks in execution order.
    pub pending: Vec<TaskPreview>,
}

/// Queue status published whenever the slot changes hands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Task holding the GPU slot, if any.
    pub running: Option<TaskPreview>,
    /// Eligible foreground tasks.
    pub foreground_depth: usize,
    /// Eligible background tasks.
    pub background_depth: usize,
    /// Next eligible tasks in execution order.
    pub pending: Vec<TaskPreview>,
}

impl QueueStatus {
    /// Combine a store snapshot with the running task.
    #[must_use]
    pub fn from_snapshot(running: Option<TaskPreview>, snapshot: QueueSnapshot) -> Self {
        Self {
            running,
            foreground_depth: snapshot.foreground_depth,
            background_depth: snapshot.background_depth,
            pending: snapshot.pending,
        }
    }
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// Intermediate executor or orchestrator message.
    Progress {
        /// Task reporting progress.
        task_id: TaskId,
        /// Correlation id for tracing.
        correlation_id: String,
        /// Message text.
        message: String,
        /// Free-form metadata.
        metadata: HashMap<String, String>,
    },
    /// Final output of a task for the response stream.
    FinalResult {
        /// Completed task.
        task_id: TaskId,
        /// Correlation id for tracing.
        correlation_id: String,
        /// Client to answer.
        client_id: String,
        /// Output text.
        output: String,
    },
    /// A downstream dependency failed; the execution loop is backing off.
    CommunicationError {
        /// Task that hit the failure.
        task_id: TaskId,
        /// Taxonomy code.
        code: Option<ErrorCode>,
        /// Error detail.
        message: String,
        /// Consecutive failures so far.
        consecutive_failures: u32,
        /// Backoff before the next attempt.
        backoff_ms: u64,
    },
    /// Queue status changed.
    QueueStatus(QueueStatus),
}

/// Receiver of scheduler events.
pub trait EventSink: Send + Sync {
    /// Publish an event. Must not block.
    fn publish(&self, event: SchedulerEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: SchedulerEvent) {}
}

/// In-memory event sink for testing and dev.
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<SchedulerEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Final results published for a task.
    pub fn final_results(&self, task_id: TaskId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::FinalResult {
                    task_id: id,
                    output,
                    ..
                } if *id == task_id => Some(output.clone()),
                _ => None,
            })
            .collect()
    }

    /// Progress messages published for a task.
    pub fn progress_messages(&self, task_id: TaskId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SchedulerEvent::Progress {
                    task_id: id,
                    message,
                    ..
                } if *id == task_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, event: SchedulerEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Fan-out sink backed by a `tokio::sync::broadcast` channel.
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// scheduler.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl BroadcastEventSink {
    /// Create a sink with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to subsequent events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: SchedulerEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn progress(task_id: TaskId, message: &str) -> SchedulerEvent {
        SchedulerEvent::Progress {
            task_id,
            correlation_id: "c".into(),
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_in_memory_sink_overflow() {
        let sink = InMemoryEventSink::new(2);
        let id = Uuid::new_v4();
        sink.publish(progress(id, "one"));
        sink.publish(progress(id, "two"));
        sink.publish(progress(id, "three"));
        assert_eq!(sink.progress_messages(id), vec!["two", "three"]);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        let id = Uuid::new_v4();
        sink.publish(progress(id, "hello"));
        match rx.recv().await.unwrap() {
            SchedulerEvent::Progress { message, .. } => assert_eq!(message, "hello"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let json = serde_json::to_value(SchedulerEvent::QueueStatus(QueueStatus::default())).unwrap();
        assert_eq!(json["kind"], "queue_status");
    }
}
