//! Tests for event sinks and queue previews

use std::collections::HashMap;

use gpu_slot_scheduler::core::{
    BroadcastEventSink, EventSink, InMemoryEventSink, SchedulerEvent, Task, TaskPreview,
    PREVIEW_CHARS,
};
use uuid::Uuid;

fn progress(message: &str) -> SchedulerEvent {
    SchedulerEvent::Progress {
        task_id: Uuid::new_v4(),
        correlation_id: "corr".into(),
        message: message.into(),
        metadata: HashMap::new(),
    }
}

#[test]
fn test_in_memory_sink_drops_oldest() {
    let sink = InMemoryEventSink::new(2);
    sink.publish(progress("one"));
    sink.publish(progress("two"));
    sink.publish(progress("three"));
    let messages: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::Progress { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(messages, vec!["two", "three"]);
}

#[tokio::test]
async fn test_broadcast_sink_fans_out() {
    let sink = BroadcastEventSink::new(8);
    let mut a = sink.subscribe();
    let mut b = sink.subscribe();
    sink.publish(progress("hello"));
    assert!(matches!(a.recv().await.unwrap(), SchedulerEvent::Progress { .. }));
    assert!(matches!(b.recv().await.unwrap(), SchedulerEvent::Progress { .. }));
}

#[test]
fn test_broadcast_without_subscribers_does_not_panic() {
    BroadcastEventSink::new(1).publish(progress("nobody listening"));
}

#[test]
fn test_preview_never_carries_whole_payload() {
    let task = Task::foreground("client-1", "x".repeat(PREVIEW_CHARS * 3), 1);
    let preview = TaskPreview::of(&task);
    assert_eq!(preview.task_id, task.id);
    assert_eq!(preview.preview.chars().count(), PREVIEW_CHARS + 1);
    assert!(preview.preview.ends_with('…'));
}
