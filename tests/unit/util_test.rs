//! Tests for utility functions

use gpu_slot_scheduler::util::{now, now_ms, preview};

#[test]
fn test_preview_respects_char_boundaries() {
    assert_eq!(preview("héllo wörld", 5), "héllo…");
    assert_eq!(preview("", 5), "");
}

#[test]
fn test_clock_helpers_agree() {
    let before = now().timestamp_millis();
    let ms = now_ms();
    assert!(ms >= before);
}

#[test]
fn test_init_tracing_is_idempotent() {
    gpu_slot_scheduler::util::init_tracing();
    gpu_slot_scheduler::util::init_tracing();
}
