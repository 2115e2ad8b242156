//! Tests for error types and failure classification

use gpu_slot_scheduler::core::{classify, ErrorCode, ExecutionError, FailureClass, SchedulerError};
use uuid::Uuid;

#[test]
fn test_store_error() {
    let err = SchedulerError::Store("connection reset".to_string());
    assert_eq!(format!("{err}"), "store error: connection reset");
}

#[test]
fn test_task_not_found_error() {
    let id = Uuid::nil();
    let err = SchedulerError::TaskNotFound(id);
    assert_eq!(format!("{err}"), format!("task not found: {id}"));
}

#[test]
fn test_backend_error() {
    let err = SchedulerError::Backend("connection failed".to_string());
    assert_eq!(format!("{err}"), "backend error: connection failed");
}

#[test]
fn test_execution_error_display() {
    let err = ExecutionError::new(ErrorCode::LlmTimeout, "model took too long");
    assert_eq!(format!("{err}"), "LLM_TIMEOUT: model took too long");
}

#[test]
fn test_every_communication_code_classifies_as_communication() {
    for code in ErrorCode::COMMUNICATION {
        let err = ExecutionError::new(code, "down");
        assert_eq!(classify(&err), FailureClass::Communication, "{code}");
    }
}

#[test]
fn test_logic_codes_classify_as_logic() {
    for code in [
        ErrorCode::TaskExecutionError,
        ErrorCode::InvalidPayload,
        ErrorCode::InternalState,
    ] {
        assert_eq!(classify(&ExecutionError::new(code, "bad")), FailureClass::Logic);
    }
}

#[test]
fn test_code_named_in_message_wins() {
    let err = ExecutionError::new(
        ErrorCode::TaskExecutionError,
        "upstream said NETWORK_TIMEOUT after 30s",
    );
    assert_eq!(classify(&err), FailureClass::Communication);
}

#[test]
fn test_from_message_infers_code() {
    match ExecutionError::from_message("LLM_UNREACHABLE: no route to host") {
        ExecutionError::Failed { code, .. } => assert_eq!(code, ErrorCode::LlmUnreachable),
        other => panic!("unexpected {other:?}"),
    }
    match ExecutionError::from_message("bad template") {
        ExecutionError::Failed { code, .. } => assert_eq!(code, ErrorCode::TaskExecutionError),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_cancellation_is_its_own_class() {
    assert_eq!(classify(&ExecutionError::cancelled()), FailureClass::Cancellation);
}

#[test]
fn test_error_code_wire_format() {
    let json = serde_json::to_string(&ErrorCode::LlmConnectionFailed).unwrap();
    assert_eq!(json, "\"LLM_CONNECTION_FAILED\"");
}
