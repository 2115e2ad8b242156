//! Tests for configuration validation

use gpu_slot_scheduler::config::{CommunicationErrorPolicy, OrchestratorConfig, SchedulerConfig};

#[test]
fn test_scheduler_config_default_is_valid() {
    assert!(SchedulerConfig::default().validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_idle_interval() {
    let invalid = SchedulerConfig {
        idle_interval_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_cap_below_base() {
    let invalid = SchedulerConfig {
        backoff_base_ms: 10_000,
        backoff_cap_ms: 5_000,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_window_shorter_than_interval() {
    let invalid = SchedulerConfig {
        dispatch_interval_secs: 600,
        dispatch_advance_window_secs: 300,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "idle_interval_ms": 500,
        "background_idle_threshold_secs": 10,
        "communication_error_policy": "retain"
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.idle_interval_ms, 500);
    assert_eq!(cfg.background_idle_threshold_secs, 10);
    assert_eq!(cfg.communication_error_policy, CommunicationErrorPolicy::Retain);
    // Unspecified fields keep their defaults.
    assert_eq!(cfg.backoff_base_ms, 30_000);
}

#[test]
fn test_scheduler_config_from_json_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"idle_interval_ms": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_unknown_policy_rejected() {
    let result = SchedulerConfig::from_lookup(|k| {
        (k == "SCHEDULER_COMMUNICATION_ERROR_POLICY").then(|| "ignore".to_string())
    });
    assert!(result.is_err());
}

#[test]
fn test_orchestrator_config_validation() {
    let valid = OrchestratorConfig {
        base_url: "http://localhost:8090".into(),
        request_timeout_secs: 10,
    };
    assert!(valid.validate().is_ok());

    let bad_scheme = OrchestratorConfig {
        base_url: "localhost:8090".into(),
        ..valid.clone()
    };
    assert!(bad_scheme.validate().is_err());

    let no_timeout = OrchestratorConfig {
        request_timeout_secs: 0,
        ..valid
    };
    assert!(no_timeout.validate().is_err());
}
