//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use prometheus_dispatch::config::{BatchConfig, DebounceConfig, SchedulerConfig, WorkerPoolConfig};

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_worker_pool_config_validation() {
    assert!(WorkerPoolConfig::new().validate().is_ok());
    assert!(WorkerPoolConfig::single().validate().is_ok());
}

#[test]
fn test_worker_pool_config_invalid_worker_count() {
    let invalid = WorkerPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_stack_size() {
    let invalid = WorkerPoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_prefix() {
    let invalid = WorkerPoolConfig::new().with_thread_name_prefix("");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_debounce_wait_defaults_to_zero() {
    let cfg = DebounceConfig::default();
    assert_eq!(cfg.wait_ms, 0);
    assert_eq!(cfg.wait(), Duration::ZERO);
    assert_eq!(cfg.workers.worker_count, 1);
}

#[test]
fn test_debounce_with_wait_rounds_up_to_millis() {
    let cfg = DebounceConfig::default().with_wait(Duration::from_micros(2_500));
    assert_eq!(cfg.wait_ms, 3);

    let cfg = DebounceConfig::default().with_wait(Duration::from_millis(40));
    assert_eq!(cfg.wait_ms, 40);

    let cfg = DebounceConfig::default().with_wait(Duration::ZERO);
    assert_eq!(cfg.wait_ms, 0);
}

#[test]
fn test_debounce_sub_millisecond_wait_is_not_zero() {
    let cfg = DebounceConfig::default().with_wait(Duration::from_micros(500));
    assert_eq!(cfg.wait_ms, 1);
    assert_eq!(cfg.wait(), Duration::from_millis(1));
}

#[test]
fn test_scheduler_config_defaults_to_batch() {
    let cfg = SchedulerConfig::default();
    assert_eq!(cfg.policy_name(), "batch");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_validate_reports_policy() {
    let cfg = SchedulerConfig::Batch(
        BatchConfig::default().with_workers(WorkerPoolConfig::new().with_worker_count(0)),
    );
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("batch workers invalid"));
}

#[test]
fn test_from_json_str_debounce() {
    let cfg = SchedulerConfig::from_json_str(r#"{"policy":"debounce","wait_ms":300}"#).unwrap();
    match cfg {
        SchedulerConfig::Debounce(debounce) => {
            assert_eq!(debounce.wait(), Duration::from_millis(300));
            assert_eq!(debounce.workers, DebounceConfig::default().workers);
        }
        other => panic!("expected debounce, got {other:?}"),
    }
}

#[test]
fn test_from_json_str_batch_workers() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"policy":"batch","workers":{"worker_count":3,"thread_name_prefix":"render"}}"#,
    )
    .unwrap();
    let SchedulerConfig::Batch(batch) = cfg else {
        panic!("expected batch");
    };
    assert_eq!(batch.workers.worker_count, 3);
    assert_eq!(batch.workers.thread_name_prefix, "render");
}

#[test]
fn test_from_json_str_immediate() {
    let cfg = SchedulerConfig::from_json_str(r#"{"policy":"immediate"}"#).unwrap();
    assert_eq!(cfg, SchedulerConfig::Immediate);
}

#[test]
fn test_from_json_str_rejects_unknown_policy() {
    let err = SchedulerConfig::from_json_str(r#"{"policy":"round_robin"}"#).unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_from_json_str_rejects_invalid_values() {
    let err =
        SchedulerConfig::from_json_str(r#"{"policy":"batch","workers":{"worker_count":0}}"#)
            .unwrap_err();
    assert!(err.contains("worker_count"));
}

#[test]
fn test_json_round_trip_preserves_policy() {
    let cfg = SchedulerConfig::Debounce(DebounceConfig::default().with_wait(Duration::from_millis(40)));
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains(r#""policy":"debounce""#));
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_from_lookup_defaults_to_batch() {
    let cfg = SchedulerConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
}

#[test]
fn test_from_lookup_debounce_with_overrides() {
    let cfg = SchedulerConfig::from_lookup(lookup_from(&[
        ("DISPATCH_POLICY", "Debounce"),
        ("DISPATCH_WORKERS", "2"),
        ("DISPATCH_DEBOUNCE_MS", " 125 "),
    ]))
    .unwrap();
    let SchedulerConfig::Debounce(debounce) = cfg else {
        panic!("expected debounce");
    };
    assert_eq!(debounce.wait_ms, 125);
    assert_eq!(debounce.workers.worker_count, 2);
}

#[test]
fn test_from_lookup_immediate() {
    let cfg = SchedulerConfig::from_lookup(lookup_from(&[("DISPATCH_POLICY", "immediate")])).unwrap();
    assert_eq!(cfg, SchedulerConfig::Immediate);
}

#[test]
fn test_from_lookup_rejects_bad_values() {
    let bad_workers = SchedulerConfig::from_lookup(lookup_from(&[("DISPATCH_WORKERS", "many")]));
    assert!(bad_workers.unwrap_err().starts_with("DISPATCH_WORKERS"));

    let zero_workers = SchedulerConfig::from_lookup(lookup_from(&[("DISPATCH_WORKERS", "0")]));
    assert!(zero_workers.is_err());

    let bad_policy = SchedulerConfig::from_lookup(lookup_from(&[("DISPATCH_POLICY", "lifo")]));
    assert!(bad_policy.unwrap_err().contains("lifo"));

    let bad_wait = SchedulerConfig::from_lookup(lookup_from(&[
        ("DISPATCH_POLICY", "debounce"),
        ("DISPATCH_DEBOUNCE_MS", "-5"),
    ]));
    assert!(bad_wait.unwrap_err().starts_with("DISPATCH_DEBOUNCE_MS"));
}
