//! Tests for SchedulerFactory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus_dispatch::builders::SchedulerFactory;
use prometheus_dispatch::config::{BatchConfig, DebounceConfig, SchedulerConfig, WorkerPoolConfig};
use prometheus_dispatch::core::{
    Action, ExecutionMode, InMemoryReporter, Policy, Scheduler, SchedulerError, SchedulerExt,
};
use uuid::Uuid;

/// A policy implemented by the host application.
struct PriorityScheduler {
    id: Uuid,
}

impl Scheduler for PriorityScheduler {
    fn submit(&self, action: Action, _mode: ExecutionMode) {
        let _ = action();
    }

    fn policy(&self) -> Policy {
        Policy::Custom("priority".into())
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

#[test]
fn test_build_each_policy() {
    let factory = SchedulerFactory::default();

    let immediate = factory.build(&SchedulerConfig::Immediate).unwrap();
    assert_eq!(immediate.policy(), Policy::Immediate);

    let batch_cfg = BatchConfig::default().with_workers(WorkerPoolConfig::new().with_worker_count(2));
    let batch = factory.build(&SchedulerConfig::Batch(batch_cfg.clone())).unwrap();
    assert_eq!(batch.policy(), Policy::Batch(batch_cfg));

    let debounce_cfg = DebounceConfig::default().with_wait(Duration::from_millis(80));
    let debounce = factory
        .build(&SchedulerConfig::Debounce(debounce_cfg.clone()))
        .unwrap();
    assert_eq!(debounce.policy(), Policy::Debounce(debounce_cfg));
    assert_eq!(debounce.policy().name(), "debounce");
}

#[test]
fn test_build_rejects_invalid_config() {
    let factory = SchedulerFactory::default();
    let cfg = SchedulerConfig::Batch(
        BatchConfig::default().with_workers(WorkerPoolConfig::new().with_worker_count(0)),
    );
    let result = factory.build(&cfg);
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_create_like_preserves_debounce_wait() {
    let factory = SchedulerFactory::default();
    let cfg = SchedulerConfig::Debounce(DebounceConfig::default().with_wait(Duration::from_millis(300)));
    let original = factory.build(&cfg).unwrap();

    let copy = factory.create_like(original.as_ref()).unwrap();
    assert_eq!(copy.policy(), Policy::Debounce(DebounceConfig::default().with_wait(Duration::from_millis(300))));
    assert_ne!(copy.id(), original.id());
}

#[test]
fn test_create_like_batch_has_independent_queue() {
    let factory = SchedulerFactory::default();
    let original = factory.build(&SchedulerConfig::default()).unwrap();
    let copy = factory.create_like(original.as_ref()).unwrap();

    // Keep the original busy with a serial task.
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
    original.submit_serial(move || {
        let _ = release_rx.recv_timeout(Duration::from_secs(10));
    });

    // The copy still dispatches right away.
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    copy.submit_serial(move || flag.store(true, Ordering::SeqCst));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !ran.load(Ordering::SeqCst) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(ran.load(Ordering::SeqCst));
    release_tx.send(()).unwrap();
}

#[test]
fn test_create_like_unrecognized_policy() {
    let factory = SchedulerFactory::default();
    let external = PriorityScheduler { id: Uuid::new_v4() };

    match factory.create_like(&external) {
        Err(SchedulerError::UnrecognizedPolicy(name)) => assert_eq!(name, "priority"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("custom policy must not be reproducible"),
    }
}

#[test]
fn test_factory_injects_reporter() {
    let reporter = Arc::new(InMemoryReporter::default());
    let factory = SchedulerFactory::new(reporter.clone());
    let scheduler = factory.build(&SchedulerConfig::Immediate).unwrap();

    scheduler.submit_fallible(|| anyhow::bail!("peak list empty"), ExecutionMode::Serial);

    let events = reporter.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].policy, "immediate");
    assert_eq!(events[0].scheduler_id, scheduler.id());
}

#[test]
fn test_build_from_lookup() {
    let factory = SchedulerFactory::default();
    let cfg = SchedulerConfig::from_lookup(|key| match key {
        "DISPATCH_POLICY" => Some("immediate".into()),
        _ => None,
    })
    .unwrap();
    let scheduler = factory.build(&cfg).unwrap();
    assert_eq!(scheduler.policy().name(), "immediate");
}

#[test]
fn test_create_like_uses_factory_reporter() {
    let original_reporter = Arc::new(InMemoryReporter::default());
    let original = SchedulerFactory::new(original_reporter.clone())
        .build(&SchedulerConfig::Immediate)
        .unwrap();

    let factory_reporter = Arc::new(InMemoryReporter::default());
    let factory = SchedulerFactory::new(factory_reporter.clone());
    let copy = factory.create_like(original.as_ref()).unwrap();

    copy.submit_serial(|| panic!("missing calibration"));

    assert!(original_reporter.is_empty());
    assert_eq!(factory_reporter.len(), 1);
    assert_eq!(factory_reporter.events()[0].scheduler_id, copy.id());
}
