//! Tests for failure reporters

use std::sync::Arc;
use std::thread;

use prometheus_dispatch::core::{
    FailureEvent, FailureReporter, InMemoryReporter, TaskFailure, TracingReporter,
};
use uuid::Uuid;

fn event(task_id: u64) -> FailureEvent {
    FailureEvent::new(
        Uuid::new_v4(),
        "batch",
        task_id,
        TaskFailure::Panicked("index out of bounds".into()),
    )
}

#[test]
fn test_in_memory_reporter_keeps_order() {
    let reporter = InMemoryReporter::default();
    assert!(reporter.is_empty());

    for id in 0..5 {
        reporter.report(event(id));
    }

    let ids: Vec<_> = reporter.events().iter().map(|e| e.task_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(reporter.len(), 5);
}

#[test]
fn test_in_memory_reporter_drops_oldest() {
    let reporter = InMemoryReporter::new(3);
    for id in 0..10 {
        reporter.report(event(id));
    }
    let ids: Vec<_> = reporter.events().iter().map(|e| e.task_id).collect();
    assert_eq!(ids, vec![7, 8, 9]);
}

#[test]
fn test_in_memory_reporter_concurrent_reports() {
    let reporter = Arc::new(InMemoryReporter::default());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let reporter = Arc::clone(&reporter);
            thread::spawn(move || {
                for i in 0..25 {
                    reporter.report(event(t * 100 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(reporter.len(), 100);
}

#[test]
fn test_event_is_timestamped() {
    let e = event(1);
    assert!(e.occurred_at_ms > 0);
    assert_eq!(e.policy, "batch");
}

#[test]
fn test_tracing_reporter_accepts_events() {
    prometheus_dispatch::util::init_test_tracing();
    let reporter: Arc<dyn FailureReporter> = Arc::new(TracingReporter);
    reporter.report(event(7));
}
