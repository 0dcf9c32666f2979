//! Scheduling and concurrency tests
//!
//! These tests verify the single-flight guarantee of the scheduler and the
//! bounded fan-out inside a cycle:
//! - Slow cycles never overlap with the next tick
//! - Missed ticks are skipped, not queued
//! - Concurrent manual cycles are serialized

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use metrics_relay::actors::scheduler::{Pipeline, SchedulerHandle};
use metrics_relay::collector::SnapshotCollector;
use metrics_relay::forwarder::Forwarder;
use metrics_relay::template::QueryTemplate;

use crate::helpers::*;

fn create_slow_pipeline(
    backend: Arc<SlowBackend>,
    entities: &[&str],
    concurrency: usize,
    forward_url: &str,
) -> Pipeline {
    let collector = SnapshotCollector::new(
        backend,
        entities.iter().map(|e| e.to_string()).collect(),
        vec![("cpu".to_string(), QueryTemplate::parse(CPU_TEMPLATE).unwrap())],
        NonZeroUsize::new(concurrency).unwrap(),
    );

    Pipeline::new(
        collector,
        None,
        Forwarder::new(forward_url, Duration::from_secs(2)).unwrap(),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_slow_cycle_never_overlaps_next_tick() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_millis(150));

    // one query per cycle: any overlap would come from a second cycle
    let pipeline = create_slow_pipeline(backend.clone(), &["web"], 1, &analyze_url(&downstream));
    let handle = SchedulerHandle::spawn(pipeline, Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(800)).await;
    handle.shutdown().await.unwrap();

    assert!(backend.calls() >= 2, "expected several cycles, got {}", backend.calls());
    assert_eq!(backend.max_in_flight(), 1, "cycles overlapped");
}

#[tokio::test]
async fn test_missed_ticks_are_skipped_not_stacked() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_millis(300));

    let pipeline = create_slow_pipeline(backend.clone(), &["web"], 1, &analyze_url(&downstream));
    let handle = SchedulerHandle::spawn(pipeline, Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    handle.shutdown().await.unwrap();

    // ~50 ticks elapsed, but each cycle takes 300ms
    let calls = backend.calls();
    assert!((1..=5).contains(&calls), "expected at most 5 cycles, got {calls}");
}

#[tokio::test]
async fn test_concurrent_manual_cycles_are_serialized() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_millis(50));

    let pipeline = create_slow_pipeline(backend.clone(), &["web"], 1, &analyze_url(&downstream));
    let handle = SchedulerHandle::spawn(pipeline, Duration::from_secs(3600));

    let mut tasks = vec![];
    for _ in 0..5 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.run_cycle_now().await }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(backend.calls(), 5);
    assert_eq!(backend.max_in_flight(), 1);
    assert_eq!(forwarded_bodies(&downstream).await.len(), 5);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fan_out_is_bounded() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_millis(50));
    let entities = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];

    let mut pipeline = create_slow_pipeline(backend.clone(), &entities, 3, &analyze_url(&downstream));
    let report = pipeline.run_cycle().await;

    assert_eq!(report.samples, 10);
    assert_eq!(backend.calls(), 10);
    assert!(backend.max_in_flight() <= 3);
    assert!(backend.max_in_flight() > 1, "queries should run in parallel");
}

#[tokio::test]
async fn test_timer_drives_cycles() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_millis(1));

    let pipeline = create_slow_pipeline(backend.clone(), &["web"], 1, &analyze_url(&downstream));
    let handle = SchedulerHandle::spawn(pipeline, Duration::from_millis(100));

    tokio::time::sleep(Duration::from_millis(450)).await;
    handle.shutdown().await.unwrap();

    let forwarded = forwarded_bodies(&downstream).await.len();
    assert!((3..=5).contains(&forwarded), "expected ~4 cycles, got {forwarded}");
}
