//! Failure tests for the collection cycle
//!
//! These tests verify that the relay degrades instead of stopping:
//! - Backend unreachable or failing
//! - Backend slower than the cycle deadline
//! - Downstream service rejecting or unreachable

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use metrics_relay::actors::messages::CycleOutcome;
use metrics_relay::actors::scheduler::{Pipeline, SchedulerHandle};
use metrics_relay::collector::SnapshotCollector;
use metrics_relay::forwarder::Forwarder;
use metrics_relay::template::QueryTemplate;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_unreachable_backend_still_forwards_all_entities() {
    let downstream = start_downstream(200).await;

    let config = create_test_config("http://127.0.0.1:9", &analyze_url(&downstream), None);
    let handle = SchedulerHandle::spawn(create_prometheus_pipeline(&config), Duration::from_secs(3600));

    let report = handle.run_cycle_now().await.unwrap();
    assert_eq!(report.samples, 0);
    assert_eq!(report.missing, 2);
    assert_eq!(report.outcome, CycleOutcome::Forwarded { snapshots: 1 });

    let bodies = forwarded_bodies(&downstream).await;
    assert_eq!(bodies[0]["metrics"]["web"], serde_json::json!({}));
    assert_eq!(bodies[0]["metrics"]["db"], serde_json::json!({}));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_pair_does_not_affect_others() {
    let prometheus = MockServer::start().await;
    mount_sample(&prometheus, &cpu_query("web"), "0.5", None).await;
    mount_failure(&prometheus, &cpu_query("db"), None).await;
    let downstream = start_downstream(200).await;

    let config = create_test_config(&prometheus.uri(), &analyze_url(&downstream), None);
    let handle = SchedulerHandle::spawn(create_prometheus_pipeline(&config), Duration::from_secs(3600));

    let report = handle.run_cycle_now().await.unwrap();
    assert_eq!(report.samples, 1);
    assert_eq!(report.missing, 1);

    let bodies = forwarded_bodies(&downstream).await;
    assert_eq!(bodies[0]["metrics"]["web"]["cpu"], 0.5);
    assert!(bodies[0]["metrics"]["db"].get("cpu").is_none());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_vector_is_absent() {
    let prometheus = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [] }
        })))
        .mount(&prometheus)
        .await;
    let downstream = start_downstream(200).await;

    let config = create_test_config(&prometheus.uri(), &analyze_url(&downstream), None);
    let handle = SchedulerHandle::spawn(create_prometheus_pipeline(&config), Duration::from_secs(3600));

    let report = handle.run_cycle_now().await.unwrap();
    assert_eq!(report.samples, 0);
    assert_eq!(report.outcome, CycleOutcome::Forwarded { snapshots: 1 });

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_backend_is_bounded_by_cycle_deadline() {
    let downstream = start_downstream(200).await;
    let backend = SlowBackend::new(Duration::from_secs(10));

    let collector = SnapshotCollector::new(
        backend.clone(),
        vec!["web".to_string(), "db".to_string(), "cache".to_string()],
        vec![("cpu".to_string(), QueryTemplate::parse(CPU_TEMPLATE).unwrap())],
        // one query at a time: the budget must still be shared, not per query
        NonZeroUsize::new(1).unwrap(),
    );
    let mut pipeline = Pipeline::new(
        collector,
        None,
        Forwarder::new(analyze_url(&downstream), Duration::from_secs(2)).unwrap(),
        Duration::from_millis(200),
    );

    let started = Instant::now();
    let report = pipeline.run_cycle().await;

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "cycle took {:?}",
        started.elapsed()
    );
    assert_eq!(report.samples, 0);
    assert_eq!(report.missing, 3);
    assert_eq!(report.outcome, CycleOutcome::Forwarded { snapshots: 1 });
}

#[tokio::test]
async fn test_rejected_delivery_carries_body_and_next_cycle_recovers() {
    let prometheus = MockServer::start().await;
    mount_sample(&prometheus, &cpu_query("web"), "1", None).await;
    mount_sample(&prometheus, &cpu_query("db"), "2", None).await;

    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&downstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&downstream)
        .await;

    let config = create_test_config(&prometheus.uri(), &analyze_url(&downstream), None);
    let handle = SchedulerHandle::spawn(create_prometheus_pipeline(&config), Duration::from_secs(3600));

    let first = handle.run_cycle_now().await.unwrap();
    assert_matches!(first.outcome, CycleOutcome::DeliveryFailed { error } if error.contains("boom"));

    let second = handle.run_cycle_now().await.unwrap();
    assert_eq!(second.outcome, CycleOutcome::Forwarded { snapshots: 1 });

    // no retry: exactly one POST per cycle
    assert_eq!(forwarded_bodies(&downstream).await.len(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_downstream_is_not_fatal() {
    let prometheus = MockServer::start().await;
    mount_sample(&prometheus, &cpu_query("web"), "1", None).await;
    mount_sample(&prometheus, &cpu_query("db"), "2", None).await;

    let config = create_test_config(&prometheus.uri(), "http://127.0.0.1:9/analyze", Some(1));
    let handle = SchedulerHandle::spawn(create_prometheus_pipeline(&config), Duration::from_secs(3600));

    for _ in 0..3 {
        let report = handle.run_cycle_now().await.unwrap();
        assert_matches!(report.outcome, CycleOutcome::DeliveryFailed { .. });
    }

    // the window keeps sliding regardless of delivery failures
    let window = handle.window_contents().await.unwrap().unwrap();
    assert_eq!(window.len(), 1);

    handle.shutdown().await.unwrap();
}
