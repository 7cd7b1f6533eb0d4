//! End-to-end replays through real lane threads with the mock backend

use std::sync::Arc;
use std::time::Duration;

use super::common::traces::{evenly_spaced, gets, keys, malformed, monitor_line, TraceFile};
use tracereplay::backend::mock::{MockConfig, MockStrategyFactory};
use tracereplay::{
    BackendConfig, BackendKind, LaneFailurePolicy, OperationRecord, ReplayError, ReplayOptions,
    Replayer, TraceFormat,
};

fn replayer(lanes: usize, policy: LaneFailurePolicy, factory: &MockStrategyFactory) -> Replayer {
    Replayer::new(
        ReplayOptions::default()
            .with_lanes(lanes)
            .with_policy(policy),
        Arc::new(factory.clone()),
    )
}

#[tokio::test]
async fn test_single_lane_keeps_order_and_gaps() {
    let factory = MockStrategyFactory::default();
    let report = replayer(1, LaneFailurePolicy::Abort, &factory)
        .run(gets(&[10.0, 10.5, 11.2]))
        .await
        .unwrap();

    assert_eq!(report.outcome.succeeded, 3);
    assert_eq!(report.outcome.failed, 0);
    assert_eq!(keys(&factory.executed_on(0)), vec!["k0", "k1", "k2"]);

    let executed = factory.executed();
    let gap1 = executed[1].at - executed[0].at;
    let gap2 = executed[2].at - executed[1].at;
    assert!(
        gap1 >= Duration::from_millis(450) && gap1 < Duration::from_millis(700),
        "first gap was {gap1:?}"
    );
    assert!(
        gap2 >= Duration::from_millis(650) && gap2 < Duration::from_millis(900),
        "second gap was {gap2:?}"
    );
    assert!(report.wall_clock() >= Duration::from_millis(1_200));
}

#[tokio::test]
async fn test_round_robin_skips_malformed_entries() {
    let factory = MockStrategyFactory::default();
    let mut entries = gets(&[0.0, 0.01, 0.02, 0.03]);
    entries[1] = malformed(2);

    let report = replayer(2, LaneFailurePolicy::Abort, &factory)
        .run(entries)
        .await
        .unwrap();

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.malformed, 1);
    assert_eq!(keys(&factory.executed_on(0)), vec!["k0", "k2"]);
    assert_eq!(keys(&factory.executed_on(1)), vec!["k3"]);
}

#[tokio::test]
async fn test_failing_backend_still_completes() {
    let factory = MockStrategyFactory::new(MockConfig::default().failing_all());
    let report = replayer(3, LaneFailurePolicy::Abort, &factory)
        .run(evenly_spaced(9, 0.001))
        .await
        .unwrap();

    assert_eq!(report.outcome.succeeded, 0);
    assert_eq!(report.outcome.failed, 9);
    assert_eq!(report.outcome.success_rate, Some(0.0));
    assert!(report.outcome.latency.is_none());
}

#[tokio::test]
async fn test_panicking_backend_is_contained() {
    let factory = MockStrategyFactory::new(MockConfig::default().panicking());
    let report = replayer(2, LaneFailurePolicy::Abort, &factory)
        .run(evenly_spaced(4, 0.001))
        .await
        .unwrap();

    assert_eq!(report.outcome.attempted, 4);
    assert_eq!(report.outcome.failed, 4);
    assert_eq!(factory.executed().len(), 4);
}

#[tokio::test]
async fn test_partial_failures_are_counted() {
    let factory = MockStrategyFactory::new(MockConfig::default().failing_operation("GET"));
    let mut entries = evenly_spaced(2, 0.001);
    entries.push(Ok(
        OperationRecord::new(0.003, "SET", "x").with_arguments(vec!["1".into()])
    ));

    let report = replayer(1, LaneFailurePolicy::Abort, &factory)
        .run(entries)
        .await
        .unwrap();

    assert_eq!(report.outcome.succeeded, 1);
    assert_eq!(report.outcome.failed, 2);
    let rate = report.outcome.success_rate.unwrap();
    assert!((rate - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_dead_lane_orphans_its_records() {
    let factory = MockStrategyFactory::new(MockConfig::default().failing_connect(1));
    let report = replayer(2, LaneFailurePolicy::Orphan, &factory)
        .run(evenly_spaced(6, 0.001))
        .await
        .unwrap();

    // Lane 0 processes its half; lane 1's half is never executed.
    assert_eq!(keys(&factory.executed_on(0)), vec!["k0", "k2", "k4"]);
    assert!(factory.executed_on(1).is_empty());
    assert_eq!(report.failed_lanes, vec![1]);
    assert_eq!(report.orphaned, 3);
    assert_eq!(report.outcome.attempted, 3);
}

#[tokio::test]
async fn test_dead_lane_under_skip_and_abort() {
    let factory = MockStrategyFactory::new(MockConfig::default().failing_connect(1));
    let report = replayer(2, LaneFailurePolicy::Skip, &factory)
        .run(evenly_spaced(6, 0.001))
        .await
        .unwrap();
    assert_eq!(factory.executed_on(0).len(), 6);
    assert_eq!(report.orphaned, 0);

    let factory = MockStrategyFactory::new(MockConfig::default().failing_connect(1));
    let err = replayer(2, LaneFailurePolicy::Abort, &factory)
        .run(evenly_spaced(6, 0.001))
        .await
        .unwrap_err();
    assert!(matches!(err, ReplayError::LaneSetup { lane: 1, .. }));
    assert!(factory.executed().is_empty());
}

#[tokio::test]
async fn test_many_lanes_preserve_per_lane_order() {
    let factory = MockStrategyFactory::new(
        MockConfig::default().with_latency(Duration::from_millis(1)),
    );
    let report = replayer(8, LaneFailurePolicy::Abort, &factory)
        .run(evenly_spaced(100, 0.0005))
        .await
        .unwrap();

    assert_eq!(report.per_lane.iter().sum::<u64>(), 100);
    assert_eq!(report.outcome.succeeded, 100);

    for lane in 0..8 {
        let indices: Vec<usize> = factory
            .executed_on(lane)
            .iter()
            .map(|r| r.target_key[1..].parse().unwrap())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|i| i % 8 == lane));
    }

    let latency = report.outcome.latency.unwrap();
    assert_eq!(latency.count, 100);
    assert!(latency.min_ns >= 1_000_000);
}

#[tokio::test]
async fn test_empty_trace_joins_every_lane() {
    let factory = MockStrategyFactory::default();
    let report = replayer(4, LaneFailurePolicy::Abort, &factory)
        .run(Vec::new())
        .await
        .unwrap();

    assert_eq!(report.dispatched, 0);
    assert_eq!(report.per_lane, vec![0, 0, 0, 0]);
    assert!(report.outcome.success_rate.is_none());
    assert_eq!(factory.connect_calls(), 4);
}

#[tokio::test]
async fn test_monitor_file_on_noop_backend() {
    let trace = TraceFile::monitor(&[
        monitor_line(100.0, "SET", &["a", "1"]),
        "this is not a monitor line".to_string(),
        monitor_line(100.01, "get", &["a"]),
        monitor_line(100.02, "CLIENT", &["SETNAME", "x"]),
        String::new(),
        monitor_line(100.03, "DEL", &["a"]),
    ]);

    let replayer = Replayer::new(
        ReplayOptions::default().with_lanes(2),
        Arc::new(BackendConfig::new(BackendKind::Noop)),
    );
    let report = replayer
        .run_file(&trace.path, TraceFormat::Monitor)
        .await
        .unwrap();

    assert_eq!(report.backend, BackendKind::Noop);
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.malformed, 2);
    assert_eq!(report.outcome.succeeded, 3);
    assert_eq!(report.per_lane, vec![2, 1]);
}

#[tokio::test]
async fn test_invalid_utf8_line_is_skipped_not_fatal() {
    let mut bytes = monitor_line(5.0, "SET", &["a", "1"]).into_bytes();
    bytes.extend_from_slice(b"\n5.001 [0 127.0.0.1:52144] \"GET\" \"\xff\xfe\"\n");
    bytes.extend_from_slice(monitor_line(5.002, "GET", &["a"]).as_bytes());
    bytes.push(b'\n');
    let trace = TraceFile::raw("trace.log", &bytes);

    let replayer = Replayer::new(
        ReplayOptions::default().with_lanes(1),
        Arc::new(BackendConfig::new(BackendKind::Noop)),
    );
    let report = replayer
        .run_file(&trace.path, TraceFormat::Monitor)
        .await
        .unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.outcome.succeeded, 2);
    assert_eq!(report.outcome.failed, 0);
}

#[tokio::test]
async fn test_missing_trace_file_is_an_error() {
    let trace = TraceFile::monitor(&[]);
    let missing = trace.dir.path().join("nope.log");
    let replayer = Replayer::new(
        ReplayOptions::default().with_lanes(1),
        Arc::new(BackendConfig::new(BackendKind::Noop)),
    );
    let err = replayer
        .run_file(&missing, TraceFormat::Monitor)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplayError::Trace(_)));
}
