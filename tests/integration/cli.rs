//! Binary-level tests: exit status and output of the `tracereplay` CLI

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use super::common::traces::{monitor_line, TraceFile};
use tracereplay::OperationRecord;

fn tracereplay() -> Command {
    let mut cmd = Command::cargo_bin("tracereplay").unwrap();
    // Keep the user's ~/.tracereplay/config.toml out of the picture
    cmd.env("HOME", env!("CARGO_TARGET_TMPDIR"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn monitor_trace() -> TraceFile {
    TraceFile::monitor(&[
        monitor_line(1.0, "SET", &["a", "1"]),
        monitor_line(1.001, "GET", &["a"]),
        "garbage".to_string(),
        monitor_line(1.002, "DEL", &["a"]),
    ])
}

#[test]
fn test_run_noop_backend_prints_report() {
    let trace = monitor_trace();
    tracereplay()
        .args(["run", "--backend", "noop", "--lanes", "2", "--trace"])
        .arg(&trace.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("dispatched: 3  malformed: 1"))
        .stdout(predicate::str::contains("succeeded: 3  failed: 0"));
}

#[test]
fn test_run_json_report() {
    let trace = TraceFile::jsonl(&[
        OperationRecord::new(5.0, "GET", "x"),
        OperationRecord::new(5.001, "GET", "y"),
    ]);
    let output = tracereplay()
        .args(["run", "--backend", "noop", "--lanes", "1", "--format", "jsonl"])
        .args(["--counting", "--json", "--trace"])
        .arg(&trace.path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dispatched"], 2);
    assert_eq!(report["mode"], "counting");
    assert_eq!(report["outcome"]["succeeded"], 2);
    assert!(report["outcome"].get("latency").is_none());
}

#[test]
fn test_unknown_backend_fails() {
    let trace = monitor_trace();
    tracereplay()
        .args(["run", "--backend", "memcached", "--trace"])
        .arg(&trace.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("memcached"));
}

#[test]
fn test_zero_lanes_fails() {
    let trace = monitor_trace();
    tracereplay()
        .args(["run", "--backend", "noop", "--lanes", "0", "--trace"])
        .arg(&trace.path)
        .assert()
        .failure();
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[replay\nlanes = 2").unwrap();

    tracereplay()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn test_missing_trace_fails() {
    let dir = TempDir::new().unwrap();
    tracereplay()
        .args(["run", "--backend", "noop", "--trace"])
        .arg(dir.path().join("absent.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.log"));
}

#[test]
fn test_convert_then_init() {
    let trace = monitor_trace();
    let out = trace.dir.path().join("trace.jsonl");

    tracereplay()
        .args(["convert", "--format", "monitor", "--input"])
        .arg(&trace.path)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 3 records"))
        .stdout(predicate::str::contains("1 skipped"));
    assert_eq!(std::fs::read_to_string(&out).unwrap().lines().count(), 3);

    let config = trace.dir.path().join("config.toml");
    tracereplay()
        .args(["init", "--path"])
        .arg(&config)
        .assert()
        .success();
    tracereplay()
        .args(["init", "--path"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_data_dir_holds_config_and_default_log_file() {
    let data = TempDir::new().unwrap();
    tracereplay()
        .arg("--data-dir")
        .arg(data.path())
        .arg("init")
        .assert()
        .success();
    assert!(data.path().join("config.toml").exists());

    let trace = monitor_trace();
    tracereplay()
        .env("RUST_LOG", "info")
        .arg("--data-dir")
        .arg(data.path())
        .args(["run", "--backend", "noop", "--trace"])
        .arg(&trace.path)
        .arg("--log-file")
        .assert()
        .success()
        .stdout(predicate::str::contains("dispatched: 3"));

    let log = std::fs::read_to_string(data.path().join("logs").join("tracereplay.log")).unwrap();
    assert!(log.contains("Replay finished"));
}

#[test]
fn test_convert_to_monitor() {
    let trace = TraceFile::jsonl(&[
        OperationRecord::new(7.25, "SET", "a").with_arguments(vec!["1".into()]),
        OperationRecord::new(7.5, "GET", "a").with_originator("0 10.0.0.2:9"),
    ]);
    let out = trace.dir.path().join("trace.log");

    tracereplay()
        .args(["convert", "--format", "jsonl", "--to", "monitor", "--granularity", "2"])
        .arg("--input")
        .arg(&trace.path)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 2 records"));

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "7.25 [0 unknown] \"SET\" \"a\" \"1\"\n7.50 [0 10.0.0.2:9] \"GET\" \"a\"\n"
    );
}

#[test]
fn test_generate_is_reproducible_with_seed() {
    let records: Vec<OperationRecord> = (0..40)
        .map(|i| {
            let op = if i % 4 == 0 { "SET" } else { "GET" };
            OperationRecord::new(i as f64 * 0.1, op, format!("k{}", i % 5))
        })
        .collect();
    let trace = TraceFile::jsonl(&records);

    let generate = |name: &str| {
        let out = trace.dir.path().join(name);
        tracereplay()
            .args(["generate", "--duration", "8", "--strategy", "stretch", "--seed", "99"])
            .arg("--input")
            .arg(&trace.path)
            .arg("--output")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("seed 99"))
            .stdout(predicate::str::contains("40 source records"));
        std::fs::read_to_string(out).unwrap()
    };

    let first = generate("a.log");
    assert!(!first.is_empty());
    assert_eq!(first, generate("b.log"));

    // The synthetic trace replays like a capture
    let synthetic = trace.dir.path().join("a.log");
    tracereplay()
        .args(["run", "--backend", "noop", "--lanes", "2", "--trace"])
        .arg(&synthetic)
        .assert()
        .success()
        .stdout(predicate::str::contains("malformed: 0"));
}

#[test]
fn test_generate_rejects_unknown_strategy() {
    let trace = TraceFile::jsonl(&[
        OperationRecord::new(0.0, "SET", "a"),
        OperationRecord::new(1.0, "GET", "a"),
    ]);
    tracereplay()
        .args(["generate", "--strategy", "shuffle", "--input"])
        .arg(&trace.path)
        .arg("--output")
        .arg(trace.dir.path().join("out.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("shuffle"));
}

#[test]
fn test_analyze_text_and_json() {
    let trace = TraceFile::monitor(&[
        monitor_line(1.0, "SET", &["a", "1"]),
        monitor_line(1.5, "GET", &["a"]),
        monitor_line(2.0, "GET", &["a"]),
        "garbage".to_string(),
        monitor_line(3.0, "GET", &["a"]),
    ]);

    tracereplay()
        .arg("analyze")
        .arg(&trace.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("operations: 4  malformed: 1"))
        .stdout(predicate::str::contains("throughput: 2.00 ops/s"))
        .stdout(predicate::str::contains("GET"));

    let output = tracereplay()
        .args(["analyze", "--json"])
        .arg(&trace.path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let analyzed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stats = &analyzed[0]["stats"];
    assert_eq!(stats["operations"], 4);
    assert_eq!(stats["duration_secs"], 2.0);
    assert_eq!(stats["commands"][0]["operation"], "GET");
    assert_eq!(stats["commands"][0]["count"], 3);
    assert_eq!(stats["inter_arrival"]["count"], 3);
}
