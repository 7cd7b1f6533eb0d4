//! HTTP backend against a local axum server

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use tracereplay::backend::{ExecutionStrategy, HttpStrategy, StrategyFactory};
use tracereplay::{
    BackendConfig, BackendError, BackendKind, OperationRecord, ReplayOptions, Replayer,
};

#[derive(Clone, Default)]
struct Hits {
    items: Arc<AtomicUsize>,
    bodies: Arc<parking_lot::Mutex<Vec<String>>>,
}

async fn get_item(State(hits): State<Hits>, Path(key): Path<String>) -> StatusCode {
    hits.items.fetch_add(1, Ordering::SeqCst);
    if key == "missing" {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

async fn put_item(State(hits): State<Hits>, Path(_key): Path<String>, body: String) -> StatusCode {
    hits.bodies.lock().push(body);
    StatusCode::CREATED
}

/// Start a fixture server on an ephemeral port
async fn start_server() -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/items/{key}", get(get_item).put(put_item))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn record(op: &str, target: &str) -> OperationRecord {
    OperationRecord::new(0.0, op, target)
}

#[tokio::test]
async fn test_http_strategy_maps_status_codes() {
    let (addr, hits) = start_server().await;
    let mut strategy =
        HttpStrategy::new(&format!("http://{addr}"), std::time::Duration::from_secs(2), true)
            .unwrap();
    strategy.connect().await.unwrap();

    strategy.execute(&record("GET", "/items/a")).await.unwrap();
    strategy
        .execute(&record("put", "items/b").with_arguments(vec!["payload".into()]))
        .await
        .unwrap();

    let err = strategy
        .execute(&record("GET", "/items/missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::HttpStatus { status: 404, .. }));

    let err = strategy.execute(&record("HMSET", "/items/a")).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidArguments { .. }));

    assert_eq!(hits.items.load(Ordering::SeqCst), 2);
    assert_eq!(hits.bodies.lock().clone(), vec!["payload".to_string()]);
}

#[tokio::test]
async fn test_http_connect_fails_without_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = BackendConfig::new(BackendKind::Http)
        .with_url(format!("http://{addr}"))
        .with_timeout(500);
    let mut strategy = config.create(0).unwrap();
    assert!(matches!(
        strategy.connect().await,
        Err(BackendError::Connection(_))
    ));
}

#[tokio::test]
async fn test_replay_over_http() {
    let (addr, hits) = start_server().await;
    let factory = BackendConfig::new(BackendKind::Http).with_url(format!("http://{addr}"));

    let entries = vec![
        Ok(OperationRecord::new(1.0, "GET", "/items/a")),
        Ok(OperationRecord::new(1.01, "GET", "/items/missing")),
        Ok(OperationRecord::new(1.02, "PUT", "/items/c").with_arguments(vec!["v".into()])),
        Ok(OperationRecord::new(1.03, "GET", "/items/d")),
    ];

    let report = Replayer::new(ReplayOptions::default().with_lanes(2), Arc::new(factory))
        .run(entries)
        .await
        .unwrap();

    assert_eq!(report.backend, BackendKind::Http);
    assert_eq!(report.outcome.succeeded, 3);
    assert_eq!(report.outcome.failed, 1);
    assert_eq!(hits.items.load(Ordering::SeqCst), 3);
    assert_eq!(hits.bodies.lock().len(), 1);
}
