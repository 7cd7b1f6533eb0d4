use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::error::BackendError;
use crate::backend::http::HttpStrategy;
use crate::backend::noop::NoopStrategy;
use crate::backend::redis::RedisStrategy;
use crate::trace::OperationRecord;

/// Backend identifier, selected by the `backend.type` config key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Redis,
    Http,
    /// Accepts every operation without I/O; measures pacing only
    Noop,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::Http => "http",
            BackendKind::Noop => "noop",
        }
    }

    /// Parse a backend key, failing on anything unknown.
    pub fn parse(s: &str) -> Result<Self, BackendError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "http" => Ok(BackendKind::Http),
            "noop" => Ok(BackendKind::Noop),
            other => Err(BackendError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues replayed operations against one backend connection.
///
/// Each lane owns exactly one instance. `connect` is called once before the
/// first `execute`; latency is measured by the caller around `execute`.
#[async_trait]
pub trait ExecutionStrategy: Send {
    fn backend(&self) -> BackendKind;

    /// Establish the backend connection.
    async fn connect(&mut self) -> Result<(), BackendError>;

    /// Perform one operation.
    async fn execute(&mut self, record: &OperationRecord) -> Result<(), BackendError>;
}

/// Builds one strategy instance per lane.
pub trait StrategyFactory: Send + Sync {
    fn backend(&self) -> BackendKind;

    fn create(&self, lane: usize) -> Result<Box<dyn ExecutionStrategy>, BackendError>;
}

/// Connection settings handed through to the selected strategy
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Redis logical database
    pub db: i64,
    pub password: Option<String>,
    /// Base URL for the http backend
    pub url: String,
    /// Per-operation timeout, also applied to connect
    pub timeout_ms: u64,
    /// Whether the http backend sends a GET to `url` during connect
    pub check_reachable: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Redis,
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
            url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 5_000,
            check_reachable: true,
        }
    }
}

impl BackendConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `redis://[:password@]host:port/db`
    pub fn redis_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl StrategyFactory for BackendConfig {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn create(&self, _lane: usize) -> Result<Box<dyn ExecutionStrategy>, BackendError> {
        let strategy: Box<dyn ExecutionStrategy> = match self.kind {
            BackendKind::Redis => Box::new(RedisStrategy::new(&self.redis_url(), self.timeout())?),
            BackendKind::Http => Box::new(HttpStrategy::new(&self.url, self.timeout(), self.check_reachable)?),
            BackendKind::Noop => Box::new(NoopStrategy),
        };
        Ok(strategy)
    }
}

/// Run `fut` under `timeout`, mapping expiry to [`BackendError::Timeout`].
pub(crate) async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, BackendError>
where
    F: std::future::Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
    }
}
