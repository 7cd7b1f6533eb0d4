use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::backend::error::BackendError;
use crate::backend::strategy::{BackendKind, ExecutionStrategy};
use crate::trace::OperationRecord;

/// Replays records as HTTP requests.
///
/// `operation_type` is the method, `target_key` the path relative to the base
/// URL (or an absolute URL), and the first argument, if any, the body.
pub struct HttpStrategy {
    client: reqwest::Client,
    base_url: String,
    check_reachable: bool,
}

impl HttpStrategy {
    pub fn new(base_url: &str, timeout: Duration, check_reachable: bool) -> Result<Self, BackendError> {
        if base_url.trim().is_empty() {
            return Err(BackendError::Config("http backend needs a url".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            check_reachable,
        })
    }

    fn url_for(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        format!("{}/{}", self.base_url, target.trim_start_matches('/'))
    }
}

#[async_trait]
impl ExecutionStrategy for HttpStrategy {
    fn backend(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn connect(&mut self) -> Result<(), BackendError> {
        if !self.check_reachable {
            return Ok(());
        }
        // Any response at all means the server is reachable.
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| BackendError::Connection(format!("{}: {e}", self.base_url)))?;
        Ok(())
    }

    async fn execute(&mut self, record: &OperationRecord) -> Result<(), BackendError> {
        let op = record.operation_type.to_ascii_uppercase();
        let method = match op.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            _ => return Err(BackendError::invalid(&op, "not an HTTP method")),
        };
        let url = self.url_for(&record.target_key);

        let mut request = self.client.request(method, &url);
        if let Some(body) = record.arguments.first() {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        // Drain the body so the measured latency covers the full exchange.
        response.bytes().await?;

        if !status.is_success() {
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                target: url,
            });
        }
        Ok(())
    }
}
