use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::backend::error::BackendError;
use crate::backend::strategy::{with_timeout, BackendKind, ExecutionStrategy};
use crate::trace::OperationRecord;

/// Replays MONITOR-style commands over one multiplexed connection.
pub struct RedisStrategy {
    client: redis::Client,
    timeout: Duration,
    conn: Option<MultiplexedConnection>,
}

impl RedisStrategy {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            timeout,
            conn: None,
        })
    }
}

#[async_trait]
impl ExecutionStrategy for RedisStrategy {
    fn backend(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn connect(&mut self) -> Result<(), BackendError> {
        let client = self.client.clone();
        let conn = with_timeout(self.timeout, async move {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let _: redis::Value = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, BackendError>(conn)
        })
        .await
        .map_err(|e| match e {
            BackendError::Redis(err) => BackendError::Connection(err.to_string()),
            other => other,
        })?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn execute(&mut self, record: &OperationRecord) -> Result<(), BackendError> {
        let conn = self.conn.as_mut().ok_or(BackendError::NotConnected)?;
        with_timeout(self.timeout, run_command(conn, record)).await
    }
}

async fn run_command(
    conn: &mut MultiplexedConnection,
    record: &OperationRecord,
) -> Result<(), BackendError> {
    let op = record.operation_type.as_str();
    let key = record.target_key.as_str();
    let args = record.arguments.as_slice();

    match op {
        "GET" => {
            let _: redis::Value = conn.get(key).await?;
        }
        "SET" => {
            let value = args
                .first()
                .ok_or_else(|| BackendError::invalid(op, "missing value"))?;
            let _: redis::Value = conn.set(key, value.as_str()).await?;
        }
        "HMSET" => {
            if args.is_empty() || args.len() % 2 != 0 {
                return Err(BackendError::invalid(
                    op,
                    format!("expected field/value pairs, got {} arguments", args.len()),
                ));
            }
            let pairs: Vec<(&str, &str)> = args
                .chunks_exact(2)
                .map(|pair| (pair[0].as_str(), pair[1].as_str()))
                .collect();
            let _: redis::Value = conn.hset_multiple(key, &pairs).await?;
        }
        "HGETALL" => {
            let _: redis::Value = conn.hgetall(key).await?;
        }
        "DEL" => {
            let _: redis::Value = conn.del(key).await?;
        }
        "ZADD" => {
            let [score, member, ..] = args else {
                return Err(BackendError::invalid(op, "expected score and member"));
            };
            let score: f64 = score
                .parse()
                .map_err(|_| BackendError::invalid(op, format!("score '{score}' is not a number")))?;
            let _: redis::Value = conn.zadd(key, member.as_str(), score).await?;
        }
        _ => {
            // Anything else goes out verbatim.
            let mut cmd = redis::cmd(op);
            if !key.is_empty() {
                cmd.arg(key);
            }
            for arg in args {
                cmd.arg(arg.as_str());
            }
            let _: redis::Value = cmd.query_async(conn).await?;
        }
    }
    Ok(())
}
