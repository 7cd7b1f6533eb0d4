//! Execution strategies: the backend-specific side of a replay.

pub mod error;
pub mod http;
pub mod mock;
pub mod noop;
pub mod redis;
pub mod strategy;

pub use error::BackendError;
pub use http::HttpStrategy;
pub use noop::NoopStrategy;
pub use self::redis::RedisStrategy;
pub use strategy::{BackendConfig, BackendKind, ExecutionStrategy, StrategyFactory};
