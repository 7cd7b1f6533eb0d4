//! Integration tests for tracereplay
//!
//! These tests run whole replays through lanes, backends and the CLI.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod http_backend;
pub mod replay_run;
