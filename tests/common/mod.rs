//! Shared test utilities for tracereplay
//!
//! - Trace file fixtures in temporary directories
//! - Builders for in-memory trace entries

pub mod traces;
