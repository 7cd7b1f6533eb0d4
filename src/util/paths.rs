//! Locations under the tracereplay data directory.
//!
//! ```text
//! ~/.tracereplay/
//!   config.toml
//!   logs/tracereplay.log
//! ```
//!
//! `--data-dir` moves the whole tree.

use std::path::PathBuf;
use std::sync::OnceLock;

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Root every path below at `root` instead of `~/.tracereplay`.
///
/// Only the first call takes effect. Returns `false` if the root was
/// already fixed.
pub fn init_data_dir(root: PathBuf) -> bool {
    match DATA_DIR.set(root) {
        Ok(()) => true,
        Err(rejected) => {
            tracing::debug!(
                rejected = %rejected.display(),
                current = %data_dir().display(),
                "Data directory already set"
            );
            false
        }
    }
}

fn home_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".tracereplay"),
        None => PathBuf::from(".tracereplay"),
    }
}

pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(home_data_dir)
}

/// Config read by `run` when `--config` is not given
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Log file used by a bare `--log-file`
pub fn log_file_path() -> PathBuf {
    logs_dir().join("tracereplay.log")
}
