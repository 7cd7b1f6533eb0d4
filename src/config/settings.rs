use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::backend::{BackendConfig, BackendError, BackendKind};
use crate::replay::{LaneFailurePolicy, ReplayOptions, ReportMode};
use crate::trace::{TraceError, TraceFormat};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config already exists at {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("replay.lanes must be at least 1")]
    NoLanes,

    #[error("no trace given (set replay.trace or pass --trace)")]
    MissingTrace,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Replay settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    /// Trace file to replay
    pub trace: Option<PathBuf>,
    pub format: TraceFormat,
    /// Number of concurrent lanes
    pub lanes: usize,
    pub on_lane_failure: LaneFailurePolicy,
    pub report: ReportMode,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        let options = ReplayOptions::default();
        Self {
            trace: None,
            format: TraceFormat::default(),
            lanes: options.lanes,
            on_lane_failure: options.on_lane_failure,
            report: options.report_mode,
        }
    }
}

impl ReplaySettings {
    pub fn options(&self) -> ReplayOptions {
        ReplayOptions {
            lanes: self.lanes,
            on_lane_failure: self.on_lane_failure,
            report_mode: self.report,
        }
    }

    /// The trace path, which must be set by now
    pub fn trace_path(&self) -> Result<&Path, ConfigError> {
        self.trace.as_deref().ok_or(ConfigError::MissingTrace)
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub replay: ReplaySettings,
    pub backend: BackendConfig,
}

/// TOML representation of the `[replay]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlReplayConfig {
    pub trace: Option<PathBuf>,
    pub format: Option<String>,
    pub lanes: Option<usize>,
    pub on_lane_failure: Option<String>,
    pub report: Option<String>,
}

/// TOML representation of the `[backend]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlBackendConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub check_reachable: Option<bool>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub replay: Option<TomlReplayConfig>,
    pub backend: Option<TomlBackendConfig>,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub trace: Option<PathBuf>,
    pub format: Option<String>,
    pub lanes: Option<usize>,
    pub backend: Option<String>,
    pub on_lane_failure: Option<String>,
    pub counting: bool,
}

fn parse_policy(value: &str) -> Result<LaneFailurePolicy, ConfigError> {
    LaneFailurePolicy::parse(value).ok_or_else(|| ConfigError::InvalidValue {
        field: "replay.on_lane_failure",
        value: value.to_string(),
    })
}

fn parse_report(value: &str) -> Result<ReportMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "latency" => Ok(ReportMode::Latency),
        "counting" => Ok(ReportMode::Counting),
        _ => Err(ConfigError::InvalidValue {
            field: "replay.report",
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from `path`, merging it onto the defaults.
    ///
    /// Unlike a missing default config, an unreadable or invalid file is an
    /// error. A relative `replay.trace` is resolved against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let toml_config: TomlConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Config::default();
        config.merge(toml_config)?;

        if let (Some(trace), Some(dir)) = (config.replay.trace.as_mut(), path.parent()) {
            if trace.is_relative() {
                *trace = dir.join(&*trace);
            }
        }

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load an explicit config, or the default one if it exists, or defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = config_path();
        if default_path.exists() {
            Self::load(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "No config file, using defaults");
            Ok(Config::default())
        }
    }

    /// Parse TOML text without touching the filesystem.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        let mut config = Config::default();
        config.merge(toml_config)?;
        Ok(config)
    }

    fn merge(&mut self, toml_config: TomlConfig) -> Result<(), ConfigError> {
        if let Some(replay) = toml_config.replay {
            if let Some(trace) = replay.trace {
                self.replay.trace = Some(trace);
            }
            if let Some(format) = replay.format {
                self.replay.format = TraceFormat::parse(&format)?;
            }
            if let Some(lanes) = replay.lanes {
                self.replay.lanes = lanes;
            }
            if let Some(policy) = replay.on_lane_failure {
                self.replay.on_lane_failure = parse_policy(&policy)?;
            }
            if let Some(report) = replay.report {
                self.replay.report = parse_report(&report)?;
            }
        }

        if let Some(backend) = toml_config.backend {
            if let Some(kind) = backend.kind {
                self.backend.kind = BackendKind::parse(&kind)?;
            }
            if let Some(host) = backend.host {
                self.backend.host = host;
            }
            if let Some(port) = backend.port {
                self.backend.port = port;
            }
            if let Some(db) = backend.db {
                self.backend.db = db;
            }
            if backend.password.is_some() {
                self.backend.password = backend.password;
            }
            if let Some(url) = backend.url {
                self.backend.url = url;
            }
            if let Some(timeout_ms) = backend.timeout_ms {
                self.backend.timeout_ms = timeout_ms;
            }
            if let Some(check) = backend.check_reachable {
                self.backend.check_reachable = check;
            }
        }

        self.validate()
    }

    /// Apply command-line overrides, then re-validate.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(trace) = &overrides.trace {
            self.replay.trace = Some(trace.clone());
        }
        if let Some(format) = &overrides.format {
            self.replay.format = TraceFormat::parse(format)?;
        }
        if let Some(lanes) = overrides.lanes {
            self.replay.lanes = lanes;
        }
        if let Some(backend) = &overrides.backend {
            self.backend.kind = BackendKind::parse(backend)?;
        }
        if let Some(policy) = &overrides.on_lane_failure {
            self.replay.on_lane_failure = parse_policy(policy)?;
        }
        if overrides.counting {
            self.replay.report = ReportMode::Counting;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay.lanes == 0 {
            return Err(ConfigError::NoLanes);
        }
        if self.backend.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backend.timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Write the bundled example config to `path` (default: `~/.tracereplay/config.toml`).
pub fn write_example_config(path: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    fs::write(&path, EXAMPLE_CONFIG).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Wrote example config");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn example_config_parses_to_defaults() {
        let config = Config::from_toml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_merges_onto_defaults() {
        let config = Config::from_toml_str(
            r#"
            [replay]
            lanes = 8
            on_lane_failure = "skip"

            [backend]
            type = "http"
            url = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.replay.lanes, 8);
        assert_eq!(config.replay.on_lane_failure, LaneFailurePolicy::Skip);
        assert_eq!(config.replay.format, TraceFormat::Monitor);
        assert_eq!(config.backend.kind, BackendKind::Http);
        assert_eq!(config.backend.url, "http://localhost:9000");
        assert_eq!(config.backend.port, 6379);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_toml_str("[replay]\nlanes = 0\n"),
            Err(ConfigError::NoLanes)
        ));
        assert!(matches!(
            Config::from_toml_str("[backend]\ntype = \"memcached\"\n"),
            Err(ConfigError::Backend(BackendError::UnknownBackend(_)))
        ));
        assert!(matches!(
            Config::from_toml_str("[replay]\nformat = \"csv\"\n"),
            Err(ConfigError::Trace(TraceError::UnknownFormat(_)))
        ));
        assert!(matches!(
            Config::from_toml_str("[replay]\non_lane_failure = \"retry\"\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::from_toml_str("[replay]\nlanes = \"four\"\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn load_resolves_trace_relative_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        fs::write(&path, "[replay]\ntrace = \"traces/a.log\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.replay.trace.as_deref(),
            Some(dir.path().join("traces/a.log").as_path())
        );
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config::default();
        config
            .apply_overrides(&Overrides {
                trace: Some(PathBuf::from("t.jsonl")),
                format: Some("jsonl".into()),
                lanes: Some(2),
                backend: Some("noop".into()),
                on_lane_failure: Some("orphan".into()),
                counting: true,
            })
            .unwrap();

        assert_eq!(config.replay.trace_path().unwrap(), Path::new("t.jsonl"));
        assert_eq!(config.replay.format, TraceFormat::Jsonl);
        assert_eq!(config.backend.kind, BackendKind::Noop);
        assert_eq!(config.replay.on_lane_failure, LaneFailurePolicy::Orphan);
        assert_eq!(config.replay.options().report_mode, ReportMode::Counting);

        let err = config
            .apply_overrides(&Overrides {
                lanes: Some(0),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoLanes));
    }

    #[test]
    fn missing_trace_is_reported() {
        assert!(matches!(
            Config::default().replay.trace_path(),
            Err(ConfigError::MissingTrace)
        ));
    }

    #[test]
    fn write_example_respects_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let written = write_example_config(Some(&path), false).unwrap();
        assert_eq!(fs::read_to_string(&written).unwrap(), EXAMPLE_CONFIG);

        assert!(matches!(
            write_example_config(Some(&path), false),
            Err(ConfigError::AlreadyExists(_))
        ));
        assert!(write_example_config(Some(&path), true).is_ok());
    }
}
