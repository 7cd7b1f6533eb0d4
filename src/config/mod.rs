mod settings;

pub use settings::{
    write_example_config, Config, ConfigError, Overrides, ReplaySettings, TomlBackendConfig,
    TomlConfig, TomlReplayConfig, EXAMPLE_CONFIG,
};
