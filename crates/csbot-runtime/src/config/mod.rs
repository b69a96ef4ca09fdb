//! Configuration loading for the csbot runtime.
//!
//! A TOML file plus `CSBOT_*` environment variables are layered over the
//! built-in defaults and flattened into the [`ConfigStore`](csbot_core::ConfigStore)
//! plugins read their options from.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    CsbotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, Scalar, SpanEventConfig,
    StorageConfig,
};

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<CsbotConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<std::path::Path>) -> ConfigResult<CsbotConfig> {
    ConfigLoader::new().file(path).load()
}
