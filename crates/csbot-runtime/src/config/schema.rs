//! Configuration schema definitions.
//!
//! The file layout mirrors the option store of `csbot-core`:
//!
//! ```toml
//! [default]
//! nickname = "csyorkbot"
//! channels = ["#cs-york-dev", "#cs-york"]
//! plugins = "example, auth, plugins"
//!
//! [plugins.example]
//! greeting = "hello"
//!
//! [logging]
//! level = "debug"
//! filters = { csbot_core = "trace" }
//!
//! [storage]
//! path = "csbot.data.json"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use csbot_core::ConfigStore;
use csbot_core::config::DEFAULTS;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsbotConfig {
    /// The default section, consulted after a plugin's own section.
    pub default: BTreeMap<String, Scalar>,

    /// Per-plugin sections, keyed by plugin name.
    pub plugins: BTreeMap<String, BTreeMap<String, Scalar>>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Key-value store configuration.
    pub storage: StorageConfig,
}

impl Default for CsbotConfig {
    fn default() -> Self {
        Self {
            default: DEFAULTS
                .iter()
                .map(|(key, value)| (key.to_string(), Scalar::Str(value.to_string())))
                .collect(),
            plugins: BTreeMap::new(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl CsbotConfig {
    /// Flattens the option sections into the store plugins read from.
    pub fn to_store(&self) -> ConfigStore {
        let mut store = ConfigStore::with_defaults();
        for (key, value) in &self.default {
            store.set_default(key.as_str(), value.to_string());
        }
        for (plugin, section) in &self.plugins {
            for (key, value) in section {
                store.set(plugin, key.as_str(), value.to_string());
            }
        }
        store
    }
}

/// An option value as written in the file.
///
/// Options are always handed to plugins as strings; lists are joined with
/// spaces so [`ConfigStore::get_list`] splits them back apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Scalar>),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global level; `RUST_LOG` overrides it when set.
    pub level: LogLevel,

    /// Output format.
    pub format: LogFormat,

    /// Output destination.
    pub output: LogOutput,

    /// Log file used when `output = "file"`.
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `csbot_core = "trace"`.
    pub filters: BTreeMap<String, LogLevel>,

    /// Which span lifecycle events to log.
    pub span_events: SpanEventConfig,

    /// Include thread IDs.
    pub thread_ids: bool,

    /// Include source file and line.
    pub file_location: bool,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Span lifecycle events to log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

// =============================================================================
// Storage
// =============================================================================

/// Key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file the store is loaded from and saved to.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("csbot.data.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_render_as_option_strings() {
        assert_eq!(Scalar::Int(6667).to_string(), "6667");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
        let channels = Scalar::List(vec![
            Scalar::Str("#cs-york".into()),
            Scalar::Str("#cs-york-dev".into()),
        ]);
        assert_eq!(channels.to_string(), "#cs-york #cs-york-dev");
    }

    #[test]
    fn test_store_keeps_documented_defaults() {
        let mut config = CsbotConfig::default();
        config
            .plugins
            .entry("Example".into())
            .or_default()
            .insert("port".into(), Scalar::Int(7000));

        let store = config.to_store();
        assert_eq!(store.lookup("example", "port").unwrap(), "7000");
        assert_eq!(store.lookup("auth", "port").unwrap(), "6667");
        assert_eq!(store.default_value("nickname").unwrap(), "csyorkbot");
    }
}
