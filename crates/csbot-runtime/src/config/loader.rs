//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`csbot.{profile}.toml`)
//! 3. Main config file (`csbot.toml`, or `config.toml`)
//! 4. Environment variables (`CSBOT_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `CSBOT_` prefix with `__` between levels:
//!
//! - `CSBOT_DEFAULT__NICKNAME=testbot` → `default.nickname = "testbot"`
//! - `CSBOT_PLUGINS__AUTH__TIMEOUT=30` → `plugins.auth.timeout = 30`
//! - `CSBOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use csbot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./deploy/csbot.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CsbotConfig;

const FILE_NAMES: &[&str] = &["csbot.toml", "config.toml"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `CSBOT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("CSBOT_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for `csbot.toml`.
    ///
    /// Without any search path the current directory and the user config
    /// directory (`~/.config/csbot` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration on top of every other source.
    pub fn merge(mut self, config: CsbotConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<CsbotConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;
        let config: CsbotConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            plugin_sections = config.plugins.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CsbotConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with CSBOT_ prefix");
            figment = figment.merge(Env::prefixed("CSBOT_").ignore(&["profile"]).split("__"));
        }

        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("csbot"));
        }
        paths
    }

    /// Merges the first config file found, preceded by its profile variant.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for file_name in FILE_NAMES {
                let Some((stem, ext)) = file_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(&profile_path));
                }

                let base_path = search_path.join(file_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(&base_path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, Scalar};

    const SAMPLE: &str = r##"
[default]
nickname = "testbot"
port = 7000
channels = ["#cs-york", "#cs-york-dev"]

[plugins.Example]
greeting = "hello"

[logging]
level = "debug"
filters = { csbot_core = "trace" }

[storage]
path = "state/bot.json"
"##;

    #[test]
    fn test_defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .without_env()
            .search_path(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.storage.path, PathBuf::from("csbot.data.json"));
        assert_eq!(config.to_store().default_value("plugins").unwrap(), "*");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("csbot.toml"), SAMPLE).unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .search_path(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.default["port"], Scalar::Int(7000));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["csbot_core"], LogLevel::Trace);
        assert_eq!(config.storage.path, PathBuf::from("state/bot.json"));

        let store = config.to_store();
        assert_eq!(store.default_value("nickname").unwrap(), "testbot");
        assert_eq!(store.default_value("host").unwrap(), "irc.freenode.net");
        assert_eq!(store.lookup("example", "greeting").unwrap(), "hello");
        assert_eq!(
            store.default_list("channels").unwrap(),
            vec!["#cs-york", "#cs-york-dev"]
        );
    }

    #[test]
    fn test_profile_file_is_overridden_by_main_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("csbot.toml"), SAMPLE).unwrap();
        std::fs::write(
            dir.path().join("csbot.production.toml"),
            "[default]\nport = 1\nline_rate = 5\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .profile("prod")
            .search_path(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.default["port"], Scalar::Int(7000));
        assert_eq!(config.default["line_rate"], Scalar::Int(5));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/csbot.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csbot.ini");
        std::fs::write(&path, "nickname=testbot").unwrap();

        let err = ConfigLoader::new().without_env().file(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn test_env_overrides_plugin_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csbot.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        // SAFETY: no other test reads this variable
        unsafe {
            std::env::set_var("CSBOT_PLUGINS__ENVTEST__GREETING", "hi there");
        }
        let config = ConfigLoader::new().file(&path).load();
        unsafe {
            std::env::remove_var("CSBOT_PLUGINS__ENVTEST__GREETING");
        }

        let store = config.unwrap().to_store();
        assert_eq!(store.lookup("envtest", "greeting").unwrap(), "hi there");
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
