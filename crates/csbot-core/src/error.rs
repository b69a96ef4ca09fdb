//! Error types for the csbot core.
//!
//! Each concern owns its own enum so callers can match on exactly the failures
//! they are able to recover from:
//!
//! - [`RegistryError`]: failures while a plugin type declares its features.
//! - [`LifecycleError`]: discover / load / unload / reload failures.
//! - [`CommandError`]: command routing and argument tokenization.
//! - [`ConfigError`]: option lookup.
//! - [`StoreError`]: key-value persistence.
//! - [`TransportError`]: outbound actions issued through the transport.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by hook and command handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by hook and command handlers.
pub type HandlerResult = Result<(), BoxError>;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors raised while a plugin type declares its commands and hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The same command name was declared twice on one plugin type.
    #[error("command '{command}' declared twice by plugin '{plugin}'")]
    DuplicateCommand {
        /// Plugin that declared the command.
        plugin: String,
        /// The duplicated command name.
        command: String,
    },

    /// A command was declared with an empty or whitespace-containing name.
    #[error("plugin '{plugin}' declared an invalid command name '{command}'")]
    InvalidCommandName {
        /// Plugin that declared the command.
        plugin: String,
        /// The rejected name.
        command: String,
    },

    /// The plugin definition could not be built.
    #[error("plugin '{plugin}' failed to build its definition: {reason}")]
    Definition {
        /// Plugin being defined.
        plugin: String,
        /// Why the definition failed.
        reason: String,
    },
}

/// Result type for feature declaration.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// Errors from plugin lifecycle operations.
///
/// Every lifecycle operation that returns one of these leaves the bot in the
/// state it had before the operation started, with one exception: when the
/// replacement instance of a reload fails [`LifecycleError::SetupFailed`], the
/// old instance has already been torn down and the plugin ends up unloaded.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Two discovered plugin types share a case-normalized name.
    #[error("duplicate plugin name: {0}")]
    DuplicateName(String),

    /// No discovered plugin type has this name.
    #[error("plugin '{0}' not found")]
    NotFound(String),

    /// The plugin is already loaded.
    #[error("plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// The plugin is not loaded.
    #[error("plugin '{0}' is not loaded")]
    NotLoaded(String),

    /// A command of the plugin is already owned by another loaded plugin.
    #[error("command '{command}' of plugin '{plugin}' is already registered by '{owner}'")]
    CommandCollision {
        /// Plugin being loaded.
        plugin: String,
        /// Colliding command name.
        command: String,
        /// Plugin currently owning the command.
        owner: String,
    },

    /// The plugin definition is invalid.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Refreshing the plugin definition during reload failed.
    #[error("failed to refresh plugin '{plugin}': {source}")]
    RefreshFailed {
        /// Plugin being reloaded.
        plugin: String,
        /// Underlying definition failure.
        source: RegistryError,
    },

    /// The plugin's setup callback failed; the load was rolled back.
    ///
    /// During a reload this leaves the plugin unloaded.
    #[error("setup of plugin '{plugin}' failed: {reason}")]
    SetupFailed {
        /// Plugin being loaded.
        plugin: String,
        /// Error reported by the setup callback.
        reason: String,
    },
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

// =============================================================================
// Command Errors
// =============================================================================

/// Errors produced while routing or parsing a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No loaded plugin registered the command.
    #[error("Command \"{0}\" not found")]
    NotFound(String),

    /// The argument tail has an unterminated quotation.
    #[error("Unmatched quotation marks")]
    UnmatchedQuote,
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors from configuration lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither the plugin section nor the default section defines the key.
    #[error("{0} is not a valid option.")]
    UnknownOption(String),

    /// The value exists but does not parse as the requested type.
    #[error("option '{key}' has invalid value '{value}': expected {expected}")]
    InvalidValue {
        /// The option key.
        key: String,
        /// The raw string value.
        value: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// The plugin context outlived its bot.
    #[error("bot is no longer running")]
    Detached,
}

/// Result type for configuration lookup.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not defined for the plugin.
    #[error("{key} is not defined for plugin {plugin}")]
    NotDefined {
        /// Plugin namespace.
        plugin: String,
        /// Missing key.
        key: String,
    },

    /// Reading or writing the backing file failed.
    #[error("failed to access store file {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file is not valid JSON.
    #[error("failed to parse store file {path}: {source}")]
    Parse {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The plugin context outlived its bot.
    #[error("bot is no longer running")]
    Detached,
}

/// Result type for key-value store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by the transport when issuing outbound actions.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection is not established.
    #[error("not connected")]
    NotConnected,

    /// The outbound action failed.
    #[error("failed to send: {0}")]
    SendFailed(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::SendFailed(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
