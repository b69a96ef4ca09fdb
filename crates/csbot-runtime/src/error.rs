//! Runtime error types.

use csbot_core::{LifecycleError, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or stopping the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The key-value store could not be loaded or saved.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Plugin discovery failed.
    #[error("Plugin error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
