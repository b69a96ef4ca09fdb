//! csbot Runtime - configuration, logging and process orchestration.
//!
//! This crate provides:
//! - Layered configuration loading (`csbot.toml` plus `CSBOT_*` variables)
//! - Logging setup on top of `tracing-subscriber`
//! - [`BotRuntime`], which starts a [`Bot`](csbot_core::Bot), pumps
//!   transport notifications into it and shuts it down cleanly
//!
//! ```ignore
//! use csbot_runtime::{BotRuntime, inbound_channel};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, rx) = inbound_channel();
//!     let transport = MyTransport::connect(tx).await?;
//!
//!     let runtime = BotRuntime::builder().start(transport).await?;
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CsbotConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{
    BotRuntime, INBOUND_CAPACITY, Inbound, InboundSender, RuntimeBuilder, deliver, inbound_channel,
};

pub use csbot_core;
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{BotRuntime, CsbotConfig, inbound_channel};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
