//! # csbot Core
//!
//! The plugin event/command dispatch core of csbot.
//!
//! ## Components
//!
//! - **Config Resolver** ([`ConfigStore`]): two-level option lookup, a
//!   plugin's section first, then the default section.
//! - **Key-Value Store** ([`KeyValueStore`]): persisted per-plugin strings.
//! - **Feature Registry** ([`PluginFeatures`], [`FeatureRegistry`]): the
//!   commands and hooks a plugin type declares, bound to each instance.
//! - **Plugin Lifecycle Manager** ([`PluginManager`]): discovery, load,
//!   unload and reload without corrupting the shared dispatch tables.
//! - **Event Dispatcher** ([`Dispatcher`]): reentrancy-safe FIFO queue with a
//!   single active drain.
//! - **Command Router** ([`CommandEvent`], owned by [`Bot`]): turns chat
//!   lines into commands and routes each to its unique handler.
//!
//! ## Event flow
//!
//! ```text
//! transport ──notify()──► Bot ──post()──► Dispatcher queue
//!                                              │ drain
//!                                              ▼
//!                          built-in handler, then plugin hooks
//!                          (load order, then declaration order)
//!                                              │
//!                     message ──parse──► command event ──route──► handler
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use csbot_core::prelude::*;
//!
//! let bot = Bot::builder(transport)
//!     .catalog(PluginCatalog::discover()?)
//!     .build();
//! bot.load_enabled().await;
//! bot.notify(EventPayload::SignedOn).await;
//! ```

pub mod bot;
pub mod command;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod features;
pub mod manager;
pub mod plugin;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bot::{Bot, BotBuilder};
pub use command::{CommandEvent, ParsedCommand, parse_command, shell_split};
pub use config::ConfigStore;
pub use correlation::{Cancelled, CorrelationTable, Pending};
pub use dispatcher::{DispatchStats, Dispatcher, HandlerFailure};
pub use error::{
    BoxError, CommandError, ConfigError, ConfigResult, HandlerResult, LifecycleError,
    LifecycleResult, RegistryError, RegistryResult, StoreError, StoreResult, TransportError,
    TransportResult,
};
pub use event::{Event, EventKind, EventPayload, MessageData};
pub use features::{CommandHandler, FeatureRegistry, HookHandler, PluginFeatures};
pub use manager::{PluginManager, TableSnapshot};
pub use plugin::{Plugin, PluginCatalog, PluginContext, PluginDescriptor, PluginSource};
pub use store::KeyValueStore;
pub use transport::{BoxedTransport, Transport};

#[doc(hidden)]
pub mod __private {
    pub use linkme;
}

/// Prelude for writing plugins.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::register_plugin;
    pub use crate::{
        Bot, BoxError, CommandEvent, ConfigStore, CorrelationTable, Event, EventKind,
        EventPayload, HandlerResult, Plugin, PluginCatalog, PluginContext, PluginFeatures,
        RegistryResult,
    };
}
