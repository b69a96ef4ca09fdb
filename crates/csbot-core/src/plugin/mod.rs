//! Plugin trait, per-instance context and discovery.
//!
//! A plugin is a type implementing [`Plugin`]. It declares its commands and
//! hooks once per type via [`Plugin::declare`]; every load creates a fresh
//! instance through [`Plugin::create`], so plugin-local state is reset on
//! reload.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use csbot_core::prelude::*;
//!
//! pub struct Hello { ctx: PluginContext }
//!
//! impl Hello {
//!     async fn hello(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
//!         cmd.reply(format!("hello, {}", cmd.nick())).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Hello {
//!     fn name() -> &'static str { "hello" }
//!
//!     fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
//!         features.command("hello", Self::hello)?;
//!         Ok(())
//!     }
//!
//!     fn create(ctx: PluginContext) -> Self { Self { ctx } }
//! }
//!
//! register_plugin!(HELLO: Hello);
//! ```

mod catalog;
mod descriptor;

use std::sync::{Arc, Weak};

use async_trait::async_trait;

pub use catalog::PluginCatalog;
pub use descriptor::{PLUGINS, PluginDescriptor, PluginInstance, PluginSource};

use crate::bot::Bot;
use crate::error::{BoxError, ConfigError, ConfigResult, RegistryResult, StoreError, StoreResult};
use crate::event::EventPayload;
use crate::features::PluginFeatures;

// =============================================================================
// Plugin
// =============================================================================

/// A plugin type.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// The plugin's name. Matched case-insensitively and stored lowercase.
    fn name() -> &'static str
    where
        Self: Sized;

    /// Declares the commands and hooks of this plugin type.
    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()>
    where
        Self: Sized;

    /// Creates a fresh instance bound to a bot.
    fn create(ctx: PluginContext) -> Self
    where
        Self: Sized;

    /// Runs after the instance's features are registered.
    ///
    /// An error rolls the load back.
    async fn setup(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs before the instance's features are removed.
    ///
    /// An error is logged; the unload still completes.
    async fn teardown(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

// =============================================================================
// PluginContext
// =============================================================================

/// A plugin instance's handle back to its bot.
///
/// Holds a weak reference, so an instance kept alive by a spawned task does
/// not keep the bot alive; lookups then fail with `Detached`.
#[derive(Clone, Debug)]
pub struct PluginContext {
    name: String,
    bot: Weak<Bot>,
}

impl PluginContext {
    pub(crate) fn new(name: impl Into<String>, bot: Weak<Bot>) -> Self {
        Self {
            name: name.into(),
            bot,
        }
    }

    /// A context with no bot behind it, for driving a plugin in isolation.
    pub fn detached(name: impl Into<String>) -> Self {
        Self::new(name, Weak::new())
    }

    /// The plugin's (lowercase) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bot this instance is loaded into, if it is still running.
    pub fn bot(&self) -> Option<Arc<Bot>> {
        self.bot.upgrade()
    }

    /// Looks up an option in the plugin's section, then the default section.
    pub fn cfg(&self, key: &str) -> ConfigResult<String> {
        let bot = self.bot().ok_or(ConfigError::Detached)?;
        bot.config().lookup(&self.name, key).map(str::to_string)
    }

    /// Looks up an option and parses it as an integer.
    pub fn cfg_int(&self, key: &str) -> ConfigResult<i64> {
        let bot = self.bot().ok_or(ConfigError::Detached)?;
        bot.config().get_int(&self.name, key)
    }

    /// Looks up an option and splits it into a list.
    pub fn cfg_list(&self, key: &str) -> ConfigResult<Vec<String>> {
        let bot = self.bot().ok_or(ConfigError::Detached)?;
        bot.config().get_list(&self.name, key)
    }

    /// Reads a value from the plugin's key-value namespace.
    pub fn kv_get(&self, key: &str) -> StoreResult<String> {
        let bot = self.bot().ok_or(StoreError::Detached)?;
        bot.store().get(&self.name, key)
    }

    /// Writes a value into the plugin's key-value namespace.
    pub fn kv_set(&self, key: &str, value: impl Into<String>) -> StoreResult<()> {
        let bot = self.bot().ok_or(StoreError::Detached)?;
        bot.store().set(&self.name, key, value);
        Ok(())
    }

    /// Posts an event to the bot's dispatcher.
    ///
    /// When called from a hook or command handler the event is appended to the
    /// running drain and processed after the current event.
    pub async fn post(&self, payload: EventPayload) {
        if let Some(bot) = self.bot() {
            bot.notify(payload).await;
        }
    }
}
