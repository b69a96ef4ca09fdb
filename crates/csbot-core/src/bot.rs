//! The bot: owner of plugins, dispatch tables, queue and stores.

use std::sync::{Arc, Weak};

use tracing::{debug, error, info, warn};

use crate::command::CommandEvent;
use crate::config::{ConfigStore, DEFAULTS};
use crate::dispatcher::{DispatchStats, Dispatcher, run_handler};
use crate::error::{CommandError, LifecycleResult, StoreResult};
use crate::event::{Event, EventPayload};
use crate::manager::PluginManager;
use crate::plugin::PluginCatalog;
use crate::store::KeyValueStore;
use crate::transport::BoxedTransport;

/// Option value meaning "every discovered plugin" in the `plugins` list.
pub const ALL_PLUGINS: &str = "*";

// =============================================================================
// BotBuilder
// =============================================================================

/// Assembles a [`Bot`].
///
/// ```rust,ignore
/// let bot = Bot::builder(transport)
///     .config(config)
///     .store(KeyValueStore::load("csbot.data.json").await?)
///     .catalog(PluginCatalog::discover()?)
///     .build();
/// bot.load_enabled().await;
/// ```
pub struct BotBuilder {
    transport: BoxedTransport,
    config: ConfigStore,
    store: KeyValueStore,
    catalog: PluginCatalog,
}

impl BotBuilder {
    /// Sets the option store. Defaults to [`ConfigStore::with_defaults`].
    pub fn config(mut self, config: ConfigStore) -> Self {
        self.config = config;
        self
    }

    /// Sets the key-value store. Defaults to an in-memory store.
    pub fn store(mut self, store: KeyValueStore) -> Self {
        self.store = store;
        self
    }

    /// Sets the discoverable plugins. Defaults to none.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn build(self) -> Arc<Bot> {
        let nickname = setting(&self.config, "nickname");
        let command_prefix = setting(&self.config, "command_prefix");
        let channels = self
            .config
            .default_list("channels")
            .unwrap_or_else(|_| vec![setting(&self.config, "channels")]);

        Arc::new_cyclic(|me| Bot {
            me: me.clone(),
            nickname,
            command_prefix,
            channels,
            config: self.config,
            store: self.store,
            plugins: PluginManager::new(self.catalog),
            dispatcher: Dispatcher::new(),
            transport: self.transport,
        })
    }
}

/// A default-section option, falling back to the built-in default.
fn setting(config: &ConfigStore, key: &str) -> String {
    config
        .default_value(key)
        .ok()
        .or_else(|| DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v))
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Bot
// =============================================================================

/// The process-wide owner of the plugin set, dispatch tables, event queue and
/// both stores.
///
/// Every inbound notification becomes an [`Event`] that is run through the
/// bot's built-in handler and then through the plugin hooks for its kind:
///
/// - `signed_on` joins the configured channels;
/// - `message` is parsed for a command, which is posted as a `command` event;
/// - `command` is routed to the single handler owning the command name.
pub struct Bot {
    me: Weak<Bot>,
    nickname: String,
    command_prefix: String,
    channels: Vec<String>,
    config: ConfigStore,
    store: KeyValueStore,
    plugins: PluginManager,
    dispatcher: Dispatcher,
    transport: BoxedTransport,
}

impl Bot {
    pub fn builder(transport: BoxedTransport) -> BotBuilder {
        BotBuilder {
            transport,
            config: ConfigStore::with_defaults(),
            store: KeyValueStore::in_memory(),
            catalog: PluginCatalog::empty(),
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Wraps a transport notification in an [`Event`] and posts it.
    pub async fn notify(&self, payload: EventPayload) {
        self.post(Event::new(payload, self.transport.clone())).await;
    }

    /// Posts an event.
    ///
    /// If no drain is running, this call drains the queue before returning;
    /// otherwise the event is queued behind the current drain.
    pub async fn post(&self, event: Event) {
        self.dispatcher.dispatch(event, |event| self.process(event)).await;
    }

    async fn process(&self, event: Event) {
        self.handle_builtin(&event).await;
        let hooks = self.plugins.hooks_for(event.kind());
        self.dispatcher.fire(&event, hooks).await;
    }

    async fn handle_builtin(&self, event: &Event) {
        match event.payload() {
            EventPayload::Connected => info!("Connected"),
            EventPayload::Disconnected { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("unknown"), "Disconnected");
            }
            EventPayload::SignedOn => {
                info!(nickname = %self.nickname, "Signed on");
                for channel in &self.channels {
                    if let Err(e) = self.transport.join(channel).await {
                        error!(channel = %channel, error = %e, "Failed to join channel");
                    }
                }
            }
            EventPayload::Joined { channel } => info!(channel = %channel, "Joined channel"),
            EventPayload::Left { channel } => info!(channel = %channel, "Left channel"),
            EventPayload::Message(message) => {
                if let Some(cmd) = CommandEvent::from_message(
                    message,
                    &self.command_prefix,
                    &self.nickname,
                    self.transport.clone(),
                ) {
                    debug!(command = %cmd.command(), user = %cmd.user(), "Parsed command");
                    self.dispatcher.push_within_drain(Event::new(
                        EventPayload::Command(cmd),
                        self.transport.clone(),
                    ));
                }
            }
            EventPayload::Command(cmd) => self.route(cmd).await,
            _ => {}
        }
    }

    async fn route(&self, cmd: &CommandEvent) {
        let Some(handler) = self.plugins.command(cmd.command()) else {
            if let Err(e) = cmd.error(CommandError::NotFound(cmd.command().to_string())).await {
                warn!(error = %e, "Failed to report unknown command");
            }
            return;
        };

        if let Err(failure) = run_handler(handler(cmd.clone())).await {
            error!(
                command = %cmd.command(),
                user = %cmd.user(),
                error = %failure,
                "Command handler failed"
            );
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    pub async fn load_plugin(&self, name: &str) -> LifecycleResult<()> {
        self.plugins.load(name, &self.me).await
    }

    pub async fn unload_plugin(&self, name: &str) -> LifecycleResult<()> {
        self.plugins.unload(name).await
    }

    pub async fn reload_plugin(&self, name: &str) -> LifecycleResult<()> {
        self.plugins.reload(name, &self.me).await
    }

    /// Names of loaded plugins, in load order.
    pub fn loaded_plugins(&self) -> Vec<String> {
        self.plugins.loaded()
    }

    /// Loads the plugins named by the `plugins` option (`*` for all).
    ///
    /// Failures are logged and skipped. Returns the plugins that loaded.
    pub async fn load_enabled(&self) -> Vec<String> {
        let requested = self
            .config
            .default_list("plugins")
            .unwrap_or_else(|_| vec![ALL_PLUGINS.to_string()]);
        let names = if requested.iter().any(|name| name == ALL_PLUGINS) {
            self.plugins.available()
        } else {
            requested
        };

        let mut loaded = Vec::new();
        for name in names {
            match self.load_plugin(&name).await {
                Ok(()) => loaded.push(name.to_lowercase()),
                Err(e) => warn!(plugin = %name, error = %e, "Failed to load plugin"),
            }
        }
        loaded
    }

    /// Unloads every plugin in reverse load order, then saves the key-value
    /// store.
    pub async fn shutdown(&self) -> StoreResult<()> {
        info!("Shutting down");
        self.plugins.shutdown().await;
        self.store.save().await
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("nickname", &self.nickname)
            .field("plugins", &self.plugins)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
