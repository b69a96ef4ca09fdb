//! Plugin lifecycle management.
//!
//! [`PluginManager`] owns every loaded plugin instance and the bot-wide
//! dispatch tables built from their feature registries:
//!
//! - the **command table**, mapping each command name to exactly one handler;
//! - the **hook lists**, one per [`EventKind`], in plugin load order and then
//!   declaration order within a plugin.
//!
//! Every lifecycle operation either completes or leaves the tables exactly as
//! they were. Operations are serialized by an async mutex so a reload can
//! never interleave with a concurrent load of the same plugin; the tables
//! themselves sit behind a short synchronous lock that is never held across
//! an `.await`.
//!
//! ```text
//! Unloaded ──load()──► Loaded ──unload()──► Unloaded
//!                        │
//!                        └──reload()── refresh ─► unload ─► load
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::bot::Bot;
use crate::error::{LifecycleError, LifecycleResult};
use crate::event::EventKind;
use crate::features::{CommandHandler, FeatureRegistry, HookHandler};
use crate::plugin::{Plugin, PluginCatalog, PluginContext, PluginDescriptor};

// =============================================================================
// Tables (internal)
// =============================================================================

struct LoadedPlugin {
    name: String,
    instance: Arc<dyn Plugin>,
}

struct CommandEntry {
    plugin: String,
    handler: CommandHandler,
}

struct HookEntry {
    plugin: String,
    handler: HookHandler,
}

#[derive(Default)]
struct Tables {
    plugins: Vec<LoadedPlugin>,
    commands: HashMap<String, CommandEntry>,
    hooks: HashMap<EventKind, Vec<HookEntry>>,
}

impl Tables {
    fn is_loaded(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name)
    }

    /// First command of `commands` already owned by a plugin other than
    /// `plugin`, with its owner.
    fn collision<'a>(
        &self,
        plugin: &str,
        mut commands: impl Iterator<Item = &'a str>,
    ) -> Option<(String, String)> {
        commands.find_map(|command| {
            self.commands
                .get(command)
                .filter(|entry| entry.plugin != plugin)
                .map(|entry| (command.to_string(), entry.plugin.clone()))
        })
    }

    /// Merges a registry. The caller has checked for collisions.
    fn merge(&mut self, name: &str, instance: Arc<dyn Plugin>, registry: &FeatureRegistry) {
        for (command, handler) in registry.commands() {
            self.commands.insert(
                command.clone(),
                CommandEntry {
                    plugin: name.to_string(),
                    handler: handler.clone(),
                },
            );
        }
        for (kind, handler) in registry.hooks() {
            self.hooks.entry(*kind).or_default().push(HookEntry {
                plugin: name.to_string(),
                handler: handler.clone(),
            });
        }
        self.plugins.push(LoadedPlugin {
            name: name.to_string(),
            instance,
        });
    }

    /// Removes every trace of `name`.
    fn purge(&mut self, name: &str) {
        self.commands.retain(|_, entry| entry.plugin != name);
        for hooks in self.hooks.values_mut() {
            hooks.retain(|entry| entry.plugin != name);
        }
        self.hooks.retain(|_, hooks| !hooks.is_empty());
        self.plugins.retain(|p| p.name != name);
    }
}

/// An owner-level view of the dispatch tables.
///
/// Two snapshots compare equal exactly when the same plugins own the same
/// commands and hook slots in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Loaded plugins in load order.
    pub plugins: Vec<String>,
    /// Command name to owning plugin.
    pub commands: BTreeMap<String, String>,
    /// Hook owners per kind, in firing order.
    pub hooks: BTreeMap<EventKind, Vec<String>>,
}

// =============================================================================
// PluginManager
// =============================================================================

/// Discovers, loads and unloads plugins and owns the dispatch tables.
pub struct PluginManager {
    catalog: RwLock<PluginCatalog>,
    tables: Mutex<Tables>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl PluginManager {
    /// Creates a manager over `catalog` with nothing loaded.
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            tables: Mutex::new(Tables::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Names of every discoverable plugin type.
    pub fn available(&self) -> Vec<String> {
        self.catalog.read().names().map(str::to_string).collect()
    }

    /// Names of loaded plugins, in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.tables.lock().plugins.iter().map(|p| p.name.clone()).collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.tables.lock().is_loaded(&name.to_lowercase())
    }

    /// The command table as `(command, owning plugin)` pairs, sorted by command.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.snapshot().commands.into_iter().collect()
    }

    /// The handler registered for `command`.
    pub fn command(&self, command: &str) -> Option<CommandHandler> {
        self.tables
            .lock()
            .commands
            .get(command)
            .map(|entry| entry.handler.clone())
    }

    /// The hooks registered for `kind`, in firing order.
    ///
    /// Returns a snapshot; lifecycle changes made while the hooks run take
    /// effect from the next event on.
    pub fn hooks_for(&self, kind: EventKind) -> Vec<(String, HookHandler)> {
        self.tables
            .lock()
            .hooks
            .get(&kind)
            .map(|hooks| {
                hooks
                    .iter()
                    .map(|entry| (entry.plugin.clone(), entry.handler.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Captures the current ownership of every table slot.
    pub fn snapshot(&self) -> TableSnapshot {
        let tables = self.tables.lock();
        TableSnapshot {
            plugins: tables.plugins.iter().map(|p| p.name.clone()).collect(),
            commands: tables
                .commands
                .iter()
                .map(|(command, entry)| (command.clone(), entry.plugin.clone()))
                .collect(),
            hooks: tables
                .hooks
                .iter()
                .map(|(kind, hooks)| (*kind, hooks.iter().map(|h| h.plugin.clone()).collect()))
                .collect(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Loads the plugin `name`, binding new instances to `bot`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::AlreadyLoaded`] / [`LifecycleError::NotFound`]
    /// - [`LifecycleError::Registry`] when the plugin's definition is invalid
    /// - [`LifecycleError::CommandCollision`] when another loaded plugin owns
    ///   one of its commands; nothing is registered
    /// - [`LifecycleError::SetupFailed`] when setup fails; the load is rolled
    ///   back
    pub async fn load(&self, name: &str, bot: &Weak<Bot>) -> LifecycleResult<()> {
        let _guard = self.lifecycle.lock().await;
        let descriptor = self.catalog.read().get(name)?;
        self.load_locked(descriptor, bot).await
    }

    /// Unloads the plugin `name`: teardown first, then its commands, hooks and
    /// instance record are removed.
    pub async fn unload(&self, name: &str) -> LifecycleResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(&name.to_lowercase()).await
    }

    /// Refreshes the definition of `name` and replaces the running instance.
    ///
    /// If the definition cannot be refreshed, or the refreshed definition
    /// declares a command another plugin owns, the running instance is left
    /// untouched.
    ///
    /// Setup of the new instance runs after the old one is torn down. If it
    /// fails, the plugin stays unloaded and the previous definition is kept
    /// for the next load.
    pub async fn reload(&self, name: &str, bot: &Weak<Bot>) -> LifecycleResult<()> {
        let _guard = self.lifecycle.lock().await;
        let key = name.to_lowercase();

        if !self.tables.lock().is_loaded(&key) {
            return Err(LifecycleError::NotLoaded(key));
        }

        let descriptor = self.catalog.read().refresh(&key)?;

        if let Some((command, owner)) = self
            .tables
            .lock()
            .collision(&key, descriptor.commands().iter().map(String::as_str))
        {
            return Err(LifecycleError::CommandCollision {
                plugin: key,
                command,
                owner,
            });
        }

        self.unload_locked(&key).await?;
        self.load_locked(descriptor.clone(), bot).await?;
        self.catalog.write().commit(descriptor);
        info!(plugin = %key, "Plugin reloaded");
        Ok(())
    }

    /// Unloads every plugin in reverse load order.
    ///
    /// Teardown failures are logged and do not stop the remaining unloads.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        let names: Vec<String> = self.loaded().into_iter().rev().collect();
        for name in names {
            if let Err(e) = self.unload_locked(&name).await {
                warn!(plugin = %name, error = %e, "Failed to unload plugin during shutdown");
            }
        }
    }

    async fn load_locked(&self, descriptor: PluginDescriptor, bot: &Weak<Bot>) -> LifecycleResult<()> {
        let name = descriptor.name().to_string();

        {
            let tables = self.tables.lock();
            if tables.is_loaded(&name) {
                return Err(LifecycleError::AlreadyLoaded(name));
            }
            if let Some((command, owner)) =
                tables.collision(&name, descriptor.commands().iter().map(String::as_str))
            {
                return Err(LifecycleError::CommandCollision {
                    plugin: name,
                    command,
                    owner,
                });
            }
        }

        let instance = descriptor.instantiate(PluginContext::new(&name, bot.clone()));

        // Re-checked under the same lock as the merge; `lifecycle` already
        // excludes other loads, so this only guards direct table mutation.
        {
            let mut tables = self.tables.lock();
            if let Some((command, owner)) = tables.collision(&name, instance.registry.command_names()) {
                return Err(LifecycleError::CommandCollision {
                    plugin: name,
                    command,
                    owner,
                });
            }
            tables.merge(&name, instance.plugin.clone(), &instance.registry);
        }
        debug!(plugin = %name, registry = ?instance.registry, "Plugin features registered");

        if let Err(e) = instance.plugin.setup().await {
            self.tables.lock().purge(&name);
            warn!(plugin = %name, error = %e, "Plugin setup failed, load rolled back");
            return Err(LifecycleError::SetupFailed {
                plugin: name,
                reason: e.to_string(),
            });
        }

        info!(plugin = %name, "Plugin loaded");
        Ok(())
    }

    async fn unload_locked(&self, name: &str) -> LifecycleResult<()> {
        let instance = self
            .tables
            .lock()
            .plugins
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.instance.clone())
            .ok_or_else(|| LifecycleError::NotLoaded(name.to_string()))?;

        if let Err(e) = instance.teardown().await {
            warn!(plugin = %name, error = %e, "Plugin teardown failed");
        }

        self.tables.lock().purge(name);
        info!(plugin = %name, "Plugin unloaded");
        Ok(())
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("catalog", &*self.catalog.read())
            .field("loaded", &self.loaded())
            .finish()
    }
}
