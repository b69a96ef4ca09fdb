//! Per-plugin command and hook tables.
//!
//! A plugin type declares its features once into a [`PluginFeatures<P>`]
//! builder. Each time the plugin is loaded the builder is copied into a
//! [`FeatureRegistry`] whose handlers are closures bound to the new instance,
//! so the manager never needs to know the concrete plugin type.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::command::CommandEvent;
use crate::error::{HandlerResult, RegistryError, RegistryResult};
use crate::event::{Event, EventKind};

/// A command handler bound to a plugin instance.
pub type CommandHandler = Arc<dyn Fn(CommandEvent) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A hook handler bound to a plugin instance.
pub type HookHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

type UnboundCommand<P> =
    Arc<dyn Fn(Arc<P>, CommandEvent) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

type UnboundHook<P> = Arc<dyn Fn(Arc<P>, Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

// =============================================================================
// PluginFeatures
// =============================================================================

/// Type-level declaration of a plugin's commands and hooks.
///
/// Handlers receive the plugin instance as `Arc<P>`, which lets plugins write
/// them as `async fn name(self: Arc<Self>, ...)` methods:
///
/// ```rust,ignore
/// fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
///     features
///         .command("test", Self::test)?
///         .hook(EventKind::Message, Self::on_message);
///     Ok(())
/// }
/// ```
pub struct PluginFeatures<P> {
    plugin: String,
    commands: Vec<(String, UnboundCommand<P>)>,
    hooks: Vec<(EventKind, UnboundHook<P>)>,
}

impl<P: Send + Sync + 'static> PluginFeatures<P> {
    /// Creates an empty declaration for the plugin named `plugin`.
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            commands: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Declares a command.
    ///
    /// # Errors
    ///
    /// Fails when the name is empty, contains whitespace, or was already
    /// declared by this plugin.
    pub fn command<F, Fut>(&mut self, name: &str, handler: F) -> RegistryResult<&mut Self>
    where
        F: Fn(Arc<P>, CommandEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(RegistryError::InvalidCommandName {
                plugin: self.plugin.clone(),
                command: name.to_string(),
            });
        }
        if self.commands.iter().any(|(existing, _)| existing == name) {
            return Err(RegistryError::DuplicateCommand {
                plugin: self.plugin.clone(),
                command: name.to_string(),
            });
        }

        let handler: UnboundCommand<P> = Arc::new(move |plugin, cmd| handler(plugin, cmd).boxed());
        self.commands.push((name.to_string(), handler));
        Ok(self)
    }

    /// Appends a hook for `kind`. Hooks of one kind fire in declaration order.
    pub fn hook<F, Fut>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(Arc<P>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: UnboundHook<P> = Arc::new(move |plugin, event| handler(plugin, event).boxed());
        self.hooks.push((kind, handler));
        self
    }

    /// Name of the plugin these features belong to.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Declared command names, in declaration order.
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|(name, _)| name.as_str())
    }

    /// Binds every handler to `instance`.
    pub fn bind(&self, instance: Arc<P>) -> FeatureRegistry {
        let commands = self
            .commands
            .iter()
            .map(|(name, handler)| {
                let handler = handler.clone();
                let instance = instance.clone();
                let bound: CommandHandler = Arc::new(move |cmd| handler(instance.clone(), cmd));
                (name.clone(), bound)
            })
            .collect();

        let hooks = self
            .hooks
            .iter()
            .map(|(kind, handler)| {
                let handler = handler.clone();
                let instance = instance.clone();
                let bound: HookHandler = Arc::new(move |event| handler(instance.clone(), event));
                (*kind, bound)
            })
            .collect();

        FeatureRegistry { commands, hooks }
    }
}

// =============================================================================
// FeatureRegistry
// =============================================================================

/// The commands and hooks of one plugin instance.
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    commands: Vec<(String, CommandHandler)>,
    hooks: Vec<(EventKind, HookHandler)>,
}

impl FeatureRegistry {
    /// Commands in declaration order.
    pub fn commands(&self) -> &[(String, CommandHandler)] {
        &self.commands
    }

    /// Hooks in declaration order.
    pub fn hooks(&self) -> &[(EventKind, HookHandler)] {
        &self.hooks
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("commands", &self.command_names().collect::<Vec<_>>())
            .field(
                "hooks",
                &self.hooks.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    async fn bump(counter: Arc<Counter>, _event: Event) -> HandlerResult {
        counter.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn noop(_counter: Arc<Counter>, _cmd: CommandEvent) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let mut features = PluginFeatures::<Counter>::new("counter");
        features.command("count", noop).unwrap();
        let err = features.command("count", noop).err().unwrap();
        assert_eq!(
            err,
            RegistryError::DuplicateCommand {
                plugin: "counter".into(),
                command: "count".into(),
            }
        );
    }

    #[test]
    fn test_invalid_command_names_rejected() {
        let mut features = PluginFeatures::<Counter>::new("counter");
        assert!(features.command("", noop).is_err());
        assert!(features.command("two words", noop).is_err());
        assert_eq!(features.command_names().count(), 0);
    }

    #[tokio::test]
    async fn test_bound_hooks_share_the_instance() {
        let mut features = PluginFeatures::<Counter>::new("counter");
        features
            .hook(EventKind::SignedOn, bump)
            .hook(EventKind::SignedOn, bump);

        let instance = Arc::new(Counter::default());
        let registry = features.bind(instance.clone());
        assert_eq!(registry.hooks().len(), 2);

        let transport = crate::testing::RecordingTransport::new();
        for (_, hook) in registry.hooks() {
            let event = Event::new(crate::EventPayload::SignedOn, transport.clone());
            hook(event).await.unwrap();
        }
        assert_eq!(instance.hits.load(Ordering::SeqCst), 2);
    }
}
