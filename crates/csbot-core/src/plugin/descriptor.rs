//! Plugin descriptors and the link-time plugin registry.

use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;

use super::{Plugin, PluginContext};
use crate::error::RegistryResult;
use crate::features::{FeatureRegistry, PluginFeatures};

// ─── PluginSource ─────────────────────────────────────────────────────────────

/// A discoverable plugin type.
///
/// `define` is re-run on every reload, so a definition that can fail (for
/// example one that reads external data) is re-evaluated before the running
/// instance is replaced.
#[derive(Clone, Copy)]
pub struct PluginSource {
    /// Returns the plugin's name.
    pub name: fn() -> &'static str,
    /// Builds the plugin's descriptor.
    pub define: fn() -> RegistryResult<PluginDescriptor>,
}

impl PluginSource {
    /// The source of plugin type `P`.
    pub const fn of<P: Plugin>() -> Self {
        Self {
            name: P::name,
            define: PluginDescriptor::of::<P>,
        }
    }
}

impl fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSource")
            .field("name", &(self.name)())
            .finish()
    }
}

/// Registry of plugin types linked into the binary.
///
/// Populated by [`register_plugin!`](crate::register_plugin); read by
/// [`PluginCatalog::discover`](super::PluginCatalog::discover).
#[distributed_slice]
pub static PLUGINS: [PluginSource];

/// Registers a plugin type for discovery.
///
/// ```rust,ignore
/// csbot_core::register_plugin!(EXAMPLE: Example);
/// ```
#[macro_export]
macro_rules! register_plugin {
    ($name:ident : $plugin:ty) => {
        #[$crate::__private::linkme::distributed_slice($crate::plugin::PLUGINS)]
        #[linkme(crate = $crate::__private::linkme)]
        static $name: $crate::plugin::PluginSource = $crate::plugin::PluginSource::of::<$plugin>();
    };
}

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

trait PluginFactory: Send + Sync {
    fn instantiate(&self, ctx: PluginContext) -> PluginInstance;
}

struct TypedFactory<P> {
    features: PluginFeatures<P>,
}

impl<P: Plugin> PluginFactory for TypedFactory<P> {
    fn instantiate(&self, ctx: PluginContext) -> PluginInstance {
        let plugin = Arc::new(P::create(ctx));
        let registry = self.features.bind(plugin.clone());
        PluginInstance { plugin, registry }
    }
}

/// The evaluated definition of a plugin type: its name, the commands it
/// declares, and a factory for instances.
#[derive(Clone)]
pub struct PluginDescriptor {
    name: String,
    commands: Vec<String>,
    factory: Arc<dyn PluginFactory>,
}

impl PluginDescriptor {
    /// Evaluates the declaration of plugin type `P`.
    pub fn of<P: Plugin>() -> RegistryResult<Self> {
        let name = P::name().to_lowercase();
        let mut features = PluginFeatures::new(name.clone());
        P::declare(&mut features)?;
        Ok(Self {
            commands: features.command_names().map(str::to_string).collect(),
            name,
            factory: Arc::new(TypedFactory { features }),
        })
    }

    /// Lowercase plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commands this plugin declares.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Creates a new instance with its features bound to it.
    pub fn instantiate(&self, ctx: PluginContext) -> PluginInstance {
        self.factory.instantiate(ctx)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("commands", &self.commands)
            .finish()
    }
}

/// A live plugin instance together with its bound features.
pub struct PluginInstance {
    /// The instance.
    pub plugin: Arc<dyn Plugin>,
    /// Its commands and hooks.
    pub registry: FeatureRegistry,
}
