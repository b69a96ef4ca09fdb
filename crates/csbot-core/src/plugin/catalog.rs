use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::descriptor::{PLUGINS, PluginDescriptor, PluginSource};
use crate::error::{LifecycleError, LifecycleResult, RegistryResult};

struct CatalogEntry {
    source: PluginSource,
    definition: RegistryResult<PluginDescriptor>,
}

/// The set of discoverable plugin types, keyed by lowercase name.
///
/// Definitions are evaluated once when the catalog is built and again on
/// [`refresh`](Self::refresh). A definition that failed to evaluate stays in
/// the catalog so that loading it reports the failure.
pub struct PluginCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PluginCatalog {
    /// Builds the catalog from every plugin registered with
    /// [`register_plugin!`](crate::register_plugin).
    pub fn discover() -> LifecycleResult<Self> {
        Self::from_sources(PLUGINS.iter().copied())
    }

    /// Builds the catalog from an explicit list of plugin types.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::DuplicateName`] when two sources share a name after
    /// lowercasing.
    pub fn from_sources(sources: impl IntoIterator<Item = PluginSource>) -> LifecycleResult<Self> {
        let mut entries = BTreeMap::new();
        for source in sources {
            let name = (source.name)().to_lowercase();
            if entries.contains_key(&name) {
                return Err(LifecycleError::DuplicateName(name));
            }

            let definition = (source.define)();
            match &definition {
                Ok(descriptor) => debug!(
                    plugin = %name,
                    commands = descriptor.commands().len(),
                    "Discovered plugin"
                ),
                Err(e) => warn!(plugin = %name, error = %e, "Plugin definition is invalid"),
            }
            entries.insert(name, CatalogEntry { source, definition });
        }
        Ok(Self { entries })
    }

    /// An empty catalog.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Names of all discovered plugin types, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current definition of `name`.
    pub fn get(&self, name: &str) -> LifecycleResult<PluginDescriptor> {
        let entry = self
            .entries
            .get(&name.to_lowercase())
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))?;
        entry.definition.clone().map_err(LifecycleError::from)
    }

    /// Evaluates the definition of `name` again without storing it.
    ///
    /// Pass the result to [`commit`](Self::commit) once it is in use.
    pub fn refresh(&self, name: &str) -> LifecycleResult<PluginDescriptor> {
        let key = name.to_lowercase();
        let entry = self
            .entries
            .get(&key)
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))?;

        (entry.source.define)().map_err(|source| LifecycleError::RefreshFailed {
            plugin: key,
            source,
        })
    }

    /// Makes `descriptor` the stored definition of its plugin.
    pub fn commit(&mut self, descriptor: PluginDescriptor) {
        if let Some(entry) = self.entries.get_mut(descriptor.name()) {
            entry.definition = Ok(descriptor);
        }
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
