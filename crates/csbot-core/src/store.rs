//! Persisted per-plugin key-value pairs.
//!
//! The whole store is read at startup and rewritten at shutdown. The file is
//! a JSON object of objects:
//!
//! ```json
//! { "example": { "greeting": "hello" } }
//! ```
//!
//! Writes go to a sibling temporary file that is then renamed over the
//! original, so a crash mid-save leaves the previous contents in place.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

type Namespaces = BTreeMap<String, BTreeMap<String, String>>;

/// Per-plugin namespaced string storage.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    path: Option<PathBuf>,
    data: RwLock<Namespaces>,
}

impl KeyValueStore {
    /// A store that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the store backed by `path`.
    ///
    /// A missing file yields an empty store that will be created on the first
    /// [`save`](Self::save).
    pub async fn load(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No key-value file yet, starting empty");
                Namespaces::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads `key` from `plugin`'s namespace.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotDefined`] when the key was never set.
    pub fn get(&self, plugin: &str, key: &str) -> StoreResult<String> {
        self.data
            .read()
            .get(plugin)
            .and_then(|namespace| namespace.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotDefined {
                plugin: plugin.to_string(),
                key: key.to_string(),
            })
    }

    /// Writes `key` into `plugin`'s namespace, creating the namespace if
    /// needed and overwriting any previous value.
    pub fn set(&self, plugin: &str, key: &str, value: impl Into<String>) {
        self.data
            .write()
            .entry(plugin.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Keys defined in `plugin`'s namespace.
    pub fn keys(&self, plugin: &str) -> Vec<String> {
        self.data
            .read()
            .get(plugin)
            .map(|namespace| namespace.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Rewrites the backing file with the current contents.
    ///
    /// Does nothing for an in-memory store.
    pub async fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = {
            let data = self.data.read();
            serde_json::to_vec_pretty(&*data).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?
        };

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, &json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

        info!(path = %path.display(), "Key-value store saved");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let store = KeyValueStore::in_memory();
        store.set("example", "greeting", "hello");
        assert!(matches!(
            store.get("example", "farewell"),
            Err(StoreError::NotDefined { .. })
        ));
        assert!(matches!(
            store.get("other", "greeting"),
            Err(StoreError::NotDefined { .. })
        ));
    }

    #[test]
    fn test_set_overwrites() {
        let store = KeyValueStore::in_memory();
        store.set("example", "greeting", "hello");
        store.set("example", "greeting", "hi");
        assert_eq!(store.get("example", "greeting").unwrap(), "hi");
        assert_eq!(store.keys("example"), vec!["greeting"]);
    }

    #[tokio::test]
    async fn test_round_trip_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("csbot.data.json");

        let store = KeyValueStore::load(&path).await.unwrap();
        store.set("example", "greeting", "hello");
        store.set("auth", "admin", "alan");
        store.save().await.unwrap();

        let reloaded = KeyValueStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get("example", "greeting").unwrap(), "hello");
        assert_eq!(reloaded.get("auth", "admin").unwrap(), "alan");
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csbot.data.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            KeyValueStore::load(&path).await,
            Err(StoreError::Parse { .. })
        ));
    }
}
