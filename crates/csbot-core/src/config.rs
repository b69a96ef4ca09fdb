//! Two-level option lookup.
//!
//! Options live in a *default* section and in one optional section per
//! plugin. A lookup consults the plugin's section first and falls back to the
//! default section. All values are strings; [`ConfigStore::get_int`] and
//! [`ConfigStore::get_list`] are the only coercions offered.

use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult};

/// Options of the default section when nothing overrides them.
pub const DEFAULTS: &[(&str, &str)] = &[
    ("nickname", "csyorkbot"),
    ("username", "csyorkbot"),
    ("realname", "cs-york bot"),
    ("source_url", "http://github.com/csyork/csbot/"),
    ("line_rate", "1"),
    ("command_prefix", "!"),
    ("host", "irc.freenode.net"),
    ("port", "6667"),
    ("channels", "#cs-york-dev"),
    ("plugins", "*"),
];

/// Option store with a default section and per-plugin sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    default: BTreeMap<String, String>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigStore {
    /// An empty store; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose default section holds [`DEFAULTS`].
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for (key, value) in DEFAULTS {
            store.set_default(*key, *value);
        }
        store
    }

    /// Sets an option in the default section.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.default.insert(key.into(), value.into());
        self
    }

    /// Sets an option in `plugin`'s section.
    pub fn set(
        &mut self,
        plugin: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.sections
            .entry(plugin.to_lowercase())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Looks `key` up in `plugin`'s section, then in the default section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownOption`] when neither section defines `key`.
    pub fn lookup(&self, plugin: &str, key: &str) -> ConfigResult<&str> {
        self.sections
            .get(&plugin.to_lowercase())
            .and_then(|section| section.get(key))
            .or_else(|| self.default.get(key))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownOption(key.to_string()))
    }

    /// Looks `key` up in the default section only.
    pub fn default_value(&self, key: &str) -> ConfigResult<&str> {
        self.default
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownOption(key.to_string()))
    }

    /// Looks an option up and parses it as an integer.
    pub fn get_int(&self, plugin: &str, key: &str) -> ConfigResult<i64> {
        let value = self.lookup(plugin, key)?;
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: "integer",
        })
    }

    /// Looks an option up and splits it on commas and whitespace.
    ///
    /// Empty items are dropped.
    pub fn get_list(&self, plugin: &str, key: &str) -> ConfigResult<Vec<String>> {
        Ok(split_list(self.lookup(plugin, key)?))
    }

    /// Splits a default-section option into a list, like [`get_list`](Self::get_list).
    pub fn default_list(&self, key: &str) -> ConfigResult<Vec<String>> {
        Ok(split_list(self.default_value(key)?))
    }

    /// The options of `plugin`'s own section.
    pub fn section(&self, plugin: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&plugin.to_lowercase())
    }

    /// The default section.
    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.default
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
