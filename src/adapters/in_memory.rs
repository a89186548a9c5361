// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory configuration backend.
//!
//! Useful for tests, for caching fetched values and as a scratch layer in front of
//! slower backends.

use crate::adapters::listeners::Listeners;
use crate::domain::{Cancellation, ConfigKey, ConfigValue, Result};
use crate::ports::{ChangeCallback, ConfigBackend, RefreshCompletion};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Backend storing values in a process-local map.
///
/// Every mutation notifies the registered listeners after the internal lock has
/// been released, so listeners may read the backend again.
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::domain::ConfigKey;
/// use muxcfg::ports::ConfigBackend;
///
/// let backend = InMemoryBackend::from_pairs([("flag", "true")]);
/// assert_eq!(backend.value(&ConfigKey::from("flag")).unwrap().as_str(), "true");
///
/// backend.set("flag", "false");
/// assert_eq!(backend.value(&ConfigKey::from("flag")).unwrap().as_str(), "false");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    values: RwLock<HashMap<String, String>>,
    listeners: Arc<Listeners>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding the given values.
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            values: RwLock::new(values),
            listeners: Arc::default(),
        }
    }

    /// Creates a backend from key-value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_values(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns a snapshot of every stored value.
    pub fn values(&self) -> HashMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces every stored value and notifies listeners.
    pub fn set_values(&self, values: HashMap<String, String>) {
        *self.values.write().unwrap_or_else(PoisonError::into_inner) = values;
        self.listeners.notify();
    }

    /// Stores one value and notifies listeners.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self.listeners.notify();
    }

    /// Removes one value and notifies listeners.
    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.listeners.notify();
    }

    /// Number of active change subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ConfigBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .map(|v| ConfigValue::from(v.as_str()))
    }

    fn write_value(&self, key: &ConfigKey, value: Option<ConfigValue>) -> Result<()> {
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match value {
                Some(value) => {
                    values.insert(key.as_str().to_string(), value.into_string());
                }
                None => {
                    values.remove(key.as_str());
                }
            }
        }
        self.listeners.notify();
        Ok(())
    }

    fn refresh(&self, completion: RefreshCompletion) {
        completion(Ok(()));
    }

    fn listen(&self, callback: ChangeCallback) -> Option<Cancellation> {
        Some(self.listeners.subscribe(callback))
    }

    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        Some(
            self.values
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .map(|k| ConfigKey::from(k.as_str()))
                .collect(),
        )
    }

    fn clear(&self) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.listeners.notify();
        Ok(())
    }
}
