// SPDX-License-Identifier: MIT OR Apache-2.0

//! The typed configuration facade.
//!
//! [`Configs`] is what application code talks to. It resolves [`TypedKey`]s against
//! a [`Coordinator`], layering local overrides on top, and exposes fetching and
//! change observation.

use crate::domain::{Cancellation, Category, ConfigError, ConfigKey, ConfigValue, Result, TypedKey};
use crate::service::coordinator::Coordinator;
use crate::service::registry::Registry;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{mpsc, Arc};

type Override = Arc<dyn Any + Send + Sync>;

/// Typed access to configuration.
///
/// A facade is cheap to clone. Overrides added with [`Configs::with`] live only in
/// the returned facade and are never written to a backend.
///
/// Resolution order for [`Configs::get`]: a local override of exactly the key's
/// type, then the raw value from the backends routed for the key's read category,
/// decoded by the key, then the key's default.
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::domain::TypedKey;
/// use muxcfg::service::{Configs, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// registry.bootstrap(Arc::new(InMemoryBackend::from_pairs([("workers", "8")])));
///
/// let workers = TypedKey::parsed("workers", 1u32);
/// let configs = Configs::from_registry(&registry);
/// assert_eq!(configs.get(&workers), 8);
///
/// let pinned = configs.with(&workers, Some(2));
/// assert_eq!(pinned.get(&workers), 2);
/// assert_eq!(configs.get(&workers), 8);
/// ```
#[derive(Clone)]
pub struct Configs {
    coordinator: Arc<Coordinator>,
    overrides: HashMap<ConfigKey, Override>,
}

impl Configs {
    /// Creates a facade over the global registry's current backends.
    pub fn new() -> Self {
        Self::from_registry(Registry::global())
    }

    /// Creates a facade over a registry's current backends.
    pub fn from_registry(registry: &Registry) -> Self {
        Self::from_coordinator(registry.coordinator())
    }

    /// Creates a facade over a coordinator.
    pub fn from_coordinator(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            overrides: HashMap::new(),
        }
    }

    /// The coordinator this facade resolves against.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Resolves a typed key.
    pub fn get<T>(&self, key: &TypedKey<T>) -> T
    where
        T: Clone + 'static,
    {
        if let Some(value) = self
            .overrides
            .get(key.name())
            .and_then(|value| value.downcast_ref::<T>())
        {
            return value.clone();
        }

        match self.coordinator.value(key.name(), key.read_category()) {
            Some(raw) => key.decode(raw.as_str()).unwrap_or_else(|| {
                tracing::debug!(
                    "Could not decode value for key '{}', using default",
                    key.name()
                );
                key.default_value()
            }),
            None => key.default_value(),
        }
    }

    /// Writes a value through the key's encoder.
    ///
    /// Values the key cannot encode, and keys without an encoder, are dropped
    /// without error.
    ///
    /// # Errors
    ///
    /// Returns the backend failure if the routed backends reject the write.
    pub fn set<T>(&self, key: &TypedKey<T>, value: T) -> Result<()> {
        match key.encode(&value) {
            Some(raw) => self.coordinator.write_value(
                key.name(),
                Some(ConfigValue::from(raw)),
                key.write_category(),
            ),
            None => {
                tracing::debug!("Key '{}' is not writable for this value", key.name());
                Ok(())
            }
        }
    }

    /// Deletes the stored value for a key.
    ///
    /// # Errors
    ///
    /// Returns the backend failure if the routed backends reject the delete.
    pub fn remove<T>(&self, key: &TypedKey<T>) -> Result<()> {
        self.coordinator
            .write_value(key.name(), None, key.write_category())
    }

    /// Returns a facade with a local override for `key`, or with the override
    /// removed when `value` is `None`.
    pub fn with<T>(&self, key: &TypedKey<T>, value: Option<T>) -> Configs
    where
        T: Send + Sync + 'static,
    {
        let mut configs = self.clone();
        match value {
            Some(value) => {
                configs
                    .overrides
                    .insert(key.name().clone(), Arc::new(value) as Override);
            }
            None => {
                configs.overrides.remove(key.name());
            }
        }
        configs
    }

    /// Binds a key to this facade.
    pub fn config<T>(&self, key: &TypedKey<T>) -> Config<T> {
        Config {
            configs: self.clone(),
            key: key.clone(),
        }
    }

    /// Returns `true` once any refresh of the underlying backends has succeeded.
    pub fn did_fetch(&self) -> bool {
        self.coordinator.did_fetch()
    }

    /// Refreshes every backend and reports the outcome to `completion`.
    pub fn fetch_with<F>(&self, completion: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.coordinator.refresh(Box::new(completion));
    }

    /// Refreshes every backend, blocking until the refresh completes.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure, or [`ConfigError::RefreshAbandoned`] if the
    /// completion was dropped unreported.
    pub fn fetch(&self) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        self.fetch_with(move |result| {
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Err(ConfigError::RefreshAbandoned))
    }

    /// Refreshes unless a refresh already succeeded.
    ///
    /// # Errors
    ///
    /// See [`Configs::fetch`].
    pub fn fetch_if_needed(&self) -> Result<()> {
        if self.did_fetch() {
            Ok(())
        } else {
            self.fetch()
        }
    }

    /// Refreshes, then resolves `key`.
    ///
    /// # Errors
    ///
    /// See [`Configs::fetch`].
    pub fn fetch_value<T>(&self, key: &TypedKey<T>) -> Result<T>
    where
        T: Clone + 'static,
    {
        self.fetch()?;
        Ok(self.get(key))
    }

    /// Refreshes if nothing was fetched yet, then resolves `key`.
    ///
    /// # Errors
    ///
    /// See [`Configs::fetch`].
    pub fn fetch_value_if_needed<T>(&self, key: &TypedKey<T>) -> Result<T>
    where
        T: Clone + 'static,
    {
        self.fetch_if_needed()?;
        Ok(self.get(key))
    }

    /// Refreshes every backend without blocking the executor.
    ///
    /// # Errors
    ///
    /// See [`Configs::fetch`].
    #[cfg(feature = "async")]
    pub async fn fetch_async(&self) -> Result<()> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.fetch_with(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(ConfigError::RefreshAbandoned))
    }

    /// Refreshes unless a refresh already succeeded, without blocking the executor.
    ///
    /// # Errors
    ///
    /// See [`Configs::fetch`].
    #[cfg(feature = "async")]
    pub async fn fetch_if_needed_async(&self) -> Result<()> {
        if self.did_fetch() {
            Ok(())
        } else {
            self.fetch_async().await
        }
    }

    /// Registers a callback invoked with this facade whenever configuration changes.
    ///
    /// If a refresh already succeeded the callback runs once before this returns.
    /// Dropping the returned token does not unregister the callback; call
    /// [`Cancellation::cancel`].
    pub fn listen<F>(&self, callback: F) -> Cancellation
    where
        F: Fn(&Configs) + Send + Sync + 'static,
    {
        let coordinator = Arc::downgrade(&self.coordinator);
        let overrides = self.overrides.clone();
        self.coordinator.listen(Arc::new(move || {
            if let Some(coordinator) = coordinator.upgrade() {
                callback(&Configs {
                    coordinator,
                    overrides: overrides.clone(),
                });
            }
        }))
    }

    /// Registers a callback invoked with the resolved value of `key` on every change.
    pub fn listen_key<T, F>(&self, key: &TypedKey<T>, callback: F) -> Cancellation
    where
        T: Clone + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let key = key.clone();
        self.listen(move |configs| callback(configs.get(&key)))
    }

    /// Every key known to the backends routed for `category`.
    pub fn all_keys(&self, category: Category) -> HashSet<ConfigKey> {
        self.coordinator.all_keys(category)
    }

    /// Clears every backend routed for `category`.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, aggregated if several backends failed.
    pub fn clear(&self, category: Category) -> Result<()> {
        self.coordinator.clear(category)
    }
}

impl Default for Configs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Configs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overrides: Vec<&str> = self.overrides.keys().map(ConfigKey::as_str).collect();
        overrides.sort_unstable();
        f.debug_struct("Configs")
            .field("coordinator", &self.coordinator)
            .field("overrides", &overrides)
            .finish()
    }
}

/// A typed key bound to a facade.
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::domain::TypedKey;
/// use muxcfg::service::{Configs, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// registry.bootstrap(Arc::new(InMemoryBackend::new()));
///
/// let theme = Configs::from_registry(&registry)
///     .config(&TypedKey::parsed("theme", String::from("light")));
/// assert_eq!(theme.get(), "light");
///
/// theme.set(String::from("dark")).unwrap();
/// assert_eq!(theme.get(), "dark");
/// ```
#[derive(Clone)]
pub struct Config<T> {
    configs: Configs,
    key: TypedKey<T>,
}

impl<T> Config<T> {
    /// The bound key.
    pub fn key(&self) -> &TypedKey<T> {
        &self.key
    }

    /// Writes a value. See [`Configs::set`].
    pub fn set(&self, value: T) -> Result<()> {
        self.configs.set(&self.key, value)
    }

    /// Deletes the stored value. See [`Configs::remove`].
    pub fn remove(&self) -> Result<()> {
        self.configs.remove(&self.key)
    }
}

impl<T: Clone + 'static> Config<T> {
    /// Resolves the value. See [`Configs::get`].
    pub fn get(&self) -> T {
        self.configs.get(&self.key)
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").field("key", &self.key).finish()
    }
}
