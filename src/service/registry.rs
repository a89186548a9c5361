// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide registration of configuration backends.
//!
//! A [`Registry`] owns the current [`Coordinator`]. Until it is bootstrapped every
//! category routes to a [`NoopBackend`]. Bootstrapping installs the real backends
//! and replaces the coordinator, so observers and fetch state start fresh.
//! Facades created before a bootstrap keep talking to the coordinator they were
//! created with.

use crate::adapters::NoopBackend;
use crate::domain::Category;
use crate::ports::ConfigBackend;
use crate::service::coordinator::Coordinator;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// Holds the backends configuration is read from and written to.
///
/// Most applications use the process-wide instance through [`Registry::global`] and
/// the crate-level [`bootstrap`](crate::bootstrap) functions. Tests usually create
/// their own isolated registries with [`Registry::new`].
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::service::Registry;
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// assert!(!registry.is_bootstrapped());
///
/// registry.bootstrap(Arc::new(InMemoryBackend::from_pairs([("name", "demo")])));
/// assert!(registry.is_bootstrapped());
/// ```
pub struct Registry {
    inner: RwLock<RegistryState>,
}

struct RegistryState {
    coordinator: Arc<Coordinator>,
    bootstrapped: bool,
}

impl Registry {
    /// Creates an isolated registry that routes everything to a no-op backend.
    pub fn new() -> Self {
        let noop: Arc<dyn ConfigBackend> = Arc::new(NoopBackend::new());
        Self {
            inner: RwLock::new(RegistryState {
                coordinator: Arc::new(Coordinator::new([(Category::ALL, noop)])),
                bootstrapped: false,
            }),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Installs a single backend serving every category.
    ///
    /// # Panics
    ///
    /// Panics if the registry was already bootstrapped.
    pub fn bootstrap(&self, backend: Arc<dyn ConfigBackend>) {
        self.bootstrap_categories([(Category::ALL, backend)]);
    }

    /// Installs a category-to-backend mapping.
    ///
    /// # Panics
    ///
    /// Panics if the registry was already bootstrapped.
    pub fn bootstrap_categories<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (Category, Arc<dyn ConfigBackend>)>,
    {
        let coordinator = Arc::new(Coordinator::new(handlers));
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.bootstrapped {
            drop(state);
            panic!("configuration registry can only be bootstrapped once");
        }
        tracing::info!("Configuration registry bootstrapped: {:?}", coordinator);
        state.coordinator = coordinator;
        state.bootstrapped = true;
    }

    /// Installs a category-to-backend mapping even if the registry was already
    /// bootstrapped.
    ///
    /// Only available to this crate's tests and with the `test-util` feature, for
    /// test set-up that needs to reset a registry between cases.
    #[cfg(any(test, feature = "test-util"))]
    #[doc(hidden)]
    pub fn bootstrap_unchecked<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (Category, Arc<dyn ConfigBackend>)>,
    {
        let coordinator = Arc::new(Coordinator::new(handlers));
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.bootstrapped {
            tracing::debug!("Re-bootstrapping configuration registry");
        }
        state.coordinator = coordinator;
        state.bootstrapped = true;
    }

    /// Returns `true` once a bootstrap call has installed backends.
    pub fn is_bootstrapped(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bootstrapped
    }

    /// Returns the current coordinator.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(
            &self
                .inner
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .coordinator,
        )
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Registry")
            .field("bootstrapped", &state.bootstrapped)
            .field("coordinator", &state.coordinator)
            .finish()
    }
}

/// Installs a single backend serving every category on the global registry.
///
/// # Panics
///
/// Panics if the global registry was already bootstrapped.
pub fn bootstrap(backend: Arc<dyn ConfigBackend>) {
    Registry::global().bootstrap(backend);
}

/// Installs a category-to-backend mapping on the global registry.
///
/// # Panics
///
/// Panics if the global registry was already bootstrapped.
pub fn bootstrap_categories<I>(handlers: I)
where
    I: IntoIterator<Item = (Category, Arc<dyn ConfigBackend>)>,
{
    Registry::global().bootstrap_categories(handlers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::domain::ConfigKey;

    #[test]
    fn test_unbootstrapped_registry_reads_nothing() {
        let registry = Registry::new();
        let coordinator = registry.coordinator();
        assert!(coordinator
            .value(&ConfigKey::from("anything"), Category::ALL)
            .is_none());
        assert!(coordinator.all_keys(Category::NONE).is_empty());
    }

    #[test]
    fn test_bootstrap_replaces_coordinator() {
        let registry = Registry::new();
        let before = registry.coordinator();

        registry.bootstrap(Arc::new(InMemoryBackend::from_pairs([("k", "v")])));
        let after = registry.coordinator();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.value(&ConfigKey::from("k"), Category::ALL).is_none());
        assert_eq!(
            after.value(&ConfigKey::from("k"), Category::ALL).unwrap().as_str(),
            "v"
        );
    }

    #[test]
    #[should_panic(expected = "can only be bootstrapped once")]
    fn test_bootstrap_twice_panics() {
        let registry = Registry::new();
        registry.bootstrap(Arc::new(InMemoryBackend::new()));
        registry.bootstrap(Arc::new(InMemoryBackend::new()));
    }

    #[test]
    fn test_bootstrap_unchecked_allows_reset() {
        let registry = Registry::new();
        registry.bootstrap(Arc::new(InMemoryBackend::from_pairs([("k", "1")])));
        let replacement: Arc<dyn ConfigBackend> =
            Arc::new(InMemoryBackend::from_pairs([("k", "2")]));
        registry.bootstrap_unchecked([(Category::ALL, replacement)]);

        assert_eq!(
            registry
                .coordinator()
                .value(&ConfigKey::from("k"), Category::ALL)
                .unwrap()
                .as_str(),
            "2"
        );
    }

    #[test]
    fn test_registries_are_isolated() {
        let first = Registry::new();
        let second = Registry::new();
        first.bootstrap(Arc::new(InMemoryBackend::from_pairs([("k", "v")])));

        assert!(first.is_bootstrapped());
        assert!(!second.is_bootstrapped());
        assert!(second
            .coordinator()
            .value(&ConfigKey::from("k"), Category::ALL)
            .is_none());
    }
}
