// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration backend trait definition.
//!
//! This module defines the `ConfigBackend` trait, the port every storage or fetch
//! implementation plugs into. In-memory maps, files, the process environment and
//! remote services are all just implementations of this trait.

use crate::domain::{Cancellation, ConfigError, ConfigKey, ConfigValue, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Callback invoked when a backend's values may have changed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Completion handed to [`ConfigBackend::refresh`].
///
/// It must be invoked exactly once, from any thread.
pub type RefreshCompletion = Box<dyn FnOnce(Result<()>) + Send>;

/// A single storage or fetch implementation.
///
/// Only [`value`](ConfigBackend::value) and [`refresh`](ConfigBackend::refresh) are
/// required. The optional capabilities have defaults that report themselves as
/// unsupported: writes and clears fail with [`ConfigError::Unsupported`], key
/// enumeration returns `None` and `listen` returns `None` ("never notifies").
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; several multiplexers may call into the
/// same backend concurrently.
///
/// # Examples
///
/// ```rust
/// use muxcfg::domain::{ConfigKey, ConfigValue};
/// use muxcfg::ports::{ConfigBackend, RefreshCompletion};
///
/// struct Fixed;
///
/// impl ConfigBackend for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
///         (key.as_str() == "answer").then(|| ConfigValue::from("42"))
///     }
///
///     fn refresh(&self, completion: RefreshCompletion) {
///         completion(Ok(()));
///     }
/// }
///
/// let backend = Fixed;
/// assert_eq!(backend.value(&ConfigKey::from("answer")).unwrap().as_str(), "42");
/// assert!(backend.clear().unwrap_err().is_unsupported());
/// assert!(backend.all_keys().is_none());
/// ```
pub trait ConfigBackend: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Synchronous point read. `None` if the key is not set.
    fn value(&self, key: &ConfigKey) -> Option<ConfigValue>;

    /// Stores a value; `None` deletes the key.
    fn write_value(&self, key: &ConfigKey, value: Option<ConfigValue>) -> Result<()> {
        let _ = (key, value);
        Err(ConfigError::Unsupported {
            backend: self.name().to_string(),
            operation: "write",
        })
    }

    /// Reloads the backend's values, reporting the outcome through `completion`.
    fn refresh(&self, completion: RefreshCompletion);

    /// Subscribes to change notifications.
    ///
    /// `None` means this backend never notifies.
    fn listen(&self, callback: ChangeCallback) -> Option<Cancellation> {
        let _ = callback;
        None
    }

    /// Enumerates the stored keys. `None` means enumeration is unsupported.
    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        None
    }

    /// Removes every stored value.
    fn clear(&self) -> Result<()> {
        Err(ConfigError::Unsupported {
            backend: self.name().to_string(),
            operation: "clear",
        })
    }
}
