// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variable configuration backend.
//!
//! This module provides a read-only backend that serves configuration values from
//! the process environment.

use crate::domain::{ConfigKey, ConfigValue};
use crate::ports::{ConfigBackend, RefreshCompletion};
use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::{PoisonError, RwLock};

/// Maximum length for environment variable keys (prevents DoS)
const MAX_ENV_KEY_LEN: usize = 512;

/// Maximum length for environment variable values (prevents DoS)
const MAX_ENV_VALUE_LEN: usize = 1048576; // 1MB

/// Read-only backend for environment variables.
///
/// Variables are snapshotted on first access and again on every refresh, so a
/// running process sees changes to its environment only after a fetch. The
/// backend supports optional prefix filtering (e.g., only read variables starting
/// with "APP_") and key transformation (e.g., converting underscores to dots).
///
/// Writes and clears fail with [`ConfigError::Unsupported`](crate::domain::ConfigError::Unsupported).
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::EnvVarBackend;
/// use muxcfg::ports::ConfigBackend;
///
/// // Read all environment variables
/// let backend = EnvVarBackend::new();
///
/// // Read only variables with a specific prefix, as lowercase dotted keys
/// let backend = EnvVarBackend::with_prefix("APP_").lowercase_keys(true);
/// assert_eq!(backend.name(), "env");
/// ```
#[derive(Debug)]
pub struct EnvVarBackend {
    /// Optional prefix to filter environment variables
    prefix: Option<String>,
    /// Whether to convert keys to lowercase
    lowercase_keys: bool,
    /// Whether to replace underscores with dots
    replace_underscores: bool,
    /// Values supplied up front are never replaced by a refresh
    pinned: bool,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl EnvVarBackend {
    /// Creates a backend without prefix filtering.
    ///
    /// This will read all environment variables available to the process.
    pub fn new() -> Self {
        Self {
            prefix: None,
            lowercase_keys: false,
            replace_underscores: true,
            pinned: false,
            cache: RwLock::new(None),
        }
    }

    /// Creates a backend with prefix filtering.
    ///
    /// Only environment variables starting with the given prefix will be read.
    /// The prefix is stripped from the key when storing values.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The prefix to filter environment variables (e.g., "APP_")
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Sets whether to convert keys to lowercase.
    pub fn lowercase_keys(mut self, enabled: bool) -> Self {
        self.lowercase_keys = enabled;
        self
    }

    /// Sets whether to replace underscores with dots in keys.
    ///
    /// When enabled (default), underscores in environment variable names are
    /// replaced with dots to match the dotted key format used by file backends.
    pub fn replace_underscores(mut self, enabled: bool) -> Self {
        self.replace_underscores = enabled;
        self
    }

    /// Creates a backend with pre-populated values for testing.
    ///
    /// **Note**: This method is primarily intended for testing. The values are
    /// served as-is and survive refreshes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use muxcfg::adapters::EnvVarBackend;
    /// use muxcfg::domain::ConfigKey;
    /// use muxcfg::ports::ConfigBackend;
    /// use std::collections::HashMap;
    ///
    /// let mut values = HashMap::new();
    /// values.insert("test.key".to_string(), "test_value".to_string());
    ///
    /// let backend = EnvVarBackend::with_values(values);
    /// assert_eq!(backend.value(&ConfigKey::from("test.key")).unwrap().as_str(), "test_value");
    /// ```
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            prefix: None,
            lowercase_keys: false,
            replace_underscores: false,
            pinned: true,
            cache: RwLock::new(Some(values)),
        }
    }

    /// Reads the environment into a new map.
    fn load(&self) -> HashMap<String, String> {
        let mut values = HashMap::new();

        for (key, value) in env::vars() {
            // Validate input sizes to prevent DoS
            if key.len() > MAX_ENV_KEY_LEN || value.len() > MAX_ENV_VALUE_LEN {
                tracing::debug!(
                    "Skipping oversized environment variable: key_len={}, value_len={} (max key={}, max value={})",
                    key.len(),
                    value.len(),
                    MAX_ENV_KEY_LEN,
                    MAX_ENV_VALUE_LEN
                );
                continue;
            }

            let key = match &self.prefix {
                Some(prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(stripped) => stripped.to_string(),
                    None => continue,
                },
                None => key,
            };

            let mut transformed_key = key;
            if self.lowercase_keys {
                transformed_key = transformed_key.to_lowercase();
            }
            if self.replace_underscores {
                transformed_key = transformed_key.replace('_', ".");
            }

            values.insert(transformed_key, value);
        }

        tracing::debug!(
            "Loaded {} environment variables (prefix={:?}, lowercase={}, replace_underscores={})",
            values.len(),
            self.prefix,
            self.lowercase_keys,
            self.replace_underscores
        );

        values
    }

    /// Runs `f` against the snapshot, taking one first if necessary.
    fn with_cache<R>(&self, f: impl FnOnce(&HashMap<String, String>) -> R) -> R {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(values) = cache.as_ref() {
                return f(values);
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let values = cache.get_or_insert_with(|| self.load());
        f(values)
    }
}

impl Default for EnvVarBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBackend for EnvVarBackend {
    fn name(&self) -> &str {
        "env"
    }

    fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.with_cache(|values| {
            values
                .get(key.as_str())
                .map(|v| ConfigValue::from(v.as_str()))
        })
    }

    fn refresh(&self, completion: RefreshCompletion) {
        if !self.pinned {
            let values = self.load();
            *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(values);
        }
        completion(Ok(()));
    }

    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        Some(self.with_cache(|values| {
            values
                .keys()
                .map(|k| ConfigKey::from(k.as_str()))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigError;
    use std::env;
    use std::sync::mpsc;

    // Helper to set and clean up environment variables
    struct EnvGuard {
        keys: Vec<String>,
    }

    impl EnvGuard {
        fn new() -> Self {
            EnvGuard { keys: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.keys.push(key.to_string());
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                env::remove_var(key);
            }
        }
    }

    fn refresh(backend: &EnvVarBackend) {
        let (tx, rx) = mpsc::channel();
        backend.refresh(Box::new(move |result| tx.send(result).unwrap()));
        rx.recv().unwrap().unwrap();
    }

    #[test]
    fn test_env_backend_name() {
        assert_eq!(EnvVarBackend::new().name(), "env");
        assert_eq!(EnvVarBackend::default().name(), "env");
    }

    #[test]
    fn test_env_backend_value() {
        let mut guard = EnvGuard::new();
        guard.set("MUXCFG_ENV_TEST_VAR", "test_value");

        let backend = EnvVarBackend::new();
        let value = backend.value(&ConfigKey::from("MUXCFG.ENV.TEST.VAR"));
        assert_eq!(value.unwrap().as_str(), "test_value");
    }

    #[test]
    fn test_env_backend_value_missing() {
        let backend = EnvVarBackend::new();
        assert!(backend
            .value(&ConfigKey::from("NONEXISTENT_VAR_12345"))
            .is_none());
    }

    #[test]
    fn test_env_backend_with_prefix() {
        let mut guard = EnvGuard::new();
        guard.set("MUXPFX_DATABASE_HOST", "localhost");
        guard.set("MUXOTHER_VAR", "should_not_appear");

        let backend = EnvVarBackend::with_prefix("MUXPFX_");
        assert_eq!(
            backend.value(&ConfigKey::from("DATABASE.HOST")).unwrap().as_str(),
            "localhost"
        );
        assert!(backend.value(&ConfigKey::from("MUXOTHER.VAR")).is_none());
    }

    #[test]
    fn test_env_backend_transformations() {
        let mut guard = EnvGuard::new();
        guard.set("MUXLOWER_UPPER_CASE_KEY", "value");
        guard.set("MUXRAW_MY_VAR", "raw");

        let lower = EnvVarBackend::with_prefix("MUXLOWER_").lowercase_keys(true);
        assert_eq!(
            lower.value(&ConfigKey::from("upper.case.key")).unwrap().as_str(),
            "value"
        );

        let raw = EnvVarBackend::with_prefix("MUXRAW_").replace_underscores(false);
        assert_eq!(raw.value(&ConfigKey::from("MY_VAR")).unwrap().as_str(), "raw");
    }

    #[test]
    fn test_env_backend_all_keys() {
        let mut guard = EnvGuard::new();
        guard.set("MUXKEYS_KEY_1", "value1");
        guard.set("MUXKEYS_KEY_2", "value2");

        let keys = EnvVarBackend::with_prefix("MUXKEYS_").all_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&ConfigKey::from("KEY.1")));
        assert!(keys.contains(&ConfigKey::from("KEY.2")));
    }

    #[test]
    fn test_env_backend_refresh_resnapshots() {
        let mut guard = EnvGuard::new();
        guard.set("MUXRELOAD_TEST", "initial");

        let backend = EnvVarBackend::with_prefix("MUXRELOAD_");
        let key = ConfigKey::from("TEST");
        assert_eq!(backend.value(&key).unwrap().as_str(), "initial");

        guard.set("MUXRELOAD_TEST", "updated");
        assert_eq!(backend.value(&key).unwrap().as_str(), "initial");

        refresh(&backend);
        assert_eq!(backend.value(&key).unwrap().as_str(), "updated");
    }

    #[test]
    fn test_env_backend_pinned_values_survive_refresh() {
        let mut values = HashMap::new();
        values.insert("pinned".to_string(), "yes".to_string());
        let backend = EnvVarBackend::with_values(values);

        refresh(&backend);
        assert_eq!(backend.value(&ConfigKey::from("pinned")).unwrap().as_str(), "yes");
    }

    #[test]
    fn test_env_backend_is_read_only() {
        let backend = EnvVarBackend::with_values(HashMap::new());
        let err = backend
            .write_value(&ConfigKey::from("k"), Some(ConfigValue::from("v")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { operation: "write", .. }));
        assert!(backend.clear().unwrap_err().is_unsupported());
        assert!(backend.listen(std::sync::Arc::new(|| {})).is_none());
    }
}
