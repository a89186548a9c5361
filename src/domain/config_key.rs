// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat configuration key newtype.
//!
//! Keys are opaque, flat string identifiers. There is no hierarchy or query syntax:
//! `"database.host"` is one key, not a path.

use std::borrow::Borrow;
use std::fmt;

/// A flat, backend-level configuration key.
///
/// Backends store and look up raw string values by `ConfigKey`. Typed access goes
/// through [`TypedKey`](crate::domain::TypedKey), which carries a `ConfigKey` name plus
/// the decoding rules.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::ConfigKey;
///
/// let key = ConfigKey::from("feature.enabled");
/// assert_eq!(key.as_str(), "feature.enabled");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Creates a new `ConfigKey` from a `String`.
    pub fn new(key: String) -> Self {
        ConfigKey(key)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the `ConfigKey` into its inner `String`.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ConfigKey {
    fn from(s: String) -> Self {
        ConfigKey(s)
    }
}

impl From<&str> for ConfigKey {
    fn from(s: &str) -> Self {
        ConfigKey(s.to_string())
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashMap<ConfigKey, _>` and `HashSet<ConfigKey>` be queried with `&str`.
impl Borrow<str> for ConfigKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn test_config_key_from_str() {
        let key = ConfigKey::from("flag");
        assert_eq!(key.as_str(), "flag");
        assert_eq!(key.to_string(), "flag");
    }

    #[test]
    fn test_config_key_round_trip_string() {
        let key = ConfigKey::new("remote.timeout".to_string());
        let s: String = key.clone().into();
        assert_eq!(s, "remote.timeout");
        assert_eq!(key.into_string(), "remote.timeout");
    }

    #[test]
    fn test_config_key_borrow_lookup() {
        let mut keys = HashSet::new();
        keys.insert(ConfigKey::from("a"));
        keys.insert(ConfigKey::from("b"));

        assert!(keys.contains("a"));
        assert!(!keys.contains("c"));
    }

    #[test]
    fn test_config_key_ordering() {
        let keys: BTreeSet<ConfigKey> = ["c", "a", "b"].into_iter().map(ConfigKey::from).collect();
        let ordered: Vec<&str> = keys.iter().map(ConfigKey::as_str).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_config_key_empty() {
        let key = ConfigKey::from("");
        assert_eq!(key.as_str(), "");
    }
}
