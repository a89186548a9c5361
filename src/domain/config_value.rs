// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw configuration value type.
//!
//! Backends only ever exchange strings. `ConfigValue` wraps that string and offers
//! the parsing helpers typed keys use to decode it.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A raw configuration value as stored by a backend.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::ConfigValue;
///
/// let value = ConfigValue::from("on");
/// assert_eq!(value.as_bool("feature.enabled").unwrap(), true);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValue(String);

impl ConfigValue {
    /// Creates a new `ConfigValue` from a `String`.
    pub fn new(value: String) -> Self {
        ConfigValue(value)
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the value into its inner `String`.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Converts the value to a boolean.
    ///
    /// Recognizes the following values (case-insensitive):
    /// - `true`: "true", "yes", "1", "on"
    /// - `false`: "false", "no", "0", "off"
    pub fn as_bool(&self, key: &str) -> Result<bool> {
        match self.0.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => self
                .0
                .parse::<bool>()
                .map_err(|e| ConfigError::from_parse_bool_error(key.to_string(), e)),
        }
    }

    /// Parses the value into any type that implements `FromStr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use muxcfg::domain::ConfigValue;
    /// use std::net::IpAddr;
    ///
    /// let value = ConfigValue::from("127.0.0.1");
    /// let ip: IpAddr = value.parse("bind.address").unwrap();
    /// assert!(ip.is_loopback());
    /// ```
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.0
            .parse::<T>()
            .map_err(|e| ConfigError::TypeConversionError {
                key: key.to_string(),
                target_type: std::any::type_name::<T>().to_string(),
                source: Arc::new(e),
            })
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue(s.to_string())
    }
}

impl From<ConfigValue> for String {
    fn from(value: ConfigValue) -> Self {
        value.0
    }
}

impl AsRef<str> for ConfigValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[test]
    fn test_as_bool_true_variants() {
        for val in ["true", "True", "YES", "1", "on", " On "] {
            let value = ConfigValue::from(val);
            assert!(value.as_bool("flag").unwrap(), "Failed for value: {}", val);
        }
    }

    #[test]
    fn test_as_bool_false_variants() {
        for val in ["false", "FALSE", "no", "0", "Off"] {
            let value = ConfigValue::from(val);
            assert!(!value.as_bool("flag").unwrap(), "Failed for value: {}", val);
        }
    }

    #[test]
    fn test_as_bool_invalid() {
        let err = ConfigValue::from("maybe").as_bool("flag").unwrap_err();
        assert!(err.to_string().contains("flag"));
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_parse_numbers() {
        let value = ConfigValue::from("42");
        assert_eq!(value.parse::<u16>("port").unwrap(), 42);
        assert_eq!(value.parse::<f64>("ratio").unwrap(), 42.0);
    }

    #[test]
    fn test_parse_custom_type() {
        let ip: IpAddr = ConfigValue::from("::1").parse("bind").unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_parse_invalid_names_target_type() {
        let err = ConfigValue::from("forty-two")
            .parse::<i32>("retries")
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeConversionError { ref key, .. } if key == "retries"));
        assert!(err.to_string().contains("i32"));
    }

    #[test]
    fn test_serde_transparent() {
        use serde::de::value::{Error, StrDeserializer};
        use serde::de::IntoDeserializer;

        let de: StrDeserializer<'_, Error> = "hello".into_deserializer();
        let value = ConfigValue::deserialize(de).unwrap();
        assert_eq!(value.as_str(), "hello");
    }

    #[test]
    fn test_whitespace_preserved() {
        let value = ConfigValue::from("  spaces  ");
        assert_eq!(value.as_str(), "  spaces  ");
        assert_eq!(value.into_string(), "  spaces  ");
    }
}
