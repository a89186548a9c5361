// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed configuration keys.
//!
//! A [`TypedKey`] pairs a flat key name with the category it is read from, the
//! category it is written to, and the rules for turning the stored string into a
//! value of type `T` and back.

use crate::domain::{Category, ConfigKey, ConfigValue};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type Decoder<T> = Arc<dyn Fn(&str) -> Option<T> + Send + Sync>;
type Encoder<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;
type DefaultFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A typed, immutable configuration key declaration.
///
/// Keys are cheap to clone. Nothing enforces unique names: two keys may share a name
/// across categories, and keeping them consistent is up to the caller.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::{Category, TypedKey};
///
/// let retries = TypedKey::parsed("http.retries", 3u32).from_category(Category::REMOTE);
/// assert_eq!(retries.name().as_str(), "http.retries");
/// assert_eq!(retries.decode("5"), Some(5));
/// assert_eq!(retries.decode("five"), None);
/// assert_eq!(retries.default_value(), 3);
/// assert_eq!(retries.encode(&7).as_deref(), Some("7"));
/// ```
pub struct TypedKey<T> {
    name: ConfigKey,
    read_category: Category,
    write_category: Option<Category>,
    decode: Decoder<T>,
    encode: Option<Encoder<T>>,
    default: DefaultFn<T>,
}

impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            read_category: self.read_category,
            write_category: self.write_category,
            decode: Arc::clone(&self.decode),
            encode: self.encode.clone(),
            default: Arc::clone(&self.default),
        }
    }
}

impl<T: 'static> TypedKey<T> {
    /// Creates a read-only key with a custom decoder.
    ///
    /// Use [`TypedKey::with_encoder`] to make it writable.
    pub fn new<D>(name: impl Into<ConfigKey>, decode: D, default: T) -> Self
    where
        D: Fn(&str) -> Option<T> + Send + Sync + 'static,
        T: Clone + Send + Sync,
    {
        Self {
            name: name.into(),
            read_category: Category::DEFAULT,
            write_category: None,
            decode: Arc::new(decode),
            encode: None,
            default: Arc::new(move || default.clone()),
        }
    }

    /// Replaces the default with a lazily evaluated one.
    pub fn with_default_fn<F>(mut self, default: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default = Arc::new(default);
        self
    }

    /// Sets the encoder, making the key writable.
    ///
    /// An encoder returning `None` marks that particular value as unwritable.
    pub fn with_encoder<E>(mut self, encode: E) -> Self
    where
        E: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.encode = Some(Arc::new(encode));
        self
    }

    /// Drops the encoder so writes through this key are ignored.
    pub fn read_only(mut self) -> Self {
        self.encode = None;
        self
    }

    /// Sets the category values are read from.
    pub fn from_category(mut self, category: Category) -> Self {
        self.read_category = category;
        self
    }

    /// Sets the category values are written to.
    pub fn to_category(mut self, category: Category) -> Self {
        self.write_category = Some(category);
        self
    }
}

impl<T> TypedKey<T>
where
    T: FromStr + fmt::Display + Clone + Send + Sync + 'static,
{
    /// Creates a writable key for any type with a lossless string form.
    pub fn parsed(name: impl Into<ConfigKey>, default: T) -> Self {
        let name = name.into();
        let key_name = name.as_str().to_string();
        Self::new(
            name,
            move |raw: &str| match raw.parse::<T>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::debug!("Stored value for key '{}' does not parse", key_name);
                    None
                }
            },
            default,
        )
        .with_encoder(|value: &T| Some(value.to_string()))
    }
}

impl TypedKey<bool> {
    /// Creates a writable boolean key with lenient decoding.
    ///
    /// Accepts `true/yes/1/on` and `false/no/0/off` in any case.
    ///
    /// ```
    /// use muxcfg::domain::TypedKey;
    ///
    /// let flag = TypedKey::boolean("flag", false);
    /// assert_eq!(flag.decode("YES"), Some(true));
    /// assert_eq!(flag.decode("maybe"), None);
    /// ```
    pub fn boolean(name: impl Into<ConfigKey>, default: bool) -> Self {
        let name = name.into();
        let key_name = name.as_str().to_string();
        Self::new(
            name,
            move |raw: &str| ConfigValue::from(raw).as_bool(&key_name).ok(),
            default,
        )
        .with_encoder(|value: &bool| Some(value.to_string()))
    }
}

#[cfg(feature = "json")]
impl<T> TypedKey<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a writable key whose value is stored as JSON.
    pub fn json(name: impl Into<ConfigKey>, default: T) -> Self {
        let name = name.into();
        let key_name = name.as_str().to_string();
        Self::new(
            name,
            move |raw: &str| match serde_json::from_str(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Stored JSON for key '{}' does not decode: {}", key_name, e);
                    None
                }
            },
            default,
        )
        .with_encoder(|value: &T| serde_json::to_string(value).ok())
    }
}

impl<T> TypedKey<T> {
    /// The flat key name.
    pub fn name(&self) -> &ConfigKey {
        &self.name
    }

    /// The category values are read from.
    pub fn read_category(&self) -> Category {
        self.read_category
    }

    /// The category values are written to, falling back to the read category.
    pub fn write_category(&self) -> Category {
        self.write_category.unwrap_or(self.read_category)
    }

    /// Returns `true` if the key has an encoder.
    pub fn is_writable(&self) -> bool {
        self.encode.is_some()
    }

    /// Decodes a stored string, `None` if it is malformed.
    pub fn decode(&self, raw: &str) -> Option<T> {
        (self.decode)(raw)
    }

    /// Encodes a value for storage, `None` if the key cannot store it.
    pub fn encode(&self, value: &T) -> Option<String> {
        self.encode.as_ref().and_then(|encode| encode(value))
    }

    /// Evaluates the default value.
    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedKey")
            .field("name", &self.name)
            .field("read_category", &self.read_category)
            .field("write_category", &self.write_category)
            .field("writable", &self.encode.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_key() {
        let key = TypedKey::parsed("port", 8080u16);
        assert_eq!(key.decode("9090"), Some(9090));
        assert_eq!(key.decode("-1"), None);
        assert_eq!(key.encode(&443).as_deref(), Some("443"));
        assert_eq!(key.default_value(), 8080);
        assert!(key.is_writable());
    }

    #[test]
    fn test_custom_decoder_is_read_only() {
        let key = TypedKey::new("upper", |raw: &str| Some(raw.to_uppercase()), String::new());
        assert_eq!(key.decode("abc").as_deref(), Some("ABC"));
        assert!(!key.is_writable());
        assert_eq!(key.encode(&"x".to_string()), None);
    }

    #[test]
    fn test_read_only_drops_encoder() {
        let key = TypedKey::parsed("name", String::from("anon")).read_only();
        assert!(!key.is_writable());
    }

    #[test]
    fn test_encoder_may_refuse_values() {
        let key = TypedKey::parsed("level", 1i32)
            .with_encoder(|value: &i32| (*value >= 0).then(|| value.to_string()));
        assert_eq!(key.encode(&3).as_deref(), Some("3"));
        assert_eq!(key.encode(&-3), None);
    }

    #[test]
    fn test_categories() {
        let key = TypedKey::boolean("flag", false);
        assert_eq!(key.read_category(), Category::DEFAULT);
        assert_eq!(key.write_category(), Category::DEFAULT);

        let key = key.from_category(Category::REMOTE);
        assert_eq!(key.write_category(), Category::REMOTE);

        let key = key.to_category(Category::INSECURE);
        assert_eq!(key.read_category(), Category::REMOTE);
        assert_eq!(key.write_category(), Category::INSECURE);
    }

    #[test]
    fn test_default_fn_is_lazy() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let key = TypedKey::parsed("n", 0u64).with_default_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst) as u64 + 10
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(key.default_value(), 10);
        assert_eq!(key.default_value(), 11);
    }

    #[test]
    fn test_boolean_key() {
        let key = TypedKey::boolean("flag", true);
        assert_eq!(key.decode("off"), Some(false));
        assert_eq!(key.decode("On"), Some(true));
        assert_eq!(key.decode("2"), None);
        assert_eq!(key.encode(&false).as_deref(), Some("false"));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_key() {
        use serde::{Deserialize, Serialize};

        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        struct Limits {
            max: u32,
            burst: u32,
        }

        let key = TypedKey::json("limits", Limits { max: 1, burst: 1 });
        let stored = key.encode(&Limits { max: 10, burst: 20 }).unwrap();
        assert_eq!(key.decode(&stored), Some(Limits { max: 10, burst: 20 }));
        assert_eq!(key.decode("{not json"), None);
    }

    #[test]
    fn test_clone_shares_closures() {
        let key = TypedKey::parsed("x", 1i8);
        let copy = key.clone();
        assert_eq!(copy.name(), key.name());
        assert_eq!(copy.decode("5"), Some(5));
    }

    #[test]
    fn test_debug_output() {
        let key = TypedKey::boolean("flag", false);
        let debug = format!("{:?}", key);
        assert!(debug.contains("flag"));
        assert!(debug.contains("writable: true"));
    }
}
