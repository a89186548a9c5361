// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML file configuration backend.
//!
//! This module provides a persisted key-value backend stored in a YAML file, and the
//! [`YamlParser`] used to read and write it.

use crate::adapters::listeners::Listeners;
use crate::domain::{Cancellation, ConfigError, ConfigKey, ConfigValue, Result};
use crate::ports::{ChangeCallback, ConfigBackend, ConfigParser, RefreshCompletion};
use directories::ProjectDirs;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[cfg(feature = "reload")]
use crate::adapters::watchers::FileWatcher;
#[cfg(feature = "reload")]
use std::sync::Weak;

/// Maximum allowed file size for YAML configuration files (10MB)
/// This prevents denial of service attacks via extremely large files
const MAX_YAML_FILE_SIZE: u64 = 10 * 1024 * 1024;

const BACKEND_NAME: &str = "yaml-file";

/// YAML parser implementation.
///
/// Parsing flattens nested structures into dot notation keys. Rendering writes the
/// flat map back as a single YAML mapping, which parses to the same map.
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::YamlParser;
/// use muxcfg::ports::ConfigParser;
///
/// let parser = YamlParser::new();
/// let yaml_content = "database:\n  host: localhost\n  port: 5432";
/// let result = parser.parse(yaml_content).unwrap();
/// assert_eq!(result.get("database.host"), Some(&"localhost".to_string()));
///
/// let rendered = parser.render(&result).unwrap();
/// assert_eq!(parser.parse(&rendered).unwrap(), result);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Creates a new YAML parser.
    pub fn new() -> Self {
        YamlParser
    }

    /// Flattens a YAML value into a flat map with dot notation keys.
    fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, result: &mut BTreeMap<String, String>) {
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, val) in map {
                    let key_str = match key {
                        serde_yaml::Value::String(s) => s.clone(),
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        _ => continue,
                    };
                    let new_prefix = if prefix.is_empty() {
                        key_str
                    } else {
                        format!("{}.{}", prefix, key_str)
                    };
                    Self::flatten_yaml(val, &new_prefix, result);
                }
            }
            serde_yaml::Value::Sequence(seq) => {
                for (i, val) in seq.iter().enumerate() {
                    let new_prefix = format!("{}.{}", prefix, i);
                    Self::flatten_yaml(val, &new_prefix, result);
                }
            }
            // A bare scalar document has no key to live under.
            _ if prefix.is_empty() => {}
            serde_yaml::Value::String(s) => {
                result.insert(prefix.to_string(), s.clone());
            }
            serde_yaml::Value::Number(n) => {
                result.insert(prefix.to_string(), n.to_string());
            }
            serde_yaml::Value::Bool(b) => {
                result.insert(prefix.to_string(), b.to_string());
            }
            serde_yaml::Value::Null => {
                result.insert(prefix.to_string(), String::new());
            }
            serde_yaml::Value::Tagged(tagged) => {
                Self::flatten_yaml(&tagged.value, prefix, result);
            }
        }
    }
}

impl ConfigParser for YamlParser {
    fn parse(&self, content: &str) -> Result<BTreeMap<String, String>> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to parse YAML: {}", e),
                source: Some(Arc::new(e)),
            })?;

        let mut result = BTreeMap::new();
        Self::flatten_yaml(&value, "", &mut result);
        Ok(result)
    }

    fn render(&self, values: &BTreeMap<String, String>) -> Result<String> {
        if values.is_empty() {
            return Ok(String::new());
        }
        serde_yaml::to_string(values).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to render YAML: {}", e),
            source: Some(Arc::new(e)),
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

/// File contents and the callbacks interested in them.
#[derive(Debug)]
struct YamlStore {
    file_path: PathBuf,
    parser: YamlParser,
    values: RwLock<BTreeMap<String, String>>,
    /// Serializes file access so a reload cannot undo a concurrent write.
    file_lock: Mutex<()>,
    listeners: Arc<Listeners>,
}

impl YamlStore {
    fn read_file(&self) -> Result<BTreeMap<String, String>> {
        let content = read_bounded(&self.file_path)?;
        self.parser.parse(&content)
    }

    /// Re-reads the file. Returns `true` if the stored values changed.
    ///
    /// Readers are only blocked for the final swap, not for the disk read.
    fn reload(&self) -> Result<bool> {
        let _file = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = self.read_file()?;
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        if *values == fresh {
            Ok(false)
        } else {
            *values = fresh;
            Ok(true)
        }
    }

    /// Applies `mutate` to the values and writes the result to disk.
    fn persist<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        {
            let _file = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut updated = self
                .values
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            mutate(&mut updated);
            let content = self.parser.render(&updated)?;
            fs::write(&self.file_path, content).map_err(|e| {
                ConfigError::backend(
                    BACKEND_NAME,
                    format!("Failed to write configuration file: {}", display_name(&self.file_path)),
                    e,
                )
            })?;
            *self.values.write().unwrap_or_else(PoisonError::into_inner) = updated;
        }
        self.listeners.notify();
        Ok(())
    }
}

/// Persisted key-value backend stored in a YAML file.
///
/// Nested YAML is flattened into dot notation keys on load. Writes and clears update
/// the in-memory values and rewrite the whole file as a flat mapping. Refreshing
/// re-reads the file.
///
/// Listeners are notified on every local write. With the `reload` feature the file
/// is also watched while anyone listens, and external edits that change the values
/// notify listeners too.
///
/// # Examples
///
/// ```rust,no_run
/// use muxcfg::adapters::YamlFileBackend;
///
/// // Load from a specific file
/// let backend = YamlFileBackend::from_file("/path/to/config.yaml").unwrap();
///
/// // Load from default OS location
/// let backend = YamlFileBackend::from_default_location("myapp", "com.example").unwrap();
/// ```
#[derive(Debug)]
pub struct YamlFileBackend {
    store: Arc<YamlStore>,
    #[cfg(feature = "reload")]
    watcher: Arc<Mutex<Option<FileWatcher>>>,
}

impl YamlFileBackend {
    /// Opens an existing YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::BackendError`] if the file is missing, unreadable or
    /// too large, and a [`ConfigError::ParseError`] if it is not valid YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();

        // Canonicalize path to prevent directory traversal attacks
        let canonical_path = file_path.canonicalize().map_err(|e| {
            ConfigError::backend(
                BACKEND_NAME,
                format!("Invalid or inaccessible path: {}", display_name(file_path)),
                e,
            )
        })?;

        let parser = YamlParser::new();
        let values = parser.parse(&read_bounded(&canonical_path)?)?;
        tracing::debug!(
            "Loaded {} values from {}",
            values.len(),
            canonical_path.display()
        );

        Ok(Self::with_store(YamlStore {
            file_path: canonical_path,
            parser,
            values: RwLock::new(values),
            file_lock: Mutex::default(),
            listeners: Arc::default(),
        }))
    }

    /// Opens a YAML file, creating it and its parent directories if missing.
    ///
    /// # Errors
    ///
    /// See [`YamlFileBackend::from_file`].
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();
        if !file_path.exists() {
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::backend(
                        BACKEND_NAME,
                        format!("Failed to create configuration directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
            fs::write(file_path, "").map_err(|e| {
                ConfigError::backend(
                    BACKEND_NAME,
                    format!("Failed to create configuration file: {}", display_name(file_path)),
                    e,
                )
            })?;
            tracing::info!("Created configuration file {}", file_path.display());
        }
        Self::from_file(file_path)
    }

    /// Opens `config.yaml` in the OS-appropriate configuration directory.
    ///
    /// # Arguments
    ///
    /// * `app_name` - The application name (e.g., "myapp")
    /// * `qualifier` - The organization/qualifier (e.g., "com.example")
    ///
    /// # Errors
    ///
    /// Fails if no configuration directory can be determined, or as
    /// [`YamlFileBackend::from_file`] does.
    pub fn from_default_location(app_name: &str, qualifier: &str) -> Result<Self> {
        Self::with_filename(app_name, qualifier, "config.yaml")
    }

    /// Opens a custom file name in the OS-appropriate configuration directory.
    ///
    /// # Errors
    ///
    /// See [`YamlFileBackend::from_default_location`].
    pub fn with_filename(app_name: &str, qualifier: &str, filename: &str) -> Result<Self> {
        let proj_dirs = ProjectDirs::from(qualifier, "", app_name).ok_or_else(|| {
            ConfigError::BackendError {
                backend: BACKEND_NAME.to_string(),
                message: "Failed to determine project directories".to_string(),
                source: None,
            }
        })?;

        Self::from_file(proj_dirs.config_dir().join(filename))
    }

    fn with_store(store: YamlStore) -> Self {
        Self {
            store: Arc::new(store),
            #[cfg(feature = "reload")]
            watcher: Arc::default(),
        }
    }

    /// Returns the canonical path of the configuration file.
    pub fn file_path(&self) -> &Path {
        &self.store.file_path
    }

    /// Returns `true` while the file is being watched for external edits.
    #[cfg(feature = "reload")]
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(FileWatcher::is_running)
    }

    /// Starts the watcher unless one is already running in `slot`.
    #[cfg(feature = "reload")]
    fn start_watching(&self, slot: &mut Option<FileWatcher>) {
        if slot.is_some() {
            return;
        }

        let store: Weak<YamlStore> = Arc::downgrade(&self.store);
        let started = FileWatcher::new(&self.store.file_path, None).and_then(|mut watcher| {
            watcher.watch(Arc::new(move || {
                let Some(store) = store.upgrade() else {
                    return;
                };
                match store.reload() {
                    Ok(true) => store.listeners.notify(),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Failed to reload {}: {}", store.file_path.display(), e),
                }
            }))?;
            Ok(watcher)
        });

        match started {
            Ok(watcher) => *slot = Some(watcher),
            Err(e) => tracing::warn!(
                "Not watching {} for changes: {}",
                self.store.file_path.display(),
                e
            ),
        }
    }

    /// Subscribes `callback` and keeps the watcher running until the last
    /// subscription is cancelled.
    ///
    /// Subscribing and starting, and the idle check and teardown, each happen under
    /// the watcher lock, so a new listener never loses its watcher to a cancel.
    #[cfg(feature = "reload")]
    fn subscribe_watched(&self, callback: ChangeCallback) -> Cancellation {
        let token = {
            let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
            let token = self.store.listeners.subscribe(callback);
            self.start_watching(&mut slot);
            token
        };

        let listeners = Arc::downgrade(&self.store.listeners);
        let watcher = Arc::downgrade(&self.watcher);
        Cancellation::new(move || {
            let Some(watcher) = watcher.upgrade() else {
                token.cancel();
                return;
            };
            let stopped = {
                let mut slot = watcher.lock().unwrap_or_else(PoisonError::into_inner);
                token.cancel();
                let idle = !listeners.upgrade().is_some_and(|l| l.len() > 0);
                if idle {
                    slot.take()
                } else {
                    None
                }
            };
            // Stopped outside the lock: the watcher thread may be cancelling too.
            if let Some(mut stopped) = stopped {
                if let Err(e) = stopped.stop() {
                    tracing::warn!("Failed to stop file watcher: {}", e);
                }
            }
        })
    }
}

impl ConfigBackend for YamlFileBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.store
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .map(|v| ConfigValue::from(v.as_str()))
    }

    fn write_value(&self, key: &ConfigKey, value: Option<ConfigValue>) -> Result<()> {
        self.store.persist(|values| match value {
            Some(value) => {
                values.insert(key.as_str().to_string(), value.into_string());
            }
            None => {
                values.remove(key.as_str());
            }
        })
    }

    fn refresh(&self, completion: RefreshCompletion) {
        completion(self.store.reload().map(|_| ()));
    }

    fn listen(&self, callback: ChangeCallback) -> Option<Cancellation> {
        #[cfg(feature = "reload")]
        let token = self.subscribe_watched(callback);
        #[cfg(not(feature = "reload"))]
        let token = self.store.listeners.subscribe(callback);
        Some(token)
    }

    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        Some(
            self.store
                .values
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .map(|k| ConfigKey::from(k.as_str()))
                .collect(),
        )
    }

    fn clear(&self) -> Result<()> {
        self.store.persist(BTreeMap::clear)
    }
}

/// Reads a file after checking its size.
fn read_bounded(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| {
        ConfigError::backend(
            BACKEND_NAME,
            format!("Failed to read file metadata: {}", display_name(path)),
            e,
        )
    })?;

    if metadata.len() > MAX_YAML_FILE_SIZE {
        return Err(ConfigError::BackendError {
            backend: BACKEND_NAME.to_string(),
            message: format!(
                "Configuration file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_YAML_FILE_SIZE
            ),
            source: None,
        });
    }

    fs::read_to_string(path).map_err(|e| {
        ConfigError::backend(
            BACKEND_NAME,
            format!("Failed to read configuration file: {}", display_name(path)),
            e,
        )
    })
}

/// File name only, so errors do not leak directory layout.
fn display_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
}
