// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instrumented backends shared by the integration tests.

use muxcfg::adapters::InMemoryBackend;
use muxcfg::domain::{Cancellation, ConfigError, ConfigKey, ConfigValue, Result};
use muxcfg::ports::{ChangeCallback, ConfigBackend, RefreshCompletion};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory backend that counts refreshes and upstream subscriptions.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingBackend {
    inner: InMemoryBackend,
    refreshes: AtomicUsize,
    subscriptions: Arc<AtomicUsize>,
    cancellations: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingBackend {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            inner: InMemoryBackend::from_pairs(pairs.iter().copied()),
            ..Self::default()
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.inner.set(key, value);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Subscriptions opened and not yet cancelled.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions() - self.cancellations()
    }
}

impl ConfigBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.inner.value(key)
    }

    fn write_value(&self, key: &ConfigKey, value: Option<ConfigValue>) -> Result<()> {
        self.inner.write_value(key, value)
    }

    fn refresh(&self, completion: RefreshCompletion) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh(completion);
    }

    fn listen(&self, callback: ChangeCallback) -> Option<Cancellation> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let token = self.inner.listen(callback)?;
        let cancellations = Arc::clone(&self.cancellations);
        Some(Cancellation::new(move || {
            cancellations.fetch_add(1, Ordering::SeqCst);
            token.cancel();
        }))
    }

    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        self.inner.all_keys()
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// Backend whose refreshes complete only when the test releases them.
#[allow(dead_code)]
#[derive(Default)]
pub struct ManualBackend {
    refreshes: AtomicUsize,
    held: Mutex<Vec<RefreshCompletion>>,
}

#[allow(dead_code)]
impl ManualBackend {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Completes every held refresh with `result`.
    pub fn release(&self, result: Result<()>) {
        let held: Vec<RefreshCompletion> = std::mem::take(&mut *self.held.lock().unwrap());
        for completion in held {
            completion(result.clone());
        }
    }
}

impl ConfigBackend for ManualBackend {
    fn name(&self) -> &str {
        "manual"
    }

    fn value(&self, _key: &ConfigKey) -> Option<ConfigValue> {
        None
    }

    fn refresh(&self, completion: RefreshCompletion) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.held.lock().unwrap().push(completion);
    }
}

/// Backend failing every fallible operation with a named error.
#[allow(dead_code)]
pub struct FailingBackend {
    name: String,
}

#[allow(dead_code)]
impl FailingBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn error(&self) -> ConfigError {
        ConfigError::BackendError {
            backend: self.name.clone(),
            message: "unavailable".to_string(),
            source: None,
        }
    }
}

impl ConfigBackend for FailingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, _key: &ConfigKey) -> Option<ConfigValue> {
        None
    }

    fn write_value(&self, _key: &ConfigKey, _value: Option<ConfigValue>) -> Result<()> {
        Err(self.error())
    }

    fn refresh(&self, completion: RefreshCompletion) {
        completion(Err(self.error()));
    }

    fn clear(&self) -> Result<()> {
        Err(self.error())
    }
}

/// Name of the backend an error came from.
#[allow(dead_code)]
pub fn failing_backend(err: &ConfigError) -> &str {
    match err {
        ConfigError::BackendError { backend, .. } | ConfigError::Unsupported { backend, .. } => {
            backend
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Installs a test subscriber so `RUST_LOG`-style output is visible with `--nocapture`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
