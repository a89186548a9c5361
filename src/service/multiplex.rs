// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend multiplexing.
//!
//! [`MultiplexBackend`] composes an ordered list of backends into one logical
//! backend: first-found-wins reads, broadcast writes with error aggregation, fan-in
//! refresh completion and fan-in change subscriptions.

use crate::domain::{Cancellation, ConfigError, ConfigKey, ConfigValue, Result};
use crate::ports::{ChangeCallback, ConfigBackend, RefreshCompletion};
use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

/// A backend that fans operations out to several underlying backends.
///
/// Order matters: reads return the value of the first backend that has one, and
/// aggregated errors list failures in backend order. Writes are not transactional,
/// so a failed broadcast may leave some backends updated.
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::domain::ConfigKey;
/// use muxcfg::ports::ConfigBackend;
/// use muxcfg::service::MultiplexBackend;
/// use std::sync::Arc;
///
/// let overrides = Arc::new(InMemoryBackend::from_pairs([("color", "red")]));
/// let defaults = Arc::new(InMemoryBackend::from_pairs([("color", "blue"), ("size", "xl")]));
/// let multiplex = MultiplexBackend::new(vec![overrides, defaults]);
///
/// assert_eq!(multiplex.value(&ConfigKey::from("color")).unwrap().as_str(), "red");
/// assert_eq!(multiplex.value(&ConfigKey::from("size")).unwrap().as_str(), "xl");
/// ```
#[derive(Clone, Default)]
pub struct MultiplexBackend {
    backends: Vec<Arc<dyn ConfigBackend>>,
}

impl MultiplexBackend {
    /// Creates a multiplexer over the given backends, in query order.
    pub fn new(backends: Vec<Arc<dyn ConfigBackend>>) -> Self {
        Self { backends }
    }

    /// Number of underlying backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` if there are no underlying backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Runs a fallible operation on every backend and collapses the failures.
    fn broadcast<F>(&self, operation: F) -> Result<()>
    where
        F: Fn(&dyn ConfigBackend) -> Result<()>,
    {
        let errors: Vec<ConfigError> = self
            .backends
            .iter()
            .filter_map(|backend| operation(backend.as_ref()).err())
            .collect();
        match ConfigError::aggregate(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl fmt::Debug for MultiplexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|backend| backend.name()))
            .finish()
    }
}

impl ConfigBackend for MultiplexBackend {
    fn name(&self) -> &str {
        "multiplex"
    }

    fn value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.backends.iter().find_map(|backend| backend.value(key))
    }

    fn write_value(&self, key: &ConfigKey, value: Option<ConfigValue>) -> Result<()> {
        self.broadcast(|backend| backend.write_value(key, value.clone()))
    }

    fn refresh(&self, completion: RefreshCompletion) {
        if self.backends.is_empty() {
            completion(Ok(()));
            return;
        }

        let fan_in = Arc::new(RefreshFanIn::new(self.backends.len(), completion));
        for backend in &self.backends {
            let pending = PendingRefresh {
                backend: backend.name().to_string(),
                fan_in: Arc::clone(&fan_in),
                reported: false,
            };
            backend.refresh(Box::new(move |result| pending.report(result)));
        }
    }

    fn listen(&self, callback: ChangeCallback) -> Option<Cancellation> {
        let tokens: Vec<Cancellation> = self
            .backends
            .iter()
            .filter_map(|backend| backend.listen(Arc::clone(&callback)))
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Cancellation::merge(tokens))
        }
    }

    fn all_keys(&self) -> Option<HashSet<ConfigKey>> {
        self.backends
            .iter()
            .filter_map(|backend| backend.all_keys())
            .fold(None, |acc: Option<HashSet<ConfigKey>>, keys| {
                let mut acc = acc.unwrap_or_default();
                acc.extend(keys);
                Some(acc)
            })
    }

    fn clear(&self) -> Result<()> {
        self.broadcast(|backend| backend.clear())
    }
}

/// Shared countdown for one multiplexed refresh.
struct RefreshFanIn {
    state: Mutex<FanInState>,
}

struct FanInState {
    remaining: usize,
    errors: Vec<ConfigError>,
    completion: Option<RefreshCompletion>,
}

impl RefreshFanIn {
    fn new(count: usize, completion: RefreshCompletion) -> Self {
        Self {
            state: Mutex::new(FanInState {
                remaining: count,
                errors: Vec::new(),
                completion: Some(completion),
            }),
        }
    }

    fn complete(&self, result: Result<()>) {
        // Decrement and test under one lock so exactly one caller observes zero.
        let finished = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.remaining = state.remaining.saturating_sub(1);
            if let Err(err) = result {
                state.errors.push(err);
            }
            if state.remaining == 0 {
                let errors = mem::take(&mut state.errors);
                state.completion.take().map(|completion| (completion, errors))
            } else {
                None
            }
        };

        if let Some((completion, errors)) = finished {
            match ConfigError::aggregate(errors) {
                None => completion(Ok(())),
                Some(err) => completion(Err(err)),
            }
        }
    }
}

/// One backend's slot in a fan-in. Reports `RefreshAbandoned` if dropped unused.
struct PendingRefresh {
    backend: String,
    fan_in: Arc<RefreshFanIn>,
    reported: bool,
}

impl PendingRefresh {
    fn report(mut self, result: Result<()>) {
        self.reported = true;
        if let Err(err) = &result {
            tracing::debug!("Backend '{}' failed to refresh: {}", self.backend, err);
        }
        self.fan_in.complete(result);
    }
}

impl Drop for PendingRefresh {
    fn drop(&mut self) {
        if !self.reported {
            tracing::warn!(
                "Backend '{}' dropped its refresh completion without reporting",
                self.backend
            );
            self.fan_in.complete(Err(ConfigError::RefreshAbandoned));
        }
    }
}
