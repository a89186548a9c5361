// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refresh and change-notification coordination.
//!
//! A [`Coordinator`] mediates every access to one registered backend set. It routes
//! reads and writes by category, makes sure no two backend-level refreshes overlap,
//! remembers whether a refresh ever succeeded, and multiplexes a single upstream
//! change subscription out to any number of observers.
//!
//! # Lock discipline
//!
//! All bookkeeping lives behind one `RwLock`. Maps and flags are updated while the
//! lock is held; observers, completions and backend calls are always invoked after
//! it has been released, so an observer may call straight back into the
//! coordinator.

use crate::domain::{Cancellation, Category, ConfigKey, ConfigValue, Result};
use crate::ports::{ChangeCallback, ConfigBackend, RefreshCompletion};
use crate::service::multiplex::MultiplexBackend;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// The synchronized session object behind every [`Configs`](crate::service::Configs).
///
/// # Examples
///
/// ```rust
/// use muxcfg::adapters::InMemoryBackend;
/// use muxcfg::domain::{Category, ConfigKey};
/// use muxcfg::ports::ConfigBackend;
/// use muxcfg::service::Coordinator;
/// use std::sync::Arc;
///
/// let secure = Arc::new(InMemoryBackend::from_pairs([("token", "s3cr3t")]));
/// let plain = Arc::new(InMemoryBackend::from_pairs([("token", "visible")]));
/// let coordinator = Coordinator::new(vec![
///     (Category::SECURE, secure as Arc<dyn ConfigBackend>),
///     (Category::INSECURE, plain as Arc<dyn ConfigBackend>),
/// ]);
///
/// let token = ConfigKey::from("token");
/// assert_eq!(coordinator.value(&token, Category::SECURE).unwrap().as_str(), "s3cr3t");
/// assert_eq!(coordinator.value(&token, Category::INSECURE).unwrap().as_str(), "visible");
/// ```
pub struct Coordinator {
    /// Registered backends, most specific category first.
    backends: Vec<(Category, Arc<dyn ConfigBackend>)>,
    state: Arc<RwLock<CoordinatorState>>,
}

#[derive(Default)]
struct CoordinatorState {
    did_fetch: bool,
    fetch_in_flight: bool,
    /// Completions waiting on the in-flight refresh. Completions are only `Send`,
    /// the mutex makes the state `Sync`.
    pending: Mutex<Vec<RefreshCompletion>>,
    observers: HashMap<u64, ChangeCallback>,
    next_observer_id: u64,
    /// Set while an upstream subscription is wanted (it may still be in progress).
    listening: bool,
    upstream: Option<Cancellation>,
}

impl CoordinatorState {
    /// Marks a refresh as started. Returns `false` if one is already running.
    fn begin_refresh(&mut self) -> bool {
        if self.fetch_in_flight {
            false
        } else {
            self.fetch_in_flight = true;
            true
        }
    }
}

fn read(state: &RwLock<CoordinatorState>) -> RwLockReadGuard<'_, CoordinatorState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &RwLock<CoordinatorState>) -> RwLockWriteGuard<'_, CoordinatorState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

impl Coordinator {
    /// Creates a coordinator over a category-to-backend mapping.
    ///
    /// A category listed twice keeps its last backend.
    pub fn new<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = (Category, Arc<dyn ConfigBackend>)>,
    {
        let unique: HashMap<Category, Arc<dyn ConfigBackend>> = handlers.into_iter().collect();
        let mut backends: Vec<(Category, Arc<dyn ConfigBackend>)> = unique.into_iter().collect();
        backends.sort_by_key(|(category, _)| category.specificity());

        tracing::debug!(
            "Coordinator created with backends: {:?}",
            backends
                .iter()
                .map(|(category, backend)| format!("{}@{}", backend.name(), category))
                .collect::<Vec<_>>()
        );

        Self {
            backends,
            state: Arc::new(RwLock::new(CoordinatorState::default())),
        }
    }

    /// Multiplexes the backends registered under a superset of `category`.
    pub fn backend_for(&self, category: Category) -> MultiplexBackend {
        MultiplexBackend::new(
            self.backends
                .iter()
                .filter(|(registered, _)| registered.is_superset_of(category))
                .map(|(_, backend)| Arc::clone(backend))
                .collect(),
        )
    }

    /// Multiplexes every registered backend. Refreshes and change subscriptions
    /// always target this selection.
    fn all_backends(&self) -> MultiplexBackend {
        MultiplexBackend::new(
            self.backends
                .iter()
                .map(|(_, backend)| Arc::clone(backend))
                .collect(),
        )
    }

    /// Reads a raw value from the backends routed for `category`.
    pub fn value(&self, key: &ConfigKey, category: Category) -> Option<ConfigValue> {
        self.backend_for(category).value(key)
    }

    /// Writes (or with `None`, deletes) a raw value in every backend routed for `category`.
    pub fn write_value(
        &self,
        key: &ConfigKey,
        value: Option<ConfigValue>,
        category: Category,
    ) -> Result<()> {
        self.backend_for(category).write_value(key, value)
    }

    /// Every key known to the backends routed for `category`.
    ///
    /// Empty when none of them supports enumeration.
    pub fn all_keys(&self, category: Category) -> HashSet<ConfigKey> {
        self.backend_for(category).all_keys().unwrap_or_default()
    }

    /// Clears every backend routed for `category`.
    pub fn clear(&self, category: Category) -> Result<()> {
        self.backend_for(category).clear()
    }

    /// Returns `true` once any refresh has succeeded.
    pub fn did_fetch(&self) -> bool {
        read(&self.state).did_fetch
    }

    /// Returns `true` while a backend-level refresh is outstanding.
    pub fn is_refreshing(&self) -> bool {
        read(&self.state).fetch_in_flight
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        read(&self.state).observers.len()
    }

    /// Returns `true` while an upstream change subscription is held.
    pub fn is_listening_upstream(&self) -> bool {
        read(&self.state).upstream.is_some()
    }

    /// Refreshes every backend.
    ///
    /// If a refresh is already running no new one is started; `completion` is queued
    /// and receives the outcome of the running refresh. On success every current
    /// observer is notified before the completions run.
    pub fn refresh(&self, completion: RefreshCompletion) {
        let start = {
            let mut state = write(&self.state);
            state
                .pending
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .push(completion);
            state.begin_refresh()
        };
        if start {
            self.start_refresh();
        } else {
            tracing::debug!("Refresh already in flight, queueing completion");
        }
    }

    /// Issues the backend-level refresh. The caller must have won `begin_refresh`.
    fn start_refresh(&self) {
        tracing::debug!("Refreshing {} configuration backends", self.backends.len());
        let state = Arc::clone(&self.state);
        self.all_backends()
            .refresh(Box::new(move |result| finish_refresh(&state, result)));
    }

    /// Registers an observer of configuration changes.
    ///
    /// The first observer triggers a best-effort warm-up refresh if nothing has been
    /// fetched yet and opens the single upstream subscription. If a refresh already
    /// succeeded the observer is invoked once before this returns. Cancelling the
    /// last observer tears the upstream subscription down.
    pub fn listen(&self, observer: ChangeCallback) -> Cancellation {
        let did_fetch = self.did_fetch();
        let warm_up = !did_fetch && write(&self.state).begin_refresh();
        if warm_up {
            self.start_refresh();
        }

        let (id, subscribe) = {
            let mut state = write(&self.state);
            let id = state.next_observer_id;
            state.next_observer_id += 1;
            state.observers.insert(id, Arc::clone(&observer));
            let subscribe = !state.listening;
            state.listening = true;
            (id, subscribe)
        };
        if subscribe {
            self.subscribe_upstream();
        }

        if did_fetch {
            observer();
        }

        let state = Arc::downgrade(&self.state);
        Cancellation::new(move || remove_observer(&state, id))
    }

    fn subscribe_upstream(&self) {
        let weak = Arc::downgrade(&self.state);
        let fan_out: ChangeCallback = Arc::new(move || {
            if let Some(state) = weak.upgrade() {
                notify_observers(&state);
            }
        });

        let token = self.all_backends().listen(fan_out);
        if token.is_none() {
            tracing::debug!("No configuration backend supports change notification");
        }

        // Keep the token only if it is still wanted and no other subscription won.
        let stale = {
            let mut state = write(&self.state);
            match token {
                Some(token) if state.listening && state.upstream.is_none() => {
                    state.upstream = Some(token);
                    None
                }
                other => other,
            }
        };
        if let Some(token) = stale {
            token.cancel();
        }
    }
}

fn notify_observers(state: &RwLock<CoordinatorState>) {
    let observers: Vec<ChangeCallback> = read(state).observers.values().cloned().collect();
    for observer in observers {
        observer();
    }
}

fn finish_refresh(state: &RwLock<CoordinatorState>, result: Result<()>) {
    let (observers, completions) = {
        let mut state = write(state);
        state.fetch_in_flight = false;
        let completions = mem::take(
            state
                .pending
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let observers: Vec<ChangeCallback> = if result.is_ok() {
            state.did_fetch = true;
            state.observers.values().cloned().collect()
        } else {
            Vec::new()
        };
        (observers, completions)
    };

    match &result {
        Ok(()) => tracing::debug!(
            "Configuration refresh succeeded, notifying {} observers",
            observers.len()
        ),
        Err(e) => tracing::warn!("Configuration refresh failed: {}", e),
    }

    for observer in observers {
        observer();
    }
    for completion in completions {
        completion(result.clone());
    }
}

fn remove_observer(state: &Weak<RwLock<CoordinatorState>>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let upstream = {
        let mut state = write(&state);
        if state.observers.remove(&id).is_none() || !state.observers.is_empty() {
            None
        } else {
            state.listening = false;
            state.upstream.take()
        }
    };
    if let Some(token) = upstream {
        tracing::debug!("Last observer cancelled, closing upstream subscription");
        token.cancel();
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = read(&self.state);
        f.debug_struct("Coordinator")
            .field(
                "backends",
                &self
                    .backends
                    .iter()
                    .map(|(category, backend)| (*category, backend.name()))
                    .collect::<Vec<_>>(),
            )
            .field("did_fetch", &state.did_fetch)
            .field("fetch_in_flight", &state.fetch_in_flight)
            .field("observers", &state.observers.len())
            .finish()
    }
}
