// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-callback bookkeeping shared by the local backends.

use crate::domain::Cancellation;
use crate::ports::ChangeCallback;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Registered change callbacks, shared with the cancellation tokens handed out.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<u64, ChangeCallback>>,
}

impl Listeners {
    pub(crate) fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Registers a callback. Cancelling the token unregisters it.
    pub(crate) fn subscribe(self: &Arc<Self>, callback: ChangeCallback) -> Cancellation {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);

        let listeners = Arc::downgrade(self);
        Cancellation::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .callbacks
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
            }
        })
    }

    /// Invokes every callback outside the lock.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<ChangeCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in snapshot {
            callback();
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}
