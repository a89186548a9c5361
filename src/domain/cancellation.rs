// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent cancellation handles.

use std::fmt;
use std::sync::{Mutex, PoisonError};

type CancelAction = Box<dyn FnOnce() + Send>;

/// A single-shot handle that tears down a subscription.
///
/// Calling [`Cancellation::cancel`] runs the wrapped action at most once; every later
/// call is a no-op. Dropping the handle does not cancel anything.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::Cancellation;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&calls);
/// let token = Cancellation::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// token.cancel();
/// token.cancel();
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct Cancellation {
    action: Mutex<Option<CancelAction>>,
}

impl Cancellation {
    /// Wraps a cancellation action.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// A token with nothing to cancel.
    pub fn noop() -> Self {
        Self {
            action: Mutex::new(None),
        }
    }

    /// Combines several tokens into one that cancels all of them, in order.
    pub fn merge(tokens: Vec<Cancellation>) -> Self {
        Self::new(move || {
            for token in &tokens {
                token.cancel();
            }
        })
    }

    /// Runs the cancellation action if it has not run yet.
    pub fn cancel(&self) {
        // Take the action out before running it so a re-entrant cancel sees `None`.
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns `true` once the action has run (or if there never was one).
    pub fn is_cancelled(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn counting() -> (Arc<AtomicUsize>, Cancellation) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let token = Cancellation::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (calls, token)
    }

    #[test]
    fn test_cancel_runs_once() {
        let (calls, token) = counting();
        assert!(!token.is_cancelled());

        token.cancel();
        token.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_drop_does_not_cancel() {
        let (calls, token) = counting();
        drop(token);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_noop() {
        let token = Cancellation::noop();
        assert!(token.is_cancelled());
        token.cancel();
    }

    #[test]
    fn test_merge_cancels_all() {
        let (first_calls, first) = counting();
        let (second_calls, second) = counting();

        let merged = Cancellation::merge(vec![first, second]);
        merged.cancel();
        merged.cancel();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_cancel_runs_once() {
        let (calls, token) = counting();
        let token = Arc::new(token);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let token = Arc::clone(&token);
                thread::spawn(move || token.cancel())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Cancellation>();
    }
}
