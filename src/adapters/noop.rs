// SPDX-License-Identifier: MIT OR Apache-2.0

//! No-op configuration backend.

use crate::domain::{ConfigKey, ConfigValue, Result};
use crate::ports::{ConfigBackend, RefreshCompletion};

/// A backend that stores nothing.
///
/// Reads are always absent, writes and clears succeed without effect, refreshes
/// succeed immediately and it never notifies. Registries start out routing to it
/// until they are bootstrapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl NoopBackend {
    /// Creates a no-op backend.
    pub fn new() -> Self {
        NoopBackend
    }
}

impl ConfigBackend for NoopBackend {
    fn name(&self) -> &str {
        "noop"
    }

    fn value(&self, _key: &ConfigKey) -> Option<ConfigValue> {
        None
    }

    fn write_value(&self, _key: &ConfigKey, _value: Option<ConfigValue>) -> Result<()> {
        Ok(())
    }

    fn refresh(&self, completion: RefreshCompletion) {
        completion(Ok(()));
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
