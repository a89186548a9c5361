// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watchers detecting changes made outside the process.

#[cfg(feature = "reload")]
pub mod file_watcher;

#[cfg(feature = "reload")]
pub use file_watcher::FileWatcher;
