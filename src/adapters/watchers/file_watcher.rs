// SPDX-License-Identifier: MIT OR Apache-2.0

//! File system watcher for configuration file changes.
//!
//! This module provides a watcher that monitors a configuration file and invokes a
//! callback when it is modified.

use crate::domain::{ConfigError, Result};
use crate::ports::ChangeCallback;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default quiet period after the last event before the callback runs.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// How often the watcher thread checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// File system watcher for a single configuration file.
///
/// Events are debounced: the callback runs once a burst of events has been quiet
/// for the debounce delay, so the callback always sees the last write. The callback runs on the watcher's own thread.
///
/// # Examples
///
/// ```rust,no_run
/// use muxcfg::adapters::FileWatcher;
/// use std::sync::Arc;
///
/// # fn main() -> muxcfg::domain::Result<()> {
/// let mut watcher = FileWatcher::new("/path/to/config.yaml", None)?;
///
/// watcher.watch(Arc::new(|| {
///     println!("Configuration file changed");
/// }))?;
///
/// // Later, stop watching
/// watcher.stop()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileWatcher {
    /// Path to the file being watched
    file_path: PathBuf,
    debounce_delay: Duration,
    watcher: Option<RecommendedWatcher>,
    watch_thread: Option<JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
}

impl FileWatcher {
    /// Creates a watcher for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file to watch
    /// * `debounce_delay` - Optional debounce delay (default 500ms)
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::WatcherError`] if the file does not exist.
    pub fn new(path: impl AsRef<Path>, debounce_delay: Option<Duration>) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();

        if !file_path.exists() {
            return Err(ConfigError::WatcherError {
                message: format!("File does not exist: {}", file_path.display()),
                source: None,
            });
        }

        Ok(Self {
            file_path,
            debounce_delay: debounce_delay.unwrap_or(DEFAULT_DEBOUNCE),
            watcher: None,
            watch_thread: None,
            stop_tx: None,
        })
    }

    /// Returns `true` while the watcher thread is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Starts watching, invoking `callback` after each debounced modification.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::WatcherError`] if the watcher is already running or
    /// the platform watcher cannot be started.
    pub fn watch(&mut self, callback: ChangeCallback) -> Result<()> {
        if self.watcher.is_some() {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let (event_tx, event_rx) = channel::<notify::Result<Event>>();
        let (stop_tx, stop_rx) = channel::<()>();

        let mut watcher =
            RecommendedWatcher::new(event_tx, notify::Config::default()).map_err(|e| {
                ConfigError::WatcherError {
                    message: format!("Failed to create file watcher: {}", e),
                    source: Some(Arc::new(e)),
                }
            })?;

        // Watch the parent directory, editors often replace the file on save.
        let watch_path = match self.file_path.parent() {
            Some(parent) if self.file_path.is_file() => parent.to_path_buf(),
            _ => self.file_path.clone(),
        };

        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatcherError {
                message: format!("Failed to start watching: {}", e),
                source: Some(Arc::new(e)),
            })?;

        let file_path = self.file_path.clone();
        let debounce_delay = self.debounce_delay;

        let watch_thread = thread::spawn(move || {
            // Time of the latest event not yet reported.
            let mut pending: Option<Instant> = None;

            loop {
                if stop_rx.try_recv().is_ok() {
                    break;
                }

                let timeout = pending
                    .map(|last| debounce_delay.saturating_sub(last.elapsed()))
                    .map_or(POLL_INTERVAL, |remaining| remaining.min(POLL_INTERVAL));

                match event_rx.recv_timeout(timeout) {
                    Ok(Ok(event)) => {
                        if event.paths.iter().any(|p| p == &file_path) {
                            pending = Some(Instant::now());
                        }
                    }
                    Ok(Err(e)) => tracing::warn!("File watcher error: {}", e),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                // Fire once the burst has been quiet for the debounce delay.
                if pending.is_some_and(|last| last.elapsed() >= debounce_delay) {
                    pending = None;
                    tracing::debug!("Configuration file changed: {}", file_path.display());
                    callback();
                }
            }
        });

        self.watcher = Some(watcher);
        self.stop_tx = Some(stop_tx);
        self.watch_thread = Some(watch_thread);

        Ok(())
    }

    /// Stops watching. Stopping a watcher that is not running is a no-op.
    ///
    /// May be called from inside the callback; the thread then exits on its own.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::WatcherError`] if the watcher thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        self.watcher = None;

        if let Some(handle) = self.watch_thread.take() {
            if handle.thread().id() != thread::current().id() {
                handle.join().map_err(|_| ConfigError::WatcherError {
                    message: "Failed to join watcher thread".to_string(),
                    source: None,
                })?;
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
