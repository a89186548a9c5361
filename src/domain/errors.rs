// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration crate.
//!
//! This module defines the errors that backends, the multiplexer and the coordinator
//! report. All errors use `thiserror` and are cheaply cloneable so that a single
//! refresh outcome can be delivered to every caller waiting on it.

use std::str::ParseBoolError;
use std::sync::Arc;
use thiserror::Error;

/// Shared, thread-safe error source.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync>;

/// The main error type for configuration operations.
///
/// It is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use muxcfg::domain::errors::ConfigError;
///
/// fn write_somewhere() -> Result<(), ConfigError> {
///     Err(ConfigError::Unsupported {
///         backend: "env".to_string(),
///         operation: "write",
///     })
/// }
///
/// assert!(write_somewhere().unwrap_err().is_unsupported());
/// ```
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The backend does not implement the requested operation.
    #[error("Operation '{operation}' is not supported by backend '{backend}'")]
    Unsupported {
        /// The name of the backend
        backend: String,
        /// The operation that was attempted
        operation: &'static str,
    },

    /// Several backends failed during one fan-out operation.
    #[error("{} configuration backends failed: {}", .errors.len(), join_errors(.errors))]
    Aggregate {
        /// Every underlying failure, in call order
        errors: Vec<ConfigError>,
    },

    /// An error occurred in a configuration backend.
    #[error("Configuration backend '{backend}' error: {message}")]
    BackendError {
        /// The name of the backend that encountered the error
        backend: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<ErrorSource>,
    },

    /// Failed to convert a configuration value to the requested type.
    #[error(
        "Failed to convert configuration value for key '{key}' to type {target_type}: {source}"
    )]
    TypeConversionError {
        /// The key being converted
        key: String,
        /// The target type name
        target_type: String,
        /// The underlying conversion error
        source: ErrorSource,
    },

    /// Failed to parse a configuration file or value.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<ErrorSource>,
    },

    /// An error occurred while watching a backend for changes.
    #[error("Configuration watcher error: {message}")]
    WatcherError {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<ErrorSource>,
    },

    /// A refresh completion was dropped without ever being invoked.
    #[error("Refresh completion was dropped before reporting an outcome")]
    RefreshAbandoned,
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Collapses the failures of a fan-out operation.
    ///
    /// No failures yields `None`, a single failure is returned as-is, and more than
    /// one is wrapped in [`ConfigError::Aggregate`] preserving call order.
    ///
    /// # Examples
    ///
    /// ```
    /// use muxcfg::domain::errors::ConfigError;
    ///
    /// assert!(ConfigError::aggregate(Vec::new()).is_none());
    ///
    /// let one = ConfigError::aggregate(vec![ConfigError::RefreshAbandoned]).unwrap();
    /// assert!(matches!(one, ConfigError::RefreshAbandoned));
    /// ```
    pub fn aggregate(mut errors: Vec<ConfigError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ConfigError::Aggregate { errors }),
        }
    }

    /// Creates a `BackendError` wrapping an underlying error.
    pub fn backend<E>(backend: impl Into<String>, message: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::BackendError {
            backend: backend.into(),
            message: message.into(),
            source: Some(Arc::new(err)),
        }
    }

    /// Returns `true` if this is an [`ConfigError::Unsupported`] error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ConfigError::Unsupported { .. })
    }

    /// Returns the underlying failures of an aggregate, or the error itself otherwise.
    pub fn errors(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Aggregate { errors } => errors.iter().collect(),
            other => vec![other],
        }
    }

    /// Creates a TypeConversionError from a ParseBoolError.
    pub fn from_parse_bool_error(key: String, err: ParseBoolError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "boolean".to_string(),
            source: Arc::new(err),
        }
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
