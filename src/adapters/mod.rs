// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing concrete configuration backends.
//!
//! Each adapter implements the [`ConfigBackend`](crate::ports::ConfigBackend) port.
//! The in-memory and no-op backends are always available; the others are gated
//! behind feature flags.

#[cfg(feature = "env")]
pub mod env_var;
pub mod in_memory;
pub(crate) mod listeners;
pub mod noop;
#[cfg(feature = "yaml")]
pub mod yaml_file;

pub mod watchers;

// Re-export adapters based on feature flags
#[cfg(feature = "env")]
pub use env_var::EnvVarBackend;
pub use in_memory::InMemoryBackend;
pub use noop::NoopBackend;
#[cfg(feature = "reload")]
pub use watchers::FileWatcher;
#[cfg(feature = "yaml")]
pub use yaml_file::{YamlFileBackend, YamlParser};
