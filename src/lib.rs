// SPDX-License-Identifier: MIT OR Apache-2.0

//! A hexagonal architecture configuration registry that multiplexes backends.
//!
//! Applications declare typed keys, register one or more storage backends at start
//! up and read and write configuration through a small typed facade. Behind the
//! facade, each request is routed by [`Category`](domain::Category) to every backend
//! registered for a superset of that category and fanned out or in across them.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: Core types (`ConfigKey`, `ConfigValue`, `Category`, `TypedKey`,
//!   `Cancellation`, errors)
//! - **Ports**: Trait definitions that define interfaces (`ConfigBackend`, `ConfigParser`)
//! - **Adapters**: Concrete backends (in-memory, no-op, environment variables, YAML files)
//! - **Service**: The multiplexer, the refresh/notification coordinator, the registry
//!   and the `Configs` facade
//!
//! # Behaviour
//!
//! - **Reads** return the first value found, most specific backend first
//! - **Writes and clears** go to every routed backend; several failures are aggregated
//! - **Refreshes** never overlap; callers arriving mid-refresh share its outcome
//! - **Observers** share one upstream subscription, replayed once a refresh succeeded
//! - **Overrides** added with `Configs::with` stay local to that facade
//!
//! # Feature Flags
//!
//! - `yaml`: Enable the YAML file backend (default)
//! - `env`: Enable the environment variable backend (default)
//! - `json`: Enable JSON-encoded typed keys (default)
//! - `reload`: Watch YAML files for external edits
//! - `async`: Enable `async` fetch methods
//! - `full`: Enable all features
//!
//! # Quick Start
//!
//! ```rust
//! use muxcfg::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> muxcfg::domain::Result<()> {
//! // Tests and libraries use an isolated registry; applications usually call
//! // `muxcfg::bootstrap` once and use `Configs::new()`.
//! let registry = Registry::new();
//! registry.bootstrap(Arc::new(InMemoryBackend::from_pairs([("flag", "true")])));
//!
//! let flag = TypedKey::boolean("flag", false);
//! let configs = Configs::from_registry(&registry);
//! assert!(configs.get(&flag));
//!
//! // Local overrides never reach the backend
//! assert!(!configs.with(&flag, Some(false)).get(&flag));
//!
//! configs.set(&flag, false)?;
//! assert!(!configs.get(&flag));
//! # Ok(())
//! # }
//! ```
//!
//! # Categories
//!
//! ```rust
//! use muxcfg::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let secrets: Arc<dyn ConfigBackend> = Arc::new(InMemoryBackend::new());
//! let settings: Arc<dyn ConfigBackend> = Arc::new(InMemoryBackend::new());
//! registry.bootstrap_categories([
//!     (Category::SECURE, secrets),
//!     (Category::INSECURE, settings),
//! ]);
//!
//! let token = TypedKey::parsed("api.token", String::new())
//!     .from_category(Category::SECURE);
//! let configs = Configs::from_registry(&registry);
//! configs.set(&token, "s3cr3t".to_string()).unwrap();
//!
//! assert!(configs.all_keys(Category::INSECURE).is_empty());
//! assert_eq!(configs.get(&token), "s3cr3t");
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use service::registry::{bootstrap, bootstrap_categories};

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{
        Cancellation, Category, ConfigError, ConfigKey, ConfigValue, Result, TypedKey,
    };
    pub use crate::ports::{ChangeCallback, ConfigBackend, ConfigParser, RefreshCompletion};
    pub use crate::service::{Config, Configs, Coordinator, MultiplexBackend, Registry};

    pub use crate::adapters::{InMemoryBackend, NoopBackend};
    // Re-export adapters based on feature flags
    #[cfg(feature = "env")]
    pub use crate::adapters::EnvVarBackend;
    #[cfg(feature = "yaml")]
    pub use crate::adapters::{YamlFileBackend, YamlParser};
}
