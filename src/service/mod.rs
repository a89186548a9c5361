// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer orchestrating backends.
//!
//! The multiplexer composes backends, the coordinator serializes refreshes and
//! fans out change notifications, the registry holds the bootstrapped backend set
//! and [`Configs`] is the typed facade applications use.

pub mod configs;
pub mod coordinator;
pub mod multiplex;
pub mod registry;

// Re-export commonly used types
pub use configs::{Config, Configs};
pub use coordinator::Coordinator;
pub use multiplex::MultiplexBackend;
pub use registry::{bootstrap, bootstrap_categories, Registry};
