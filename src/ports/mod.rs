// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that backends implement.
//! The registry and multiplexer only ever talk to backends through these traits.

pub mod backend;
pub mod parser;

// Re-export commonly used types
pub use backend::{ChangeCallback, ConfigBackend, RefreshCompletion};
pub use parser::ConfigParser;
