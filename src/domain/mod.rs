// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core types.
//!
//! This module contains the vocabulary shared by every other layer: keys and raw
//! values, categories, typed key declarations, cancellation handles and errors.
//! It does not depend on any backend or on the registry.

pub mod cancellation;
pub mod category;
pub mod config_key;
pub mod config_value;
pub mod errors;
pub mod typed_key;

// Re-export commonly used types
pub use cancellation::Cancellation;
pub use category::Category;
pub use config_key::ConfigKey;
pub use config_value::ConfigValue;
pub use errors::{ConfigError, Result};
pub use typed_key::TypedKey;
