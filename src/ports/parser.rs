// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration format trait definition.
//!
//! File-backed stores keep their values as a flat key-value map in memory. A
//! `ConfigParser` converts file contents into that map and back.

use crate::domain::Result;
use std::collections::BTreeMap;

/// A trait for reading and writing a persisted configuration format.
///
/// # Key Format
///
/// Parsers should flatten nested structures using dot notation on load. For
/// example, a YAML structure like:
///
/// ```yaml
/// database:
///   host: localhost
///   port: 5432
/// ```
///
/// Should be parsed into:
/// - `database.host` -> `"localhost"`
/// - `database.port` -> `"5432"`
///
/// Rendering writes the flat map back out, one entry per key.
///
/// # Examples
///
/// ```rust
/// use muxcfg::ports::ConfigParser;
/// use muxcfg::domain::Result;
/// use std::collections::BTreeMap;
///
/// struct LineParser;
///
/// impl ConfigParser for LineParser {
///     fn parse(&self, content: &str) -> Result<BTreeMap<String, String>> {
///         Ok(content
///             .lines()
///             .filter_map(|line| line.split_once('='))
///             .map(|(k, v)| (k.to_string(), v.to_string()))
///             .collect())
///     }
///
///     fn render(&self, values: &BTreeMap<String, String>) -> Result<String> {
///         Ok(values.iter().map(|(k, v)| format!("{k}={v}\n")).collect())
///     }
///
///     fn supported_extensions(&self) -> &[&str] {
///         &["properties"]
///     }
/// }
///
/// let parser = LineParser;
/// let values = parser.parse("a=1\nb=2").unwrap();
/// assert_eq!(parser.render(&values).unwrap(), "a=1\nb=2\n");
/// ```
pub trait ConfigParser: Send + Sync {
    /// Parses file content into a flat key-value map.
    fn parse(&self, content: &str) -> Result<BTreeMap<String, String>>;

    /// Renders a flat key-value map into file content.
    fn render(&self, values: &BTreeMap<String, String>) -> Result<String>;

    /// Returns the file extensions (without the leading dot) this parser handles.
    fn supported_extensions(&self) -> &[&str];
}
