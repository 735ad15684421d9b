//! Parsing and validation of `cairn.toml` build tree descriptions.
//!
//! This crate reads the declarative description of a multi-build tree and
//! produces a strongly-typed [`CairnConfig`], with cross-build work
//! dependencies resolved to [`DependencyRef`]s.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{parse_dependency, DependencyRef};
pub use types::*;
