//! Build definitions: the identity of a build unit within a build tree.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::path::BuildPath;

/// Describes where a build lives and how it entered the build tree.
///
/// The root directory is the build's identity for deduplication: two
/// definitions with the same root directory denote the same build, however
/// many times it is included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildDefinition {
    /// Build name (the root project name for the root build).
    pub name: String,
    /// Root directory of the build.
    pub root_dir: PathBuf,
    /// Identity of the build that included this one, `None` for the root.
    pub from_build: Option<BuildPath>,
    /// Whether the build contributes plugins rather than libraries.
    pub plugin_build: bool,
}

impl BuildDefinition {
    /// Creates the definition of the root build.
    pub fn root(name: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root_dir: root_dir.into(),
            from_build: None,
            plugin_build: false,
        }
    }

    /// Creates the definition of a build included from `from_build`.
    pub fn included(
        name: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        from_build: BuildPath,
    ) -> Self {
        Self {
            name: name.into(),
            root_dir: root_dir.into(),
            from_build: Some(from_build),
            plugin_build: false,
        }
    }

    /// Marks this definition as a plugin build.
    pub fn as_plugin_build(mut self) -> Self {
        self.plugin_build = true;
        self
    }

    /// Returns the root directory of the build.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Returns the identity path of the build: `:` for the root, `:<name>` otherwise.
    pub fn identity_path(&self) -> BuildPath {
        match self.from_build {
            None => BuildPath::root(),
            Some(_) => BuildPath::root().child(&self.name),
        }
    }
}
