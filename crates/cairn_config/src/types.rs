//! Configuration types deserialized from `cairn.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The top-level configuration parsed from `cairn.toml`.
///
/// Describes every build of the tree, the projects each build registers and
/// the work each build schedules, plus the tree-wide settings that are
/// persisted alongside them.
#[derive(Debug, Deserialize)]
pub struct CairnConfig {
    /// Where the cache lives and how reloads behave.
    #[serde(default)]
    pub cache: CacheSettings,
    /// All builds of the tree; exactly one must be the root.
    #[serde(default)]
    pub builds: Vec<BuildDecl>,
    /// Environment variables captured into the tree state.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Enabled feature previews, by name.
    #[serde(default)]
    pub features: Vec<String>,
    /// Listener subscriptions registered for the build.
    #[serde(default)]
    pub listeners: Vec<ListenerDecl>,
}

impl CairnConfig {
    /// Returns the root build declaration, if any.
    pub fn root_build(&self) -> Option<&BuildDecl> {
        self.builds.iter().find(|b| b.root)
    }

    /// Returns the build declared under `name`.
    pub fn build_named(&self, name: &str) -> Option<&BuildDecl> {
        self.builds.iter().find(|b| b.name == name)
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Cache directory, relative to the configuration file.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Reload right after storing and report identification events only.
    #[serde(default)]
    pub load_after_store: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            load_after_store: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cairn")
}

/// One `[[builds]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildDecl {
    /// Build name; unique within the tree.
    pub name: String,
    /// Root directory, relative to the configuration file.
    pub root_dir: PathBuf,
    /// Whether this is the root build.
    #[serde(default)]
    pub root: bool,
    /// Whether this build contributes plugins.
    #[serde(default)]
    pub plugin_build: bool,
    /// Settings file, relative to the build's root directory.
    #[serde(default)]
    pub settings_file: Option<PathBuf>,
    /// Requested task names.
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Names of builds this build includes.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Whether the build declares source dependency rules.
    #[serde(default)]
    pub source_dependencies: bool,
    /// Output directories registered for cleanup, relative to the root directory.
    #[serde(default)]
    pub cleanup: Vec<PathBuf>,
    /// Build services this build registers.
    #[serde(default)]
    pub services: Vec<ServiceDecl>,
    /// Projects of this build, in registration order.
    #[serde(default)]
    pub projects: Vec<ProjectDecl>,
    /// Scheduled work of this build, in execution order.
    #[serde(default)]
    pub work: Vec<WorkDecl>,
}

/// One `[[builds.projects]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDecl {
    /// Project path (e.g. `:app`).
    pub path: String,
    /// Project directory, relative to the build's root directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Output directory, relative to the build's root directory.
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
    /// Project group.
    #[serde(default)]
    pub group: Option<String>,
    /// Project version.
    #[serde(default)]
    pub version: Option<String>,
    /// Project description.
    #[serde(default)]
    pub description: Option<String>,
    /// Extra project properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// One `[[builds.work]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkDecl {
    /// Node path within the build (e.g. `:app:compile`).
    pub id: String,
    /// Path of the owning project, if any.
    #[serde(default)]
    pub project: Option<String>,
    /// Opaque action payload.
    #[serde(default)]
    pub action: String,
    /// Dependencies: `:path` within the same build, or `build@:path`.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// One `[[builds.services]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDecl {
    /// Service name, unique within its build.
    pub name: String,
    /// Service parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// One `[[listeners]]` entry.
///
/// Either names a build service (`build` + `service`) or a free-standing
/// listener type (`type`).
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerDecl {
    /// Build declaring the backing service.
    #[serde(default)]
    pub build: Option<String>,
    /// Name of the backing service.
    #[serde(default)]
    pub service: Option<String>,
    /// Listener type for listeners not backed by a service.
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    /// Listener configuration.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}
