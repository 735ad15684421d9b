//! State shared by the whole build tree and stored once, with the root build.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;

use cairn_common::BuildPath;
use serde::{Deserialize, Serialize};

/// A change an invocation made to its environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentChange {
    /// The variable was set to a value.
    Set(String),
    /// The variable was removed.
    Removed,
}

/// Environment variable changes made while configuring, replayed on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Changes keyed by variable name.
    pub changes: BTreeMap<String, EnvironmentChange>,
}

impl EnvironmentState {
    /// Records that `name` was set to `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.changes
            .insert(name.into(), EnvironmentChange::Set(value.into()));
    }

    /// Records that `name` was removed.
    pub fn remove(&mut self, name: impl Into<String>) {
        self.changes.insert(name.into(), EnvironmentChange::Removed);
    }

    /// Applies changes loaded from the cache over the current ones.
    pub fn load_from(&mut self, loaded: EnvironmentState) {
        self.changes.extend(loaded.changes);
    }
}

/// Incubating features a build can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeaturePreview {
    /// Compile-avoidance for script compilation.
    GroovyCompilationAvoidance,
    /// A single dependency lock file per project.
    OneLockfilePerProject,
    /// Revised version ordering.
    VersionOrderingV2,
    /// Generated accessors for project dependencies.
    TypesafeProjectAccessors,
    /// Stable configuration cache behaviour.
    StableConfigurationCache,
}

impl FeaturePreview {
    /// Every feature preview, in declaration order.
    pub const ALL: [FeaturePreview; 5] = [
        FeaturePreview::GroovyCompilationAvoidance,
        FeaturePreview::OneLockfilePerProject,
        FeaturePreview::VersionOrderingV2,
        FeaturePreview::TypesafeProjectAccessors,
        FeaturePreview::StableConfigurationCache,
    ];

    /// Returns the kebab-case name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            FeaturePreview::GroovyCompilationAvoidance => "groovy-compilation-avoidance",
            FeaturePreview::OneLockfilePerProject => "one-lockfile-per-project",
            FeaturePreview::VersionOrderingV2 => "version-ordering-v2",
            FeaturePreview::TypesafeProjectAccessors => "typesafe-project-accessors",
            FeaturePreview::StableConfigurationCache => "stable-configuration-cache",
        }
    }
}

impl FromStr for FeaturePreview {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| format!("unknown feature preview '{s}'"))
    }
}

/// The set of enabled [`FeaturePreview`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    enabled: BTreeSet<FeaturePreview>,
}

impl FeatureFlags {
    /// Enables a feature.
    pub fn enable(&mut self, feature: FeaturePreview) {
        self.enabled.insert(feature);
    }

    /// Returns `true` if the feature is enabled.
    pub fn is_enabled(&self, feature: FeaturePreview) -> bool {
        self.enabled.contains(&feature)
    }

    /// Iterates over enabled features in a stable order.
    pub fn enabled(&self) -> impl Iterator<Item = FeaturePreview> + '_ {
        self.enabled.iter().copied()
    }
}

/// Adapter of a build-scan style plugin that wants its state cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAdapter {
    /// Identifier of the plugin owning the adapter.
    pub plugin_id: String,
    /// Whether the adapter asked to be stored.
    pub save_to_cache: bool,
    /// Opaque plugin configuration.
    pub settings: BTreeMap<String, String>,
    #[serde(skip)]
    loaded_from_cache: bool,
}

impl PluginAdapter {
    /// Creates an adapter that asks to be stored.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            save_to_cache: true,
            settings: BTreeMap::new(),
            loaded_from_cache: false,
        }
    }

    /// Returns `true` if this adapter should be written to the cache.
    pub fn should_save_to_cache(&self) -> bool {
        self.save_to_cache
    }

    /// Marks the adapter as restored from the cache.
    pub fn on_load_from_cache(&mut self) {
        self.loaded_from_cache = true;
    }

    /// Returns `true` if the adapter was restored from the cache.
    pub fn is_loaded_from_cache(&self) -> bool {
        self.loaded_from_cache
    }
}

/// Holds the registered plugin adapter, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginManager {
    adapter: Option<PluginAdapter>,
}

impl PluginManager {
    /// Returns the registered adapter.
    pub fn adapter(&self) -> Option<&PluginAdapter> {
        self.adapter.as_ref()
    }

    /// Registers an adapter, replacing any previous one.
    pub fn register_adapter(&mut self, adapter: PluginAdapter) {
        self.adapter = Some(adapter);
    }

    /// Returns the adapter to store, if one exists and asked to be stored.
    pub fn adapter_to_store(&self) -> Option<&PluginAdapter> {
        self.adapter.as_ref().filter(|a| a.should_save_to_cache())
    }
}

/// Local build cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBuildCache {
    /// Whether the local cache is used.
    pub enabled: bool,
    /// Whether results are stored into the local cache.
    pub push: bool,
    /// Cache directory, `None` for the default location.
    pub directory: Option<PathBuf>,
}

impl Default for LocalBuildCache {
    fn default() -> Self {
        Self {
            enabled: true,
            push: true,
            directory: None,
        }
    }
}

/// Remote build cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBuildCache {
    /// Cache endpoint.
    pub url: String,
    /// Whether results are pushed to the remote cache.
    pub push: bool,
    /// Whether plain HTTP is accepted.
    pub allow_insecure_protocol: bool,
}

/// Build cache configuration of the build tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCacheConfiguration {
    /// Local cache.
    pub local: LocalBuildCache,
    /// Remote cache, if configured.
    pub remote: Option<RemoteBuildCache>,
    /// Registered cache implementation types.
    pub registrations: BTreeSet<String>,
}

/// A build service registered by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildServiceSpec {
    /// Build that registered the service.
    pub build: BuildPath,
    /// Service name, unique within its build.
    pub name: String,
    /// Service parameters.
    pub parameters: BTreeMap<String, String>,
}

impl BuildServiceSpec {
    /// Creates a service without parameters.
    pub fn new(build: BuildPath, name: impl Into<String>) -> Self {
        Self {
            build,
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }
}

/// A listener that is not backed by a build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericListener {
    /// Listener type name.
    pub type_name: String,
    /// Listener configuration.
    pub config: BTreeMap<String, String>,
}

/// A build event listener subscribed on the root build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSubscription {
    /// A listener provided by a registered build service.
    ServiceBacked {
        /// Build that registered the service.
        build: BuildPath,
        /// Service name.
        name: String,
    },
    /// Any other listener, stored by value.
    Generic(GenericListener),
}

/// Build-tree-wide state, written once with the root build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildTreeState {
    /// Environment changes.
    pub environment: EnvironmentState,
    /// Enabled incubating features.
    pub feature_flags: FeatureFlags,
    /// Plugin adapter registry.
    pub plugin_manager: PluginManager,
    /// Build cache configuration.
    pub build_cache: BuildCacheConfiguration,
    /// Build event listeners subscribed on the root build.
    pub listener_subscriptions: Vec<ListenerSubscription>,
}
