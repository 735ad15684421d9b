//! In-memory model of a build tree: builds, projects, and tree-wide state.

mod build;
mod project;
mod tree_state;

pub use build::{BuildTree, BuildUnit, CachedBuildState, IncludedBuild, StartParameter};
pub use project::{
    AllProjectsGuard, CachedProjectState, ProjectId, ProjectModel, ProjectRegistry, ProjectState,
};
pub use tree_state::{
    BuildCacheConfiguration, BuildServiceSpec, BuildTreeState, EnvironmentChange,
    EnvironmentState, FeatureFlags, FeaturePreview, GenericListener, ListenerSubscription,
    LocalBuildCache, PluginAdapter, PluginManager, RemoteBuildCache,
};
