//! Configuration cache state for multi-project, multi-build trees.
//!
//! Storing walks the build tree and writes, in a fixed order, the
//! build-tree-wide state, then each build's state (recursing into included
//! builds through their own nested state files), then root listener
//! subscriptions and a trailing integrity marker. Loading performs exactly
//! the same sequence of reads, rebuilds one [`CachedBuildState`] per stored
//! build, replays synthetic build operations for tooling, and assembles the
//! per-build work lists into one [`FinalizedGraph`].
//!
//! The stream format is positional: every `write_*` step in [`walker`] and
//! [`controller`] has a `read_*` counterpart that must change with it.

#![warn(missing_docs)]

pub mod controller;
pub mod error;
pub mod graph;
pub mod io;
pub mod model;
pub mod operations;
pub mod relevance;
pub mod replay;
pub mod walker;
pub mod work;

pub use controller::{
    ConfigurationCacheState, LoadServices, LoadedBuildTree, StoredTree, STATE_FILE_MARKER,
};
pub use error::{StateError, StateResult};
pub use graph::{BuildTreeWorkGraph, FinalizedGraph, GraphError, WorkGraphBuilder};
pub use io::ConfigurationCacheIo;
pub use model::{
    AllProjectsGuard, BuildCacheConfiguration, BuildServiceSpec, BuildTree, BuildTreeState, BuildUnit,
    CachedBuildState, CachedProjectState, EnvironmentChange, EnvironmentState, FeatureFlags,
    FeaturePreview, GenericListener, IncludedBuild, ListenerSubscription, LocalBuildCache,
    PluginAdapter, PluginManager, ProjectId, ProjectModel, ProjectRegistry, ProjectState,
    RemoteBuildCache, StartParameter,
};
pub use operations::{
    BuildOperation, BuildOperationDescriptor, BuildOperationListener, BuildOperationRunner,
    OperationId, OperationKind, ProgressDetails, ProjectTree, RecordedEvent, RecordingListener,
};
pub use replay::{project_tree, LoadOptions, ReplayMode};
pub use walker::{BuildFactory, StoredBuilds, SOURCE_DEPENDENCIES};
pub use work::{DefaultWorkNodeCodec, NodeId, WorkNode, WorkNodeCodec};
