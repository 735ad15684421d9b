//! Error types for storing and loading configuration cache state.

use std::path::PathBuf;

use cairn_cache::CacheError;
use cairn_codec::CodecError;
use cairn_common::{BuildPath, ParsePathError, ProjectPath};

use crate::graph::GraphError;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that abort a store or load pass.
///
/// Every variant is fatal to the pass that raised it. Nothing is retried: a
/// positional stream that failed part way cannot be resumed, so the caller
/// discards the entry and falls back to configuring the build from scratch.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The trailer marker did not match: the entry is corrupt or was written
    /// by a writer that disagrees with this reader about the layout.
    #[error("corrupt state file: expected trailer marker {expected:#x}, found {found:#x}")]
    CorruptCache {
        /// The marker every writer emits.
        expected: i32,
        /// The value found in its place.
        found: i32,
    },

    /// A build reference combination no writer produces: an included build
    /// marked as not stored that was never stored earlier in the stream, or
    /// one stored twice.
    #[error("unsupported reference to build '{name}' at {}", root_dir.display())]
    UnsupportedBuildReference {
        /// Name of the referenced build.
        name: String,
        /// Root directory of the referenced build.
        root_dir: PathBuf,
    },

    /// The root state was requested for a build that is not the root.
    #[error("build '{build}' is not the root build")]
    NotRootBuild {
        /// Identity of the offending build.
        build: BuildPath,
    },

    /// An included build references a root directory not in the build tree.
    #[error("no build in the tree has root directory {}", root_dir.display())]
    UnknownBuild {
        /// The unresolved root directory.
        root_dir: PathBuf,
    },

    /// Two builds of one tree share a root directory.
    #[error("build at {} is registered twice", root_dir.display())]
    DuplicateBuild {
        /// The duplicated root directory.
        root_dir: PathBuf,
    },

    /// A project path is not registered in the build.
    #[error("unknown project '{path}' in build '{build}'")]
    UnknownProject {
        /// Identity of the build searched.
        build: BuildPath,
        /// The unresolved project path.
        path: ProjectPath,
    },

    /// A project was registered before its parent.
    #[error("project '{path}' registered before its parent")]
    MissingParentProject {
        /// The project whose parent is missing.
        path: ProjectPath,
    },

    /// A project path was registered twice.
    #[error("project '{path}' is registered twice")]
    DuplicateProject {
        /// The duplicated project path.
        path: ProjectPath,
    },

    /// A listener subscription references a build service that no build registers.
    #[error("unknown build service '{name}' in build '{build}'")]
    UnknownBuildService {
        /// Identity of the build expected to own the service.
        build: BuildPath,
        /// Service name.
        name: String,
    },

    /// A build's scheduled work cannot be encoded or decoded.
    #[error("invalid work graph for build '{build}': {reason}")]
    InvalidWorkGraph {
        /// Identity of the build.
        build: BuildPath,
        /// What is wrong with the work graph.
        reason: String,
    },

    /// A project or build path in the stream is malformed.
    #[error(transparent)]
    InvalidPath(#[from] ParsePathError),

    /// The codec failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A state file could not be opened, written, or moved.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The loaded work graphs could not be assembled.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl StateError {
    /// Returns `true` for errors that mean the stored bytes themselves are
    /// unusable (as opposed to an environment or model problem).
    pub fn invalidates_entry(&self) -> bool {
        matches!(
            self,
            StateError::CorruptCache { .. }
                | StateError::UnsupportedBuildReference { .. }
                | StateError::InvalidPath(_)
                | StateError::Codec(_)
        )
    }
}
