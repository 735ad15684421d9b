//! File-level entry points: stores and loads one cache entry directory.

use std::path::{Path, PathBuf};

use cairn_cache::{write_staged, EntryDetails, FsStateFile, StateFile, StateType};
use cairn_codec::{ReadContext, WriteContext};
use cairn_diagnostics::DiagnosticSink;
use tracing::{debug, info, warn};

use crate::controller::{ConfigurationCacheState, LoadServices, LoadedBuildTree};
use crate::error::StateResult;
use crate::model::BuildTree;
use crate::replay::LoadOptions;
use crate::walker::BuildFactory;
use crate::work::{DefaultWorkNodeCodec, WorkNodeCodec};

/// One configuration cache entry on disk.
///
/// The entry directory holds the work state file, the entry details
/// summary, and one nested directory per stored included build.
#[derive(Debug, Clone)]
pub struct ConfigurationCacheIo<C = DefaultWorkNodeCodec> {
    dir: PathBuf,
    codec: C,
}

impl ConfigurationCacheIo {
    /// Creates an entry in `dir` using the default work codec.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_codec(dir, DefaultWorkNodeCodec)
    }
}

impl<C: WorkNodeCodec> ConfigurationCacheIo<C> {
    /// Creates an entry in `dir` using a custom work codec.
    pub fn with_codec(dir: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            dir: dir.into(),
            codec,
        }
    }

    /// Returns the entry directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the work state file of the root build.
    pub fn work_state_file(&self) -> FsStateFile {
        FsStateFile::new(&self.dir, StateType::Work)
    }

    fn entry_file(&self) -> FsStateFile {
        FsStateFile::new(&self.dir, StateType::Entry)
    }

    /// Returns `true` if a work state file exists.
    pub fn has_entry(&self) -> bool {
        self.work_state_file().exists()
    }

    /// Returns the entry summary, if present and readable.
    pub fn entry_details(&self) -> Option<EntryDetails> {
        EntryDetails::load(&self.entry_file())
    }

    /// Stores `tree` and records the entry summary.
    pub fn store(&self, tree: &BuildTree, diagnostics: &DiagnosticSink) -> StateResult<EntryDetails> {
        let stored = self.write_root_build_state_to(&self.work_state_file(), tree, diagnostics)?;
        let details = EntryDetails::new(tree.root().name(), stored);
        details.save(&self.entry_file())?;
        info!(
            dir = %self.dir.display(),
            included_builds = details.stored_included_builds.len(),
            "configuration cache entry stored"
        );
        Ok(details)
    }

    /// Loads the entry stored in the entry directory.
    pub fn load(
        &self,
        services: LoadServices<'_>,
        options: LoadOptions,
        diagnostics: &DiagnosticSink,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<LoadedBuildTree> {
        self.read_root_build_state_from(
            &self.work_state_file(),
            services,
            options,
            diagnostics,
            create_build,
        )
    }

    /// Writes `tree` into `state_file`, replacing it atomically.
    ///
    /// Included builds are written into nested files of `state_file`. Every
    /// file is first written in full to a temporary file; the nested files
    /// are moved into place only after the root stream is complete, and the
    /// root file last. A failure while writing leaves the previous entry
    /// untouched. A failure while moving files into place deletes
    /// `state_file`, so a mix of old and new files is never loaded.
    pub fn write_root_build_state_to(
        &self,
        state_file: &dyn StateFile,
        tree: &BuildTree,
        diagnostics: &DiagnosticSink,
    ) -> StateResult<Vec<PathBuf>> {
        debug!(file = %state_file.path().display(), "writing root build state");
        let state = ConfigurationCacheState::new(&self.codec, state_file, diagnostics);
        let (stored, root_file) = write_staged(state_file, |writer| -> StateResult<_> {
            let mut ctx = WriteContext::new(writer);
            let stored = state.write_root_build_state(&mut ctx, tree)?;
            ctx.flush()?;
            Ok(stored)
        })?;
        let committed = stored.commit_nested().and_then(|included| {
            root_file.commit(state_file)?;
            Ok(included)
        });
        match committed {
            Ok(included) => Ok(included),
            Err(err) => {
                warn!(
                    file = %state_file.path().display(),
                    error = %err,
                    "failed to move state files into place, dropping the entry"
                );
                if let Err(delete) = state_file.delete() {
                    warn!(error = %delete, "failed to delete root state file");
                }
                Err(err.into())
            }
        }
    }

    /// Reads the tree stored in `state_file`.
    pub fn read_root_build_state_from(
        &self,
        state_file: &dyn StateFile,
        services: LoadServices<'_>,
        options: LoadOptions,
        diagnostics: &DiagnosticSink,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<LoadedBuildTree> {
        debug!(file = %state_file.path().display(), "reading root build state");
        let state = ConfigurationCacheState::new(&self.codec, state_file, diagnostics);
        let mut ctx = ReadContext::new(state_file.input_stream()?);
        state.read_root_build_state(&mut ctx, services, options, create_build)
    }

    /// Deletes the work state file, the entry summary and the nested state
    /// files of every included build.
    pub fn discard(&self) -> StateResult<()> {
        let work = self.work_state_file();
        work.delete()?;
        self.entry_file().delete()?;
        work.delete_included_builds()?;
        debug!(dir = %self.dir.display(), "configuration cache entry discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BuildTreeWorkGraph;
    use crate::model::{BuildTreeState, BuildUnit, IncludedBuild};
    use cairn_common::{BuildDefinition, BuildPath};
    use crate::operations::{BuildOperationRunner, RecordingListener};
    use std::sync::Arc;

    #[test]
    fn store_writes_entry_details_and_discard_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let io = ConfigurationCacheIo::new(dir.path());
        assert!(!io.has_entry());

        let tree = BuildTree::new(BuildUnit::root("app", dir.path()));
        let details = io.store(&tree, &DiagnosticSink::new()).unwrap();
        assert!(io.has_entry());
        assert_eq!(io.entry_details(), Some(details));
        assert_eq!(io.entry_details().unwrap().root_build, "app");

        io.discard().unwrap();
        assert!(!io.has_entry());
        assert!(io.entry_details().is_none());
    }

    #[test]
    fn discard_removes_nested_state_files() {
        let dir = tempfile::tempdir().unwrap();
        let io = ConfigurationCacheIo::new(dir.path().join("cache"));
        let lib = BuildDefinition::included("lib", dir.path().join("lib"), BuildPath::root());
        let mut root = BuildUnit::root("app", dir.path().join("app"));
        root.included_builds.push(IncludedBuild::Included(lib.clone()));
        let mut tree = BuildTree::new(root);
        tree.add_build(BuildUnit::new(lib.clone())).unwrap();

        io.store(&tree, &DiagnosticSink::new()).unwrap();
        let nested = io.work_state_file().state_file_for_included_build(&lib);
        assert!(nested.exists());

        io.discard().unwrap();
        assert!(!io.has_entry());
        assert!(!nested.exists());
        assert!(!io.dir().join("included").exists());
    }

    #[test]
    fn load_without_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let io = ConfigurationCacheIo::new(dir.path());
        let runner = BuildOperationRunner::new(Arc::new(RecordingListener::new()));
        let mut tree_state = BuildTreeState::default();
        let mut work_graph = BuildTreeWorkGraph::new();
        let mut factory = |_: Option<&Path>, name: &str| BuildUnit::root(name, "/work");
        let err = io
            .load(
                LoadServices {
                    tree_state: &mut tree_state,
                    operations: &runner,
                    work_graph: &mut work_graph,
                },
                LoadOptions::default(),
                &DiagnosticSink::new(),
                &mut factory,
            )
            .unwrap_err();
        assert!(matches!(err, crate::StateError::Cache(ref e) if e.is_not_found()));
    }
}
