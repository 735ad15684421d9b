//! Entry details: a small JSON summary stored alongside the work state.
//!
//! The summary records which included builds received their own nested
//! state files, so tooling can inspect an entry without decoding the
//! positional work state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomically;
use crate::error::CacheError;
use crate::state_file::StateFile;

/// Summary of one configuration cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    /// Name of the root build that produced the entry.
    pub root_build: String,

    /// Root directories of the included builds whose state was stored,
    /// in the order they were written.
    pub stored_included_builds: Vec<PathBuf>,
}

impl EntryDetails {
    /// Creates entry details for the given root build.
    pub fn new(root_build: impl Into<String>, stored_included_builds: Vec<PathBuf>) -> Self {
        Self {
            root_build: root_build.into(),
            stored_included_builds,
        }
    }

    /// Loads entry details, returning `None` if the file doesn't exist or
    /// can't be parsed.
    ///
    /// This is fail-safe: a damaged summary only means the summary is absent.
    pub fn load(state_file: &dyn StateFile) -> Option<Self> {
        if !state_file.exists() {
            return None;
        }
        let reader = state_file.input_stream().ok()?;
        serde_json::from_reader(reader).ok()
    }

    /// Saves entry details, atomically replacing any previous summary.
    pub fn save(&self, state_file: &dyn StateFile) -> Result<(), CacheError> {
        write_atomically(state_file, |writer| {
            serde_json::to_writer_pretty(writer, self).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_file::{FsStateFile, StateType};

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = FsStateFile::new(dir.path(), StateType::Entry);
        let details = EntryDetails::new(
            "app",
            vec![PathBuf::from("/work/lib"), PathBuf::from("/work/tools")],
        );
        details.save(&file).unwrap();

        let loaded = EntryDetails::load(&file).unwrap();
        assert_eq!(loaded, details);
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = FsStateFile::new(dir.path(), StateType::Entry);
        assert!(EntryDetails::load(&file).is_none());
    }

    #[test]
    fn load_corrupt_json_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = FsStateFile::new(dir.path(), StateType::Entry);
        std::fs::write(file.path(), "not valid json {{{").unwrap();
        assert!(EntryDetails::load(&file).is_none());
    }

    #[test]
    fn save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeply").join("nested");
        let file = FsStateFile::new(&nested, StateType::Entry);
        EntryDetails::new("app", Vec::new()).save(&file).unwrap();
        assert!(nested.join("entry.json").exists());
    }
}
