//! Atomic replacement of state files.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::TempPath;

use crate::error::CacheError;
use crate::state_file::StateFile;

/// Writes new content for `state_file` without ever exposing a partial file.
///
/// `write` receives a buffered writer over a temporary sibling file. Only
/// when it succeeds is the temporary file flushed, synced, and moved over
/// the state file. On failure the temporary file is removed and any
/// previous content of `state_file` is left untouched.
pub fn write_atomically<T, E, F>(state_file: &dyn StateFile, write: F) -> Result<T, E>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T, E>,
    E: From<CacheError>,
{
    let (value, staged) = write_staged(state_file, write)?;
    staged.commit(state_file)?;
    Ok(value)
}

/// Writes new content for `state_file` into a synced temporary file and
/// returns it without moving it into place.
///
/// Dropping the returned [`StagedFile`] removes the temporary file.
pub fn write_staged<T, E, F>(state_file: &dyn StateFile, write: F) -> Result<(T, StagedFile), E>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T, E>,
    E: From<CacheError>,
{
    let temp = state_file.create_temp_file()?;
    let (file, temp_path) = temp.into_parts();
    let mut writer = BufWriter::new(file);

    let value = write(&mut writer)?;

    let io_error = |source| CacheError::Io {
        path: temp_path.to_path_buf(),
        source,
    };
    writer.flush().map_err(io_error)?;
    let file = writer.into_inner().map_err(|e| io_error(e.into_error()))?;
    file.sync_all().map_err(io_error)?;
    drop(file);

    Ok((value, StagedFile { temp_path }))
}

/// Complete new content of a state file, waiting in a temporary file.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: TempPath,
}

impl StagedFile {
    /// Location of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Moves the content over `state_file`.
    pub fn commit(self, state_file: &dyn StateFile) -> Result<(), CacheError> {
        state_file.move_from(&self.temp_path)
    }
}

/// Staged files of several state files, committed together.
///
/// Nothing is moved into place until [`commit`](Self::commit); dropping the
/// set removes every temporary file.
#[derive(Default)]
pub struct StagedFiles {
    files: Vec<(Box<dyn StateFile>, StagedFile)>,
}

impl StagedFiles {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the staged content of `state_file`.
    pub fn push(&mut self, state_file: Box<dyn StateFile>, staged: StagedFile) {
        self.files.push((state_file, staged));
    }

    /// Number of staged files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Moves every staged file into place, in staging order.
    ///
    /// Stops at the first failure. Files staged after it are removed.
    pub fn commit(self) -> Result<(), CacheError> {
        for (state_file, staged) in self.files {
            staged.commit(state_file.as_ref())?;
        }
        Ok(())
    }
}

impl fmt::Debug for StagedFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.files.iter().map(|(state_file, _)| state_file.path()))
            .finish()
    }
}
