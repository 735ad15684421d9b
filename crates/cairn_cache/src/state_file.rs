//! State categories and the state file abstraction.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use cairn_common::{BuildDefinition, ContentHash};
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Subdirectory holding the state files of included builds.
const INCLUDED_SUBDIR: &str = "included";

/// Prefix of temporary files created next to a state file.
const TEMP_PREFIX: &str = ".tmp-";

/// Named partitions of persisted state.
///
/// Each category is stored in its own file per build; a stream never mixes
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateType {
    /// The build tree state and scheduled work graph.
    Work,
    /// Intermediate tooling models.
    Model,
    /// Entry details describing the cache entry as a whole.
    Entry,
    /// Inputs that decide whether the whole entry is still valid.
    BuildFingerprint,
    /// Per-project inputs that decide whether project models are still valid.
    ProjectFingerprint,
    /// Per-project intermediate models.
    IntermediateModels,
    /// Published project metadata.
    ProjectMetadata,
}

impl StateType {
    /// All categories, in declaration order.
    pub const ALL: [StateType; 7] = [
        StateType::Work,
        StateType::Model,
        StateType::Entry,
        StateType::BuildFingerprint,
        StateType::ProjectFingerprint,
        StateType::IntermediateModels,
        StateType::ProjectMetadata,
    ];

    /// Returns the file name used for this category.
    pub fn file_name(self) -> &'static str {
        match self {
            StateType::Work => "work.bin",
            StateType::Model => "model.bin",
            StateType::Entry => "entry.json",
            StateType::BuildFingerprint => "build-fingerprint.bin",
            StateType::ProjectFingerprint => "project-fingerprint.bin",
            StateType::IntermediateModels => "intermediate-models.bin",
            StateType::ProjectMetadata => "project-metadata.bin",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One byte stream of persisted state for one build and one category.
pub trait StateFile: Send + Sync {
    /// Location of the file, for diagnostics.
    fn path(&self) -> PathBuf;

    /// Returns `true` if the file has been written.
    fn exists(&self) -> bool;

    /// Opens the file for writing in place, truncating it.
    fn output_stream(&self) -> Result<Box<dyn Write>, CacheError>;

    /// Opens the file for reading.
    fn input_stream(&self) -> Result<Box<dyn Read>, CacheError>;

    /// Deletes the file if it exists.
    fn delete(&self) -> Result<(), CacheError>;

    /// Replaces the contents of this file by moving `file` to its location.
    fn move_from(&self, file: &Path) -> Result<(), CacheError>;

    /// Creates a temporary file on the same filesystem as this file.
    fn create_temp_file(&self) -> Result<NamedTempFile, CacheError>;

    /// Returns the state file of the same category for an included build.
    fn state_file_for_included_build(&self, build: &BuildDefinition) -> Box<dyn StateFile>;
}

/// A [`StateFile`] stored as `<dir>/<category file name>`.
///
/// Included builds nest under `<dir>/included/<name>-<hash of root dir>/`.
#[derive(Debug, Clone)]
pub struct FsStateFile {
    dir: PathBuf,
    state_type: StateType,
}

impl FsStateFile {
    /// Creates a state file of the given category inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, state_type: StateType) -> Self {
        Self {
            dir: dir.into(),
            state_type,
        }
    }

    /// Returns the directory holding this build's state files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the category of this file.
    pub fn state_type(&self) -> StateType {
        self.state_type
    }

    /// Returns the state file of another category for the same build.
    pub fn sibling(&self, state_type: StateType) -> Self {
        Self::new(self.dir.clone(), state_type)
    }

    /// Deletes the nested state files of every included build, of every
    /// category.
    pub fn delete_included_builds(&self) -> Result<(), CacheError> {
        let included = self.dir.join(INCLUDED_SUBDIR);
        match fs::remove_dir_all(&included) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io {
                path: included,
                source: e,
            }),
        }
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })
    }
}

impl StateFile for FsStateFile {
    fn path(&self) -> PathBuf {
        self.dir.join(self.state_type.file_name())
    }

    fn exists(&self) -> bool {
        self.path().is_file()
    }

    fn output_stream(&self) -> Result<Box<dyn Write>, CacheError> {
        self.ensure_dir()?;
        let path = self.path();
        let file = File::create(&path).map_err(|e| CacheError::Io { path, source: e })?;
        Ok(Box::new(file))
    }

    fn input_stream(&self) -> Result<Box<dyn Read>, CacheError> {
        let path = self.path();
        let file = File::open(&path).map_err(|e| CacheError::Io { path, source: e })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn delete(&self) -> Result<(), CacheError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    fn move_from(&self, file: &Path) -> Result<(), CacheError> {
        self.ensure_dir()?;
        let path = self.path();
        tracing::trace!(from = %file.display(), to = %path.display(), "replacing state file");
        fs::rename(file, &path).map_err(|e| CacheError::Io { path, source: e })
    }

    fn create_temp_file(&self) -> Result<NamedTempFile, CacheError> {
        self.ensure_dir()?;
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })
    }

    fn state_file_for_included_build(&self, build: &BuildDefinition) -> Box<dyn StateFile> {
        let key = format!(
            "{}-{}",
            sanitize(&build.name),
            ContentHash::from_path(build.root_dir()).short()
        );
        Box::new(Self::new(
            self.dir.join(INCLUDED_SUBDIR).join(key),
            self.state_type,
        ))
    }
}

/// Replaces characters that are unsafe in a directory name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
