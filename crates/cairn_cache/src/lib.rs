//! State file service for the configuration cache.
//!
//! Persisted state is partitioned into categories ([`StateType`]), each
//! stored in its own file per build. Files are never written in place: new
//! content goes to a sibling temporary file that is then moved over the
//! target, so a half-written file is never observable as existing.

#![warn(missing_docs)]

pub mod atomic;
pub mod entry;
pub mod error;
pub mod state_file;

pub use atomic::{write_atomically, write_staged, StagedFile, StagedFiles};
pub use entry::EntryDetails;
pub use error::CacheError;
pub use state_file::{FsStateFile, StateFile, StateType};
