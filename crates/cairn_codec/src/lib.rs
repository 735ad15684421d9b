//! Positional binary codec for configuration cache state files.
//!
//! The format is not self-describing: a [`WriteContext`] and a
//! [`ReadContext`] must perform exactly the same sequence of operations for
//! a stream to decode. Each context tracks named debug frames, used only to
//! attribute errors, and isolates, which fence where arbitrary serde values
//! may be encoded.

#![warn(missing_docs)]

pub mod error;
pub mod frames;
pub mod read;
pub mod write;

pub use error::CodecError;
pub use frames::{FrameStack, IsolateStack};
pub use read::ReadContext;
pub use write::WriteContext;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Upper bound on the encoded size of one serde value.
///
/// A corrupted length prefix inside a value fails to decode instead of
/// reserving whatever size it claims.
pub const MAX_VALUE_BYTES: usize = 64 * 1024 * 1024;

pub(crate) fn value_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_VALUE_BYTES>()
}
