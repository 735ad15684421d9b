//! Content hashing for state file addressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A 128-bit content hash computed using XXH3.
///
/// Used to derive stable, filesystem-safe keys from build root directories,
/// so that every included build gets its own nested state file location.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes a content hash of a path's textual form.
    ///
    /// The path is hashed as given; callers that need equal hashes for
    /// equivalent paths must canonicalize first.
    pub fn from_path(path: &Path) -> Self {
        Self::from_bytes(path.to_string_lossy().as_bytes())
    }

    /// Returns the first 8 bytes as 16 lowercase hex characters.
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_root_dir_same_key() {
        let a = ContentHash::from_path(Path::new("/work/lib"));
        let b = ContentHash::from_path(Path::new("/work/lib"));
        assert_eq!(a, b);
        assert_eq!(a.short(), b.short());
    }

    #[test]
    fn same_name_different_dirs_differ() {
        let a = ContentHash::from_path(Path::new("/work/a/lib"));
        let b = ContentHash::from_path(Path::new("/work/b/lib"));
        assert_ne!(a, b);
    }

    #[test]
    fn short_key_is_filesystem_safe_prefix() {
        let h = ContentHash::from_bytes(b"/work/lib");
        assert_eq!(h.to_string().len(), 32);
        assert_eq!(h.short().len(), 16);
        assert!(h.short().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(h.to_string().starts_with(&h.short()));
        assert_eq!(h, ContentHash::from_path(Path::new("/work/lib")));
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_path(Path::new("/work/tools"));
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
