//! Shared foundational types used across the Cairn configuration cache.
//!
//! This crate provides the identity types every other crate agrees on:
//! content hashes, hierarchical project and build paths, build definitions,
//! and the dense arena used to store project hierarchies.

#![warn(missing_docs)]

pub mod arena;
pub mod build;
pub mod hash;
pub mod path;

pub use arena::{Arena, ArenaId};
pub use build::BuildDefinition;
pub use hash::ContentHash;
pub use path::{BuildPath, ParsePathError, ProjectPath};
