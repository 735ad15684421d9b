//! Colon-separated hierarchical paths for projects and builds.
//!
//! Both kinds of path share the same syntax: the root is `:`, and every
//! other path is a sequence of non-empty segments each prefixed by `:`
//! (e.g. `:app`, `:libs:core`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between path segments.
const SEPARATOR: char = ':';

/// Error returned when a string is not a valid hierarchical path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePathError {
    /// The path does not start with `:`.
    #[error("path '{0}' must start with ':'")]
    NotAbsolute(String),
    /// The path contains an empty segment (e.g. `:a::b` or a trailing `:`).
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),
}

fn validate(s: &str) -> Result<(), ParsePathError> {
    if !s.starts_with(SEPARATOR) {
        return Err(ParsePathError::NotAbsolute(s.to_string()));
    }
    if s.len() > 1 && s[1..].split(SEPARATOR).any(str::is_empty) {
        return Err(ParsePathError::EmptySegment(s.to_string()));
    }
    Ok(())
}

macro_rules! define_path {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Returns the root path `:`.
            pub fn root() -> Self {
                Self(SEPARATOR.to_string())
            }

            /// Parses a path, validating its syntax.
            pub fn parse(s: &str) -> Result<Self, ParsePathError> {
                validate(s)?;
                Ok(Self(s.to_string()))
            }

            /// Returns `true` if this is the root path.
            pub fn is_root(&self) -> bool {
                self.0.len() == 1
            }

            /// Returns the parent path, or `None` for the root.
            pub fn parent(&self) -> Option<Self> {
                if self.is_root() {
                    return None;
                }
                match self.0.rfind(SEPARATOR) {
                    Some(0) => Some(Self::root()),
                    Some(index) => Some(Self(self.0[..index].to_string())),
                    None => None,
                }
            }

            /// Returns the child path with the given segment appended.
            pub fn child(&self, name: &str) -> Self {
                if self.is_root() {
                    Self(format!("{SEPARATOR}{name}"))
                } else {
                    Self(format!("{}{SEPARATOR}{name}", self.0))
                }
            }

            /// Returns the last segment, or the empty string for the root.
            pub fn name(&self) -> &str {
                match self.0.rfind(SEPARATOR) {
                    Some(index) => &self.0[index + 1..],
                    None => "",
                }
            }

            /// Returns the number of segments (`0` for the root).
            pub fn depth(&self) -> usize {
                if self.is_root() {
                    0
                } else {
                    self.0.matches(SEPARATOR).count()
                }
            }

            /// Returns the path as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParsePathError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParsePathError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                validate(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(path: $name) -> String {
                path.0
            }
        }
    };
}

define_path!(
    /// Path of a project within its build's hierarchy (e.g. `:app:core`).
    ProjectPath
);

define_path!(
    /// Identity path of a build within the build tree (`:` for the root build).
    BuildPath
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_properties() {
        let root = ProjectPath::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), ":");
        assert_eq!(root.parent(), None);
        assert_eq!(root.name(), "");
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn parent_chain() {
        let path = ProjectPath::parse(":a:b:c").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), ":a:b");
        assert_eq!(parent.parent().unwrap().as_str(), ":a");
        assert!(parent.parent().unwrap().parent().unwrap().is_root());
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn child_of_root_and_nested() {
        let app = ProjectPath::root().child("app");
        assert_eq!(app.as_str(), ":app");
        assert_eq!(app.child("core").as_str(), ":app:core");
        assert_eq!(app.child("core").name(), "core");
    }

    #[test]
    fn rejects_relative_paths() {
        assert!(matches!(
            ProjectPath::parse("app"),
            Err(ParsePathError::NotAbsolute(_))
        ));
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(matches!(
            BuildPath::parse(":a::b"),
            Err(ParsePathError::EmptySegment(_))
        ));
        assert!(matches!(
            BuildPath::parse(":a:"),
            Err(ParsePathError::EmptySegment(_))
        ));
    }

    #[test]
    fn ordering_places_ancestors_first() {
        let a = ProjectPath::parse(":a").unwrap();
        let ab = ProjectPath::parse(":a:b").unwrap();
        assert!(ProjectPath::root() < a);
        assert!(a < ab);
    }

    #[test]
    fn serde_roundtrip_and_validation() {
        let path = BuildPath::parse(":included").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\":included\"");
        let back: BuildPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<BuildPath>("\"bad\"").is_err());
    }
}
