//! Dependency resolution: turning `depends_on` strings into build-qualified references.

use crate::error::ConfigError;

/// Separator between a build name and a node path in a cross-build reference.
const BUILD_SEPARATOR: char = '@';

/// A work dependency as written in `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    /// Name of the build scheduling the node; `None` for the declaring build.
    pub build: Option<String>,
    /// Node path within that build.
    pub path: String,
}

/// Parses one `depends_on` entry.
///
/// `:app:compile` refers to a node of the declaring build; `lib@:jar`
/// refers to node `:jar` of the build named `lib`.
pub fn parse_dependency(entry: &str) -> Result<DependencyRef, ConfigError> {
    let (build, path) = match entry.split_once(BUILD_SEPARATOR) {
        Some((build, path)) => {
            if build.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "dependency '{entry}' has an empty build name"
                )));
            }
            (Some(build.to_string()), path)
        }
        None => (None, entry),
    };
    if !path.starts_with(':') {
        return Err(ConfigError::ValidationError(format!(
            "dependency '{entry}' must name a node path starting with ':'"
        )));
    }
    Ok(DependencyRef {
        build,
        path: path.to_string(),
    })
}
