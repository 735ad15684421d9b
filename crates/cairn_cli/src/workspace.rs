//! Locating the workspace and its cache.

use std::path::{Path, PathBuf};

use cairn_config::{CairnConfig, CONFIG_FILE_NAME};
use cairn_state::ConfigurationCacheIo;

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `cairn.toml`.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the workspace directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory.
pub fn resolve_workspace_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_workspace_root(&std::env::current_dir()?)
    }
}

/// Workspace directory, parsed configuration and cache handle.
pub struct Workspace {
    /// Directory holding `cairn.toml`; relative paths resolve against it.
    pub dir: PathBuf,
    /// The parsed configuration.
    pub config: CairnConfig,
    /// The cache entry of this workspace.
    pub io: ConfigurationCacheIo,
}

impl Workspace {
    /// Loads the workspace selected by the global arguments.
    pub fn open(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = resolve_workspace_root(global)?;
        let config = cairn_config::load_config(&dir)?;
        let io = ConfigurationCacheIo::new(dir.join(&config.cache.dir));
        Ok(Self { dir, config, io })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn config_file_selects_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&file, "").unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(file.display().to_string()),
        };
        assert_eq!(resolve_workspace_root(&global).unwrap(), dir.path());
    }
}
