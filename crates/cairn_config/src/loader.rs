//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::parse_dependency;
use crate::types::CairnConfig;
use std::collections::HashSet;
use std::path::Path;

/// File name of the configuration inside a workspace directory.
pub const CONFIG_FILE_NAME: &str = "cairn.toml";

/// Loads and validates a `cairn.toml` configuration from a workspace directory.
pub fn load_config(dir: &Path) -> Result<CairnConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates a `cairn.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<CairnConfig, ConfigError> {
    let config: CairnConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that the declared builds form a usable tree.
fn validate_config(config: &CairnConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for (index, build) in config.builds.iter().enumerate() {
        if build.name.is_empty() {
            return Err(ConfigError::MissingField(format!("builds[{index}].name")));
        }
        if !names.insert(build.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "build '{}' is declared more than once",
                build.name
            )));
        }
    }

    match config.builds.iter().filter(|b| b.root).count() {
        0 => return Err(ConfigError::ValidationError("no root build declared".to_string())),
        1 => {}
        n => {
            return Err(ConfigError::ValidationError(format!(
                "{n} builds are marked as root; exactly one is allowed"
            )))
        }
    }

    for build in &config.builds {
        if let Some(unknown) = build.includes.iter().find(|n| !names.contains(n.as_str())) {
            return Err(ConfigError::UnknownBuild(unknown.clone()));
        }
        for project in &build.projects {
            if !project.path.starts_with(':') {
                return Err(ConfigError::ValidationError(format!(
                    "project path '{}' in build '{}' must start with ':'",
                    project.path, build.name
                )));
            }
        }
        for work in &build.work {
            if work.id.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "builds.{}.work.id",
                    build.name
                )));
            }
            for entry in &work.depends_on {
                let dependency = parse_dependency(entry)?;
                if let Some(target) = &dependency.build {
                    if !names.contains(target.as_str()) {
                        return Err(ConfigError::UnknownBuild(target.clone()));
                    }
                }
            }
        }
    }

    for listener in &config.listeners {
        match (&listener.build, &listener.service, &listener.type_name) {
            (Some(build), Some(service), None) => {
                let decl = config
                    .build_named(build)
                    .ok_or_else(|| ConfigError::UnknownBuild(build.clone()))?;
                if !decl.services.iter().any(|s| &s.name == service) {
                    return Err(ConfigError::ValidationError(format!(
                        "listener refers to unknown service '{service}' of build '{build}'"
                    )));
                }
            }
            (None, None, Some(_)) => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "a listener needs either `build` and `service`, or `type`".to_string(),
                ))
            }
        }
    }
    Ok(())
}
