//! Chooses which projects of a build are stored.
//!
//! A project is relevant when it owns scheduled work or is an ancestor of
//! such a project. Ancestors are needed because registering a project on
//! load requires its parent to be registered first.

use std::collections::HashSet;

use cairn_common::BuildPath;

use crate::error::{StateError, StateResult};
use crate::model::{ProjectId, ProjectRegistry};
use crate::work::WorkNode;

/// Returns the projects owning `nodes`, plus their ancestors, ancestors first.
pub fn relevant_projects(
    build: &BuildPath,
    nodes: &[WorkNode],
    registry: &ProjectRegistry,
) -> StateResult<Vec<ProjectId>> {
    let mut seen = HashSet::new();
    let mut owners = Vec::new();
    for owner in nodes.iter().filter_map(|node| node.owner.as_ref()) {
        let id = registry
            .find(owner)
            .ok_or_else(|| StateError::UnknownProject {
                build: build.clone(),
                path: owner.clone(),
            })?;
        if seen.insert(id) {
            owners.push(id);
        }
    }
    Ok(fill_the_gaps(&owners, registry))
}

/// Inserts every missing ancestor of each project right before it.
///
/// The result contains each project once, and every project appears after
/// all of its ancestors. Projects keep their relative input order.
pub fn fill_the_gaps(projects: &[ProjectId], registry: &ProjectRegistry) -> Vec<ProjectId> {
    let mut present = HashSet::with_capacity(projects.len());
    let mut result = Vec::with_capacity(projects.len());
    let mut missing = Vec::new();
    for &project in projects {
        if present.contains(&project) {
            continue;
        }
        let mut parent = registry.get(project).parent();
        while let Some(id) = parent {
            if present.contains(&id) {
                break;
            }
            missing.push(id);
            parent = registry.get(id).parent();
        }
        for ancestor in missing.drain(..).rev() {
            present.insert(ancestor);
            result.push(ancestor);
        }
        present.insert(project);
        result.push(project);
    }
    result
}
