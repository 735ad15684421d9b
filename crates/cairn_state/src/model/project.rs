//! Project hierarchy of one build and its mutable configuration models.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use cairn_common::{define_id, Arena, ArenaId, ProjectPath};
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

define_id!(
    /// Opaque identifier of a project within one build's registry.
    ProjectId
);

/// Mutable configuration of a project.
///
/// A model equal to [`ProjectModel::default`] is trivial and is never
/// written to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectModel {
    /// Group coordinate.
    pub group: Option<String>,
    /// Version coordinate.
    pub version: Option<String>,
    /// Human readable description.
    pub description: Option<String>,
    /// Extra properties set during configuration.
    pub properties: BTreeMap<String, String>,
}

impl ProjectModel {
    /// Returns `true` when nothing was configured.
    pub fn is_trivial(&self) -> bool {
        self.group.is_none()
            && self.version.is_none()
            && self.description.is_none()
            && self.properties.is_empty()
    }

    /// Snapshots the model for storage, or `None` when it is trivial.
    pub fn cached_state(&self, path: &ProjectPath) -> Option<CachedProjectState> {
        if self.is_trivial() {
            return None;
        }
        Some(CachedProjectState {
            path: path.clone(),
            group: self.group.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            properties: self.properties.clone(),
        })
    }

    /// Restores a snapshot taken by [`cached_state`](Self::cached_state).
    pub fn apply_cached_state(&mut self, state: CachedProjectState) {
        self.group = state.group;
        self.version = state.version;
        self.description = state.description;
        self.properties = state.properties;
    }
}

/// Persisted snapshot of a non-trivial [`ProjectModel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProjectState {
    /// Project the snapshot belongs to.
    pub path: ProjectPath,
    /// Group coordinate.
    pub group: Option<String>,
    /// Version coordinate.
    pub version: Option<String>,
    /// Human readable description.
    pub description: Option<String>,
    /// Extra properties.
    pub properties: BTreeMap<String, String>,
}

/// One project of a build.
#[derive(Debug)]
pub struct ProjectState {
    path: ProjectPath,
    project_dir: PathBuf,
    build_dir: PathBuf,
    parent: Option<ProjectId>,
    model: Mutex<ProjectModel>,
}

impl ProjectState {
    /// Returns the project path.
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    /// Returns the project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Returns the build output directory.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Returns the parent project, `None` for the root project.
    pub fn parent(&self) -> Option<ProjectId> {
        self.parent
    }

    /// Locks the project's mutable model, blocking until it is available.
    ///
    /// Do not call this while an [`AllProjectsGuard`] of the same registry is
    /// held on this thread; read through the guard instead.
    pub fn model(&self) -> MutexGuard<'_, ProjectModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the model if no one else holds it.
    pub fn try_model(&self) -> Option<MutexGuard<'_, ProjectModel>> {
        match self.model.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Every project of one build, indexed by [`ProjectId`] and by path.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: Arena<ProjectId, ProjectState>,
    by_path: HashMap<ProjectPath, ProjectId>,
}

impl ProjectRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project. Its parent must already be registered.
    pub fn register(
        &mut self,
        path: ProjectPath,
        project_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
    ) -> StateResult<ProjectId> {
        if self.by_path.contains_key(&path) {
            return Err(StateError::DuplicateProject { path });
        }
        let parent = match path.parent() {
            None => None,
            Some(parent_path) => match self.by_path.get(&parent_path) {
                Some(&id) => Some(id),
                None => return Err(StateError::MissingParentProject { path }),
            },
        };
        let id = self.projects.alloc(ProjectState {
            path: path.clone(),
            project_dir: project_dir.into(),
            build_dir: build_dir.into(),
            parent,
            model: Mutex::new(ProjectModel::default()),
        });
        self.by_path.insert(path, id);
        Ok(id)
    }

    /// Registers a project with an already configured model.
    pub fn register_with_model(
        &mut self,
        path: ProjectPath,
        project_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        model: ProjectModel,
    ) -> StateResult<ProjectId> {
        let id = self.register(path, project_dir, build_dir)?;
        *self.projects[id].model() = model;
        Ok(id)
    }

    /// Returns the project with the given ID.
    pub fn get(&self, id: ProjectId) -> &ProjectState {
        &self.projects[id]
    }

    /// Looks up a project by path.
    pub fn find(&self, path: &ProjectPath) -> Option<ProjectId> {
        self.by_path.get(path).copied()
    }

    /// Returns the root project, if registered.
    pub fn root(&self) -> Option<ProjectId> {
        self.find(&ProjectPath::root())
    }

    /// Returns the direct children of a project in registration order.
    pub fn children_of(&self, id: ProjectId) -> Vec<ProjectId> {
        self.projects
            .iter()
            .filter(|(_, project)| project.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    /// Iterates over all projects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ProjectId, &ProjectState)> {
        self.projects.iter()
    }

    /// Returns the number of registered projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Returns `true` if no project is registered.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Locks the model of every project, in registration order.
    ///
    /// The locks are held until the returned guard is dropped, so a write
    /// pass sees one consistent snapshot of the build.
    pub fn lock_all(&self) -> AllProjectsGuard<'_> {
        let models = self
            .projects
            .values()
            .map(|project| project.model())
            .collect();
        AllProjectsGuard {
            registry: self,
            models,
        }
    }
}

/// Exclusive access to the models of every project of a build.
pub struct AllProjectsGuard<'a> {
    registry: &'a ProjectRegistry,
    models: Vec<MutexGuard<'a, ProjectModel>>,
}

impl AllProjectsGuard<'_> {
    /// Returns the locked model of a project.
    pub fn model(&self, id: ProjectId) -> &ProjectModel {
        &self.models[id_index(id)]
    }

    /// Snapshots a project's model, `None` when it is trivial.
    pub fn cached_state(&self, id: ProjectId) -> Option<CachedProjectState> {
        self.model(id).cached_state(self.registry.get(id).path())
    }
}

fn id_index(id: ProjectId) -> usize {
    id.as_raw() as usize
}
