//! Build units and the build tree of one store or load session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cairn_common::{BuildDefinition, BuildPath};

use crate::error::{StateError, StateResult};
use crate::model::project::ProjectRegistry;
use crate::model::tree_state::{BuildServiceSpec, BuildTreeState};
use crate::work::WorkNode;

/// Name given to the implicit plugin build of a build.
pub(crate) const BUILD_SRC: &str = "buildSrc";

/// Reference from one build to a build it includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludedBuild {
    /// A build other than the root, resolved through the [`BuildTree`].
    Included(BuildDefinition),
    /// The root build of the tree.
    Root,
}

/// Invocation parameters of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParameter {
    /// Requested task names.
    pub task_names: Vec<String>,
}

/// One build of a composite build tree.
#[derive(Debug)]
pub struct BuildUnit {
    /// Where the build lives and how it was included.
    pub definition: BuildDefinition,
    /// Settings file of the build, if any.
    pub settings_file: Option<PathBuf>,
    /// Name of the build's root project.
    pub root_project_name: String,
    /// Invocation parameters.
    pub start_parameter: StartParameter,
    /// Builds included by this one, in declaration order.
    pub included_builds: Vec<IncludedBuild>,
    /// Registered projects.
    pub projects: ProjectRegistry,
    /// Work scheduled for this build, in execution order.
    pub scheduled_work: Vec<WorkNode>,
    /// Registered build services.
    pub build_services: Vec<BuildServiceSpec>,
    /// Outputs deleted before the build runs.
    pub output_cleanup: Vec<PathBuf>,
    /// Whether the build declares source dependency rules.
    pub has_source_dependency_rules: bool,
}

impl BuildUnit {
    /// Creates an empty build from its definition.
    pub fn new(definition: BuildDefinition) -> Self {
        Self {
            root_project_name: definition.name.clone(),
            definition,
            settings_file: None,
            start_parameter: StartParameter::default(),
            included_builds: Vec::new(),
            projects: ProjectRegistry::new(),
            scheduled_work: Vec::new(),
            build_services: Vec::new(),
            output_cleanup: Vec::new(),
            has_source_dependency_rules: false,
        }
    }

    /// Creates the root build of a tree.
    pub fn root(name: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self::new(BuildDefinition::root(name, root_dir))
    }

    /// Returns the identity of the build within the tree.
    pub fn identity(&self) -> BuildPath {
        self.definition.identity_path()
    }

    /// Returns `true` for the root build.
    pub fn is_root(&self) -> bool {
        self.definition.from_build.is_none()
    }

    /// Returns the build name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Returns the root directory.
    pub fn root_dir(&self) -> &Path {
        self.definition.root_dir()
    }

    /// Returns `true` for the implicit plugin build.
    pub fn is_build_src(&self) -> bool {
        self.definition.name == BUILD_SRC
    }

    /// Looks up a registered build service by name.
    pub fn build_service(&self, name: &str) -> Option<&BuildServiceSpec> {
        self.build_services.iter().find(|s| s.name == name)
    }
}

/// Restored state of one build and of the builds stored beneath it.
#[derive(Debug)]
pub struct CachedBuildState {
    /// The rebuilt build unit.
    pub build: BuildUnit,
    /// Scheduled work, in stored order.
    pub work_graph: Vec<WorkNode>,
    /// Included builds whose state was stored under this build.
    pub children: Vec<CachedBuildState>,
}

impl CachedBuildState {
    /// Visits this build and every descendant, parent first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a CachedBuildState)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Finds a restored build by identity.
    pub fn find(&self, identity: &BuildPath) -> Option<&CachedBuildState> {
        if &self.build.identity() == identity {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(identity))
    }

    /// Counts this build and every descendant.
    pub fn build_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CachedBuildState::build_count)
            .sum::<usize>()
    }
}

/// Every build of a store session, keyed by root directory.
#[derive(Debug)]
pub struct BuildTree {
    builds: Vec<BuildUnit>,
    by_root_dir: HashMap<PathBuf, usize>,
    /// State shared by the whole tree.
    pub state: BuildTreeState,
}

impl BuildTree {
    /// Creates a tree around its root build.
    pub fn new(root: BuildUnit) -> Self {
        let by_root_dir = HashMap::from([(root.root_dir().to_path_buf(), 0)]);
        Self {
            builds: vec![root],
            by_root_dir,
            state: BuildTreeState::default(),
        }
    }

    /// Adds a build included somewhere in the tree.
    pub fn add_build(&mut self, build: BuildUnit) -> StateResult<()> {
        let root_dir = build.root_dir().to_path_buf();
        if self.by_root_dir.contains_key(&root_dir) {
            return Err(StateError::DuplicateBuild { root_dir });
        }
        self.by_root_dir.insert(root_dir, self.builds.len());
        self.builds.push(build);
        Ok(())
    }

    /// Returns the root build.
    pub fn root(&self) -> &BuildUnit {
        &self.builds[0]
    }

    /// Resolves an included build definition to its build.
    pub fn build_for(&self, definition: &BuildDefinition) -> StateResult<&BuildUnit> {
        self.by_root_dir
            .get(definition.root_dir())
            .map(|&index| &self.builds[index])
            .ok_or_else(|| StateError::UnknownBuild {
                root_dir: definition.root_dir.clone(),
            })
    }

    /// Finds a build by identity.
    pub fn build_by_identity(&self, identity: &BuildPath) -> Option<&BuildUnit> {
        self.builds.iter().find(|b| &b.identity() == identity)
    }

    /// Returns a build for modification by root directory.
    pub fn build_mut(&mut self, root_dir: &Path) -> Option<&mut BuildUnit> {
        let index = *self.by_root_dir.get(root_dir)?;
        self.builds.get_mut(index)
    }

    /// Iterates over all builds, root first.
    pub fn builds(&self) -> impl Iterator<Item = &BuildUnit> {
        self.builds.iter()
    }
}
