//! Synthetic tooling events for a build tree restored from the cache.
//!
//! Nothing is configured on load, but tooling still expects to observe the
//! builds and projects of the tree. The events emitted here stand in for
//! the ones a real configuration pass would have produced.

use cairn_common::ProjectPath;

use crate::model::{BuildUnit, CachedBuildState, ProjectId};
use crate::operations::{
    BuildOperation, BuildOperationRunner, OperationKind, ProgressDetails, ProjectTree,
};

/// How a load reports the restored tree to tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Emit synthetic configure operations.
    Configure,
    /// Emit identification progress events only.
    Identify,
    /// Emit nothing; the real events already fired in this invocation.
    Skip,
}

/// Options describing the invocation performing a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Whether the invocation stores an entry and immediately loads it back.
    pub load_after_store_mode: bool,
    /// Whether this load directly follows a store in the same invocation.
    pub loaded_after_store: bool,
}

impl LoadOptions {
    /// Chooses the replay mode for this load.
    pub fn replay_mode(&self) -> ReplayMode {
        match (self.load_after_store_mode, self.loaded_after_store) {
            (false, _) => ReplayMode::Configure,
            (true, false) => ReplayMode::Identify,
            (true, true) => ReplayMode::Skip,
        }
    }

    /// Whether reading a build is wrapped in synthetic load operations.
    pub fn synthesizes_load_operations(&self) -> bool {
        self.replay_mode() == ReplayMode::Configure
    }
}

/// Emits the events of `mode` for `state` and every build stored under it.
pub fn replay(state: &CachedBuildState, mode: ReplayMode, operations: &BuildOperationRunner) {
    match mode {
        ReplayMode::Configure => configure_build(state, operations),
        ReplayMode::Identify => identify_build(state, operations),
        ReplayMode::Skip => {}
    }
}

fn identify_build(state: &CachedBuildState, operations: &BuildOperationRunner) {
    let build = state.build.identity();
    operations.progress(ProgressDetails::BuildIdentified {
        build: build.clone(),
    });
    operations.progress(ProgressDetails::ProjectsIdentified {
        build,
        root_project: project_tree(&state.build),
    });
    for child in &state.children {
        identify_build(child, operations);
    }
}

fn configure_build(state: &CachedBuildState, operations: &BuildOperationRunner) {
    let build = state.build.identity();
    operations.call(
        BuildOperation::for_build(OperationKind::ConfigureBuild, build.clone()),
        || {
            operations.call(
                BuildOperation::for_build(OperationKind::LoadProjects, build.clone()),
                || {},
            );
            for child in &state.children {
                configure_build(child, operations);
            }
            operations.call(
                BuildOperation::for_project(
                    OperationKind::ConfigureProject,
                    build.clone(),
                    ProjectPath::root(),
                ),
                || {},
            );
        },
    );
}

/// Builds the announced project hierarchy of a build.
///
/// Only restored projects are known; a build without any restored project
/// announces a bare root project.
pub fn project_tree(build: &BuildUnit) -> ProjectTree {
    match build.projects.root() {
        Some(root) => subtree(build, root),
        None => ProjectTree {
            name: build.root_project_name.clone(),
            path: ProjectPath::root(),
            project_dir: build.root_dir().to_path_buf(),
            children: Vec::new(),
        },
    }
}

fn subtree(build: &BuildUnit, id: ProjectId) -> ProjectTree {
    let project = build.projects.get(id);
    let name = if project.path().is_root() {
        build.root_project_name.clone()
    } else {
        project.path().name().to_string()
    };
    ProjectTree {
        name,
        path: project.path().clone(),
        project_dir: project.project_dir().to_path_buf(),
        children: build
            .projects
            .children_of(id)
            .into_iter()
            .map(|child| subtree(build, child))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::RecordingListener;
    use cairn_common::{BuildDefinition, BuildPath};
    use std::sync::Arc;

    fn tree() -> CachedBuildState {
        let mut root = BuildUnit::root("app", "/work/app");
        root.projects
            .register(ProjectPath::root(), "/work/app", "/work/app/build")
            .unwrap();
        root.projects
            .register(
                ProjectPath::parse(":core").unwrap(),
                "/work/app/core",
                "/work/app/core/build",
            )
            .unwrap();
        let lib = BuildUnit::new(BuildDefinition::included(
            "lib",
            "/work/lib",
            BuildPath::root(),
        ));
        CachedBuildState {
            build: root,
            work_graph: Vec::new(),
            children: vec![CachedBuildState {
                build: lib,
                work_graph: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    fn recorded(mode: ReplayMode) -> Arc<RecordingListener> {
        let listener = Arc::new(RecordingListener::new());
        let runner = BuildOperationRunner::new(listener.clone());
        replay(&tree(), mode, &runner);
        listener
    }

    #[test]
    fn mode_selection() {
        let mode = |load_after_store_mode, loaded_after_store| {
            LoadOptions {
                load_after_store_mode,
                loaded_after_store,
            }
            .replay_mode()
        };
        assert_eq!(mode(false, false), ReplayMode::Configure);
        assert_eq!(mode(false, true), ReplayMode::Configure);
        assert_eq!(mode(true, false), ReplayMode::Identify);
        assert_eq!(mode(true, true), ReplayMode::Skip);
    }

    #[test]
    fn configure_nests_children_between_load_and_configure_project() {
        let listener = recorded(ReplayMode::Configure);
        let names: Vec<String> = listener
            .started()
            .iter()
            .map(|d| d.operation.display_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "Configure build :",
                "Load projects :",
                "Configure build :lib",
                "Load projects :lib",
                "Configure project :lib",
                "Configure project :",
            ]
        );
        let started = listener.started();
        assert_eq!(started[2].parent, Some(started[0].id));
        assert_eq!(started[5].parent, Some(started[0].id));
        assert!(listener.progress().is_empty());
    }

    #[test]
    fn identify_announces_builds_parent_first() {
        let listener = recorded(ReplayMode::Identify);
        assert!(listener.started().is_empty());
        let progress = listener.progress();
        assert_eq!(progress.len(), 4);
        assert!(matches!(
            &progress[0],
            ProgressDetails::BuildIdentified { build } if build.is_root()
        ));
        match &progress[1] {
            ProgressDetails::ProjectsIdentified { root_project, .. } => {
                assert_eq!(root_project.name, "app");
                assert_eq!(root_project.children.len(), 1);
                assert_eq!(root_project.children[0].name, "core");
            }
            other => panic!("unexpected event {other:?}"),
        }
        match &progress[3] {
            ProgressDetails::ProjectsIdentified { build, root_project } => {
                assert_eq!(build.as_str(), ":lib");
                assert_eq!(root_project.name, "lib");
                assert!(root_project.children.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn skip_emits_nothing() {
        assert!(recorded(ReplayMode::Skip).events().is_empty());
    }
}
