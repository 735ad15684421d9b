//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cairn_cache::{CacheError, StateFile};
use cairn_common::{BuildDefinition, BuildPath, ProjectPath};
use cairn_diagnostics::DiagnosticSink;
use cairn_state::{
    BuildOperationRunner, BuildTree, BuildTreeState, BuildTreeWorkGraph, BuildUnit,
    ConfigurationCacheIo, IncludedBuild, LoadOptions, LoadServices, LoadedBuildTree, NodeId,
    ProjectModel, RecordingListener, StateResult, WorkNode,
};
use tempfile::NamedTempFile;

pub fn path(s: &str) -> ProjectPath {
    ProjectPath::parse(s).unwrap()
}

pub fn build_path(s: &str) -> BuildPath {
    BuildPath::parse(s).unwrap()
}

pub fn node(build: &BuildPath, path: &str, owner: Option<&str>) -> WorkNode {
    WorkNode::new(
        NodeId::new(build.clone(), path),
        owner.map(|o| ProjectPath::parse(o).unwrap()),
        format!("action {path}"),
    )
}

pub fn definition(base: &Path, name: &str) -> BuildDefinition {
    BuildDefinition::included(name, base.join(name), BuildPath::root())
}

pub fn included(base: &Path, name: &str) -> BuildUnit {
    let mut unit = BuildUnit::new(definition(base, name));
    let dir = base.join(name);
    unit.projects
        .register(ProjectPath::root(), &dir, dir.join("build"))
        .unwrap();
    unit
}

/// Root `app` includes `lib` and `plugins`; `lib` includes `plugins` and the
/// root; `plugins` includes `lib` back.
pub fn diamond_tree(base: &Path) -> BuildTree {
    let app_dir = base.join("app");
    let lib = build_path(":lib");
    let plugins = build_path(":plugins");

    let mut root = BuildUnit::root("app", &app_dir);
    root.start_parameter.task_names = vec!["assemble".to_string()];
    root.projects
        .register(ProjectPath::root(), &app_dir, app_dir.join("build"))
        .unwrap();
    root.projects
        .register_with_model(
            path(":app"),
            app_dir.join("app"),
            app_dir.join("app/build"),
            ProjectModel {
                group: Some("org.example".to_string()),
                version: Some("1.0".to_string()),
                ..ProjectModel::default()
            },
        )
        .unwrap();
    root.projects
        .register(path(":unused"), app_dir.join("unused"), app_dir.join("unused/build"))
        .unwrap();
    root.scheduled_work = vec![node(&BuildPath::root(), ":app:compile", Some(":app"))
        .depends_on(NodeId::new(lib.clone(), ":jar"))
        .depends_on(NodeId::new(plugins.clone(), ":plugin"))];
    root.included_builds = vec![
        IncludedBuild::Included(definition(base, "lib")),
        IncludedBuild::Included(definition(base, "plugins")),
    ];

    let mut lib_unit = included(base, "lib");
    lib_unit.scheduled_work = vec![
        node(&lib, ":compile", Some(":")),
        node(&lib, ":jar", Some(":")).depends_on(NodeId::new(lib.clone(), ":compile")),
    ];
    lib_unit.included_builds = vec![
        IncludedBuild::Included(definition(base, "plugins")),
        IncludedBuild::Root,
    ];

    let mut plugins_unit = included(base, "plugins");
    plugins_unit.definition.plugin_build = true;
    plugins_unit.scheduled_work = vec![node(&plugins, ":plugin", None)];
    plugins_unit.included_builds = vec![IncludedBuild::Included(definition(base, "lib"))];

    let mut tree = BuildTree::new(root);
    tree.add_build(lib_unit).unwrap();
    tree.add_build(plugins_unit).unwrap();
    tree
}

/// Creates build units for a load, rooted at `base/app`.
pub fn factory(base: &Path) -> impl FnMut(Option<&Path>, &str) -> BuildUnit + '_ {
    move |settings, name| {
        let mut unit = BuildUnit::root(name, base.join(name));
        unit.settings_file = settings.map(Path::to_path_buf);
        unit
    }
}

pub struct Loaded {
    pub tree: LoadedBuildTree,
    pub tree_state: BuildTreeState,
    pub events: Arc<RecordingListener>,
    pub diagnostics: DiagnosticSink,
}

impl std::fmt::Debug for Loaded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loaded")
            .field("tree", &self.tree)
            .field("tree_state", &self.tree_state)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

pub fn store(io: &ConfigurationCacheIo, tree: &BuildTree) -> StateResult<Vec<PathBuf>> {
    io.store(tree, &DiagnosticSink::new())
        .map(|details| details.stored_included_builds)
}

pub fn load_from(
    io: &ConfigurationCacheIo,
    state_file: &dyn StateFile,
    base: &Path,
    options: LoadOptions,
) -> StateResult<Loaded> {
    let events = Arc::new(RecordingListener::new());
    let runner = BuildOperationRunner::new(events.clone());
    let diagnostics = DiagnosticSink::new();
    let mut tree_state = BuildTreeState::default();
    let mut work_graph = BuildTreeWorkGraph::new();
    let mut create_build = factory(base);
    let tree = io.read_root_build_state_from(
        state_file,
        LoadServices {
            tree_state: &mut tree_state,
            operations: &runner,
            work_graph: &mut work_graph,
        },
        options,
        &diagnostics,
        &mut create_build,
    )?;
    Ok(Loaded {
        tree,
        tree_state,
        events,
        diagnostics,
    })
}

pub fn load(io: &ConfigurationCacheIo, base: &Path, options: LoadOptions) -> StateResult<Loaded> {
    load_from(io, &io.work_state_file(), base, options)
}

/// A [`StateFile`] that counts how often each file is opened for reading.
pub struct CountingStateFile {
    inner: Box<dyn StateFile>,
    reads: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl CountingStateFile {
    pub fn new(inner: Box<dyn StateFile>) -> Self {
        Self {
            inner,
            reads: Arc::default(),
        }
    }

    pub fn reads_of(&self, path: &Path) -> usize {
        self.reads.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }
}

impl StateFile for CountingStateFile {
    fn path(&self) -> PathBuf {
        self.inner.path()
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn output_stream(&self) -> Result<Box<dyn Write>, CacheError> {
        self.inner.output_stream()
    }

    fn input_stream(&self) -> Result<Box<dyn Read>, CacheError> {
        *self.reads.lock().unwrap().entry(self.path()).or_default() += 1;
        self.inner.input_stream()
    }

    fn delete(&self) -> Result<(), CacheError> {
        self.inner.delete()
    }

    fn move_from(&self, file: &Path) -> Result<(), CacheError> {
        self.inner.move_from(file)
    }

    fn create_temp_file(&self) -> Result<NamedTempFile, CacheError> {
        self.inner.create_temp_file()
    }

    fn state_file_for_included_build(&self, build: &BuildDefinition) -> Box<dyn StateFile> {
        Box::new(CountingStateFile {
            inner: self.inner.state_file_for_included_build(build),
            reads: Arc::clone(&self.reads),
        })
    }
}
