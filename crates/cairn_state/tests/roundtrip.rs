mod common;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use cairn_cache::{CacheError, StateFile};
use cairn_codec::WriteContext;
use cairn_common::{BuildDefinition, BuildPath, ProjectPath};
use cairn_state::{
    BuildCacheConfiguration, BuildTree, BuildUnit, ConfigurationCacheIo, EnvironmentState,
    FeaturePreview, IncludedBuild, ListenerSubscription, LoadOptions, NodeId, StateError,
};

use common::{
    build_path, definition, diamond_tree, included, load, load_from, node, path, store,
    CountingStateFile,
};
use tempfile::NamedTempFile;

#[test]
fn worked_example_restores_two_builds() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let inc = build_path(":inc");

    let mut root = BuildUnit::root("app", base.join("app"));
    root.projects
        .register(ProjectPath::root(), base.join("app"), base.join("app/build"))
        .unwrap();
    root.projects
        .register(path(":app"), base.join("app/app"), base.join("app/app/build"))
        .unwrap();
    let t1 = node(&BuildPath::root(), ":app:t1", Some(":app"));
    root.scheduled_work = vec![t1.clone()];
    root.included_builds = vec![IncludedBuild::Included(BuildDefinition::included(
        "inc",
        base.join("inc"),
        BuildPath::root(),
    ))];
    let mut inc_unit = included(base, "inc");
    let t2 = node(&inc, ":t2", Some(":"));
    inc_unit.scheduled_work = vec![t2.clone()];

    let mut tree = BuildTree::new(root);
    tree.add_build(inc_unit).unwrap();

    let io = ConfigurationCacheIo::new(base.join("cache"));
    let stored = store(&io, &tree).unwrap();
    assert_eq!(stored, vec![base.join("inc")]);

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    let state = &loaded.tree.state;
    assert!(state.build.is_root());
    assert_eq!(state.work_graph, vec![t1.clone()]);
    assert_eq!(state.children.len(), 1);
    assert_eq!(state.children[0].build.identity(), inc);
    assert_eq!(state.children[0].work_graph, vec![t2.clone()]);
    assert!(state.children[0].children.is_empty());

    let graph = &loaded.tree.graph;
    let builds: Vec<_> = graph.builds().cloned().collect();
    assert_eq!(builds, vec![BuildPath::root(), inc.clone()]);
    assert_eq!(graph.scheduled_nodes(&BuildPath::root()).unwrap(), &[t1]);
    assert_eq!(graph.scheduled_nodes(&inc).unwrap(), &[t2]);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn diamond_stores_shared_build_once() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let tree = diamond_tree(base);

    let stored = store(&io, &tree).unwrap();
    assert_eq!(stored, vec![base.join("lib"), base.join("plugins")]);
    assert_eq!(
        io.entry_details().unwrap().stored_included_builds,
        stored
    );

    let root_file = CountingStateFile::new(Box::new(io.work_state_file()));
    let loaded = load_from(&io, &root_file, base, LoadOptions::default()).unwrap();

    let plugins_file = io
        .work_state_file()
        .state_file_for_included_build(&common::definition(base, "plugins"))
        .path();
    assert_eq!(root_file.reads_of(&plugins_file), 1);
    assert_eq!(root_file.total_reads(), 3);

    let state = &loaded.tree.state;
    assert_eq!(state.build_count(), 3);
    assert_eq!(state.build.included_builds.len(), 2);
    let lib = &state.children[0];
    assert_eq!(lib.build.name(), "lib");
    assert_eq!(lib.build.included_builds[1], IncludedBuild::Root);
    let plugins = &lib.children[0];
    assert_eq!(plugins.build.name(), "plugins");
    assert!(plugins.build.definition.plugin_build);
    assert!(plugins.children.is_empty());
}

#[test]
fn diamond_graph_links_builds() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    let graph = &loaded.tree.graph;
    let builds: Vec<String> = graph.builds().map(|b| b.to_string()).collect();
    assert_eq!(builds, vec![":", ":lib", ":plugins"]);
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);
    assert!(graph.is_acyclic());

    let compile = NodeId::new(BuildPath::root(), ":app:compile");
    let deps: Vec<String> = graph
        .dependencies_of(&compile)
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(deps, vec![":lib:jar", ":plugins:plugin"]);
}

#[test]
fn only_relevant_projects_and_models_are_restored() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let tree = diamond_tree(base);
    store(&io, &tree).unwrap();

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    let root = &loaded.tree.state.build;
    assert_eq!(root.start_parameter.task_names, vec!["assemble"]);
    assert_eq!(root.projects.len(), 2);
    assert!(root.projects.find(&path(":unused")).is_none());
    let app = root.projects.find(&path(":app")).unwrap();
    let model = root.projects.get(app).model().clone();
    assert_eq!(model.group.as_deref(), Some("org.example"));
    assert_eq!(model.version.as_deref(), Some("1.0"));
    assert_eq!(root.projects.get(app).project_dir(), base.join("app/app"));

    let plugins = &loaded.tree.state.children[0].children[0];
    assert!(plugins.build.projects.is_empty());
}

#[test]
fn tree_state_survives_store_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let mut tree = diamond_tree(base);
    let mut environment = EnvironmentState::default();
    environment.set("JAVA_HOME", "/opt/jdk");
    environment.remove("DEBUG");
    tree.state.environment = environment.clone();
    tree.state.feature_flags.enable(FeaturePreview::TypesafeProjectAccessors);
    tree.state.build_cache = BuildCacheConfiguration {
        remote: Some(cairn_state::RemoteBuildCache {
            url: "https://cache.example.org".to_string(),
            push: false,
            allow_insecure_protocol: false,
        }),
        ..BuildCacheConfiguration::default()
    };
    store(&io, &tree).unwrap();

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    assert_eq!(loaded.tree_state.environment, environment);
    assert!(loaded
        .tree_state
        .feature_flags
        .is_enabled(FeaturePreview::TypesafeProjectAccessors));
    assert_eq!(loaded.tree_state.build_cache, tree.state.build_cache);
    assert!(loaded.tree_state.plugin_manager.adapter().is_none());
}

#[test]
fn service_backed_listener_of_included_build_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let mut tree = diamond_tree(base);
    let lib = build_path(":lib");
    tree.build_mut(&base.join("lib"))
        .unwrap()
        .build_services
        .push(cairn_state::BuildServiceSpec::new(lib.clone(), "timings"));
    let subscription = ListenerSubscription::ServiceBacked {
        build: lib,
        name: "timings".to_string(),
    };
    tree.state.listener_subscriptions.push(subscription.clone());
    store(&io, &tree).unwrap();

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    assert_eq!(loaded.tree_state.listener_subscriptions, vec![subscription]);
    let lib_state = &loaded.tree.state.children[0];
    assert!(lib_state.build.build_service("timings").is_some());
}

#[test]
fn store_holds_and_releases_project_locks() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let tree = diamond_tree(base);
    store(&io, &tree).unwrap();

    for build in tree.builds() {
        for (_, project) in build.projects.iter() {
            assert!(project.try_model().is_some(), "{} still locked", project.path());
        }
    }
}

#[test]
fn failed_store_keeps_previous_entry() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let cache = base.join("cache");
    let io = ConfigurationCacheIo::new(&cache);
    store(&io, &diamond_tree(base)).unwrap();
    let before = fs::read(io.work_state_file().path()).unwrap();

    let mut broken = diamond_tree(base);
    broken
        .state
        .listener_subscriptions
        .push(ListenerSubscription::ServiceBacked {
            build: BuildPath::root(),
            name: "missing".to_string(),
        });
    let err = store(&io, &broken).unwrap_err();
    assert!(matches!(err, StateError::UnknownBuildService { .. }));

    assert_eq!(fs::read(io.work_state_file().path()).unwrap(), before);
    assert!(load(&io, base, LoadOptions::default()).is_ok());
    let leftovers: Vec<PathBuf> = fs::read_dir(&cache)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(".tmp-"))
        })
        .collect();
    assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
}

#[test]
fn failure_after_included_builds_keeps_previous_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let lib = build_path(":lib");
    let lib_file = io
        .work_state_file()
        .state_file_for_included_build(&definition(base, "lib"));
    let lib_before = fs::read(lib_file.path()).unwrap();

    // The root's work graph is written after its included builds.
    let mut broken = diamond_tree(base);
    broken
        .build_mut(&base.join("lib"))
        .unwrap()
        .scheduled_work
        .push(node(&lib, ":extra", Some(":")));
    broken
        .build_mut(&base.join("app"))
        .unwrap()
        .scheduled_work
        .push(node(&BuildPath::root(), ":ghost:run", Some(":ghost")));
    let err = store(&io, &broken).unwrap_err();
    assert!(matches!(
        err,
        StateError::UnknownProject { path: ref project, .. } if *project == path(":ghost")
    ));

    assert_eq!(fs::read(lib_file.path()).unwrap(), lib_before);
    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    let lib_nodes: Vec<String> = loaded
        .tree
        .graph
        .scheduled_nodes(&lib)
        .unwrap()
        .iter()
        .map(|n| n.id.path.clone())
        .collect();
    assert_eq!(lib_nodes, vec![":compile", ":jar"]);

    let lib_dir = lib_file.path().parent().unwrap().to_path_buf();
    let names: Vec<String> = fs::read_dir(&lib_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["work.bin"]);
}

/// Delegates to the file system but cannot move nested files into place.
struct NestedMovesFail {
    inner: Box<dyn StateFile>,
    nested: bool,
}

impl StateFile for NestedMovesFail {
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
        self.inner.input_stream()
    }

    fn delete(&self) -> Result<(), CacheError> {
        self.inner.delete()
    }

    fn move_from(&self, file: &Path) -> Result<(), CacheError> {
        if self.nested {
            return Err(CacheError::Io {
                path: self.path(),
                source: io::Error::new(io::ErrorKind::Other, "no space left"),
            });
        }
        self.inner.move_from(file)
    }

    fn create_temp_file(&self) -> Result<NamedTempFile, CacheError> {
        self.inner.create_temp_file()
    }

    fn state_file_for_included_build(&self, build: &BuildDefinition) -> Box<dyn StateFile> {
        Box::new(NestedMovesFail {
            inner: self.inner.state_file_for_included_build(build),
            nested: true,
        })
    }
}

#[test]
fn failure_moving_nested_files_drops_the_entry() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    assert!(io.has_entry());

    let root_file = NestedMovesFail {
        inner: Box::new(io.work_state_file()),
        nested: false,
    };
    let err = io
        .write_root_build_state_to(
            &root_file,
            &diamond_tree(base),
            &cairn_diagnostics::DiagnosticSink::new(),
        )
        .unwrap_err();
    assert!(matches!(err, StateError::Cache(_)));
    assert!(!io.has_entry());
    assert!(load(&io, base, LoadOptions::default()).is_err());
}

#[test]
fn forged_reference_to_unknown_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));

    let mut ctx = WriteContext::new(Vec::new());
    ctx.write_bool(false).unwrap();
    ctx.write_string("app").unwrap();
    ctx.with_isolate(BuildPath::root(), |ctx| {
        ctx.write_value(&EnvironmentState::default())?;
        ctx.write_value(&Vec::<FeaturePreview>::new())?;
        ctx.write_bool(false)?;
        ctx.write_value(&BuildCacheConfiguration::default())?;
        ctx.write_size(0)?;
        ctx.write_size(1)?;
        ctx.write_bool(true)?;
        ctx.write_string("ghost")?;
        ctx.write_file(Path::new("/nowhere/ghost"))?;
        ctx.write_value(&Some(BuildPath::root()))?;
        ctx.write_bool(false)?;
        ctx.write_bool(false)
    })
    .unwrap();
    fs::create_dir_all(io.dir()).unwrap();
    fs::write(io.work_state_file().path(), ctx.into_inner()).unwrap();

    let err = load(&io, base, LoadOptions::default()).unwrap_err();
    assert!(err.invalidates_entry());
    match err {
        StateError::UnsupportedBuildReference { name, root_dir } => {
            assert_eq!(name, "ghost");
            assert_eq!(root_dir, PathBuf::from("/nowhere/ghost"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn source_dependencies_are_reported_on_store_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    let mut tree = diamond_tree(base);
    tree.build_mut(&base.join("lib"))
        .unwrap()
        .has_source_dependency_rules = true;

    let store_sink = cairn_diagnostics::DiagnosticSink::new();
    io.store(&tree, &store_sink).unwrap();
    assert_eq!(store_sink.warning_count(), 1);

    let loaded = load(&io, base, LoadOptions::default()).unwrap();
    let diagnostics = loaded.diagnostics.take_all();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, cairn_state::SOURCE_DEPENDENCIES);
    assert!(diagnostics[0].notes[0].contains(":lib"));
    assert!(loaded.tree.state.children[0].build.has_source_dependency_rules);
}
