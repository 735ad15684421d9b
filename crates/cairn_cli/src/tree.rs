//! Turning a `cairn.toml` description into a build tree.

use std::error::Error;
use std::path::{Path, PathBuf};

use cairn_common::{BuildDefinition, BuildPath, ProjectPath};
use cairn_config::{parse_dependency, BuildDecl, CairnConfig, ProjectDecl};
use cairn_state::{
    BuildServiceSpec, BuildTree, BuildTreeState, BuildUnit, FeaturePreview, GenericListener,
    IncludedBuild, ListenerSubscription, NodeId, ProjectModel, WorkNode,
};

/// Returns the identity of the build declared as `name`.
fn identity_of(config: &CairnConfig, name: &str) -> BuildPath {
    match config.build_named(name) {
        Some(decl) if decl.root => BuildPath::root(),
        _ => BuildPath::root().child(name),
    }
}

/// Returns the definition of a declared build.
///
/// A non-root build is attributed to the first build that includes it, in
/// declaration order, or to the root if nothing includes it.
fn definition_for(config: &CairnConfig, decl: &BuildDecl, base: &Path) -> BuildDefinition {
    let root_dir = base.join(&decl.root_dir);
    if decl.root {
        return BuildDefinition::root(&decl.name, root_dir);
    }
    let from_build = config
        .builds
        .iter()
        .find(|b| b.includes.iter().any(|n| n == &decl.name))
        .map(|b| identity_of(config, &b.name))
        .unwrap_or_else(BuildPath::root);
    let definition = BuildDefinition::included(&decl.name, root_dir, from_build);
    if decl.plugin_build {
        definition.as_plugin_build()
    } else {
        definition
    }
}

fn project_dirs(project: &ProjectDecl, path: &ProjectPath, root_dir: &Path) -> (PathBuf, PathBuf) {
    let project_dir = match &project.dir {
        Some(dir) => root_dir.join(dir),
        None => path
            .as_str()
            .split(':')
            .filter(|s| !s.is_empty())
            .fold(root_dir.to_path_buf(), |dir, segment| dir.join(segment)),
    };
    let build_dir = match &project.build_dir {
        Some(dir) => root_dir.join(dir),
        None => project_dir.join("build"),
    };
    (project_dir, build_dir)
}

fn build_unit(config: &CairnConfig, decl: &BuildDecl, base: &Path) -> Result<BuildUnit, Box<dyn Error>> {
    let mut unit = BuildUnit::new(definition_for(config, decl, base));
    let identity = unit.identity();
    let root_dir = unit.root_dir().to_path_buf();

    unit.settings_file = decl.settings_file.as_ref().map(|f| root_dir.join(f));
    unit.start_parameter.task_names = decl.tasks.clone();
    unit.has_source_dependency_rules = decl.source_dependencies;
    unit.output_cleanup = decl.cleanup.iter().map(|c| root_dir.join(c)).collect();

    for name in &decl.includes {
        let included = config
            .build_named(name)
            .ok_or_else(|| format!("unknown build '{name}'"))?;
        unit.included_builds.push(if included.root {
            IncludedBuild::Root
        } else {
            IncludedBuild::Included(definition_for(config, included, base))
        });
    }

    let mut projects = decl
        .projects
        .iter()
        .map(|p| Ok((ProjectPath::parse(&p.path)?, p)))
        .collect::<Result<Vec<_>, cairn_common::ParsePathError>>()?;
    projects.sort_by_key(|(path, _)| path.depth());
    if projects.first().map_or(true, |(path, _)| !path.is_root()) {
        unit.projects
            .register(ProjectPath::root(), &root_dir, root_dir.join("build"))?;
    }
    for (path, project) in projects {
        let (project_dir, build_dir) = project_dirs(project, &path, &root_dir);
        unit.projects.register_with_model(
            path,
            project_dir,
            build_dir,
            ProjectModel {
                group: project.group.clone(),
                version: project.version.clone(),
                description: project.description.clone(),
                properties: project.properties.clone(),
            },
        )?;
    }

    for work in &decl.work {
        let owner = work.project.as_deref().map(ProjectPath::parse).transpose()?;
        let mut node = WorkNode::new(NodeId::new(identity.clone(), &work.id), owner, &work.action);
        for entry in &work.depends_on {
            let dependency = parse_dependency(entry)?;
            let build = match &dependency.build {
                Some(name) => identity_of(config, name),
                None => identity.clone(),
            };
            node = node.depends_on(NodeId::new(build, dependency.path));
        }
        unit.scheduled_work.push(node);
    }

    unit.build_services = decl
        .services
        .iter()
        .map(|s| BuildServiceSpec {
            parameters: s.parameters.clone(),
            ..BuildServiceSpec::new(identity.clone(), &s.name)
        })
        .collect();
    Ok(unit)
}

/// Returns the tree-wide state declared by the configuration.
pub fn tree_state(config: &CairnConfig) -> Result<BuildTreeState, Box<dyn Error>> {
    let mut state = BuildTreeState::default();
    for (name, value) in &config.environment {
        state.environment.set(name, value);
    }
    for feature in &config.features {
        state.feature_flags.enable(feature.parse::<FeaturePreview>()?);
    }
    for listener in &config.listeners {
        let subscription = match (&listener.build, &listener.service, &listener.type_name) {
            (Some(build), Some(service), _) => ListenerSubscription::ServiceBacked {
                build: identity_of(config, build),
                name: service.clone(),
            },
            (_, _, Some(type_name)) => ListenerSubscription::Generic(GenericListener {
                type_name: type_name.clone(),
                config: listener.config.clone(),
            }),
            _ => return Err("listener needs either a service or a type".into()),
        };
        state.listener_subscriptions.push(subscription);
    }
    Ok(state)
}

/// Builds the tree described by `config`, resolving paths against `base`.
pub fn build_tree(config: &CairnConfig, base: &Path) -> Result<BuildTree, Box<dyn Error>> {
    let root_decl = config.root_build().ok_or("no root build declared")?;
    let mut tree = BuildTree::new(build_unit(config, root_decl, base)?);
    for decl in config.builds.iter().filter(|b| !b.root) {
        tree.add_build(build_unit(config, decl, base)?)?;
    }
    tree.state = tree_state(config)?;
    Ok(tree)
}

/// Returns a factory creating bare build units while loading.
///
/// The first unit requested is the root; the rest are included builds,
/// whose definitions are replaced by the ones read from the cache.
pub fn build_factory<'c>(
    config: &'c CairnConfig,
    base: &'c Path,
) -> impl FnMut(Option<&Path>, &str) -> BuildUnit + 'c {
    let mut root_created = false;
    move |settings_file, name| {
        let root_dir = config
            .build_named(name)
            .map(|decl| base.join(&decl.root_dir))
            .unwrap_or_else(|| base.join(name));
        let mut unit = if root_created {
            BuildUnit::new(BuildDefinition::included(name, root_dir, BuildPath::root()))
        } else {
            root_created = true;
            BuildUnit::root(name, root_dir)
        };
        unit.settings_file = settings_file.map(Path::to_path_buf);
        unit
    }
}
