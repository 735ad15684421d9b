//! Recursive store and load of per-build state.
//!
//! Each build is written as three framed sections: `Gradle` (invocation
//! parameters and included builds), `Work Graph` (relevant projects,
//! their non-trivial models, required build services, scheduled work) and
//! `cleanup registrations`. An included build is stored once per session,
//! the first time the walk reaches it, into its own nested state file.
//! Later references to it only carry its definition. Nested files are
//! staged in the session and only moved into place by the caller once the
//! whole tree has been written.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use cairn_cache::{write_staged, StagedFiles, StateFile};
use cairn_codec::{ReadContext, WriteContext};
use cairn_common::{BuildDefinition, BuildPath, ProjectPath};
use cairn_diagnostics::{
    Category, Diagnostic, DiagnosticCode, DiagnosticSink, DocumentationSection,
};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::model::{
    AllProjectsGuard, BuildServiceSpec, BuildTree, BuildUnit, CachedBuildState,
    CachedProjectState, IncludedBuild, ProjectId,
};
use crate::operations::{BuildOperation, BuildOperationRunner, OperationKind};
use crate::relevance::relevant_projects;
use crate::work::WorkNodeCodec;

/// Reported when a build declares source dependencies, which are not stored.
pub const SOURCE_DEPENDENCIES: DiagnosticCode = DiagnosticCode::new(Category::NotYetImplemented, 1);

/// Creates the unit of a build being loaded, from its settings file and name.
///
/// Units are returned without registered projects; projects are restored
/// from the stream.
pub type BuildFactory<'f> = dyn FnMut(Option<&Path>, &str) -> BuildUnit + 'f;

/// Included builds already stored during one write session.
///
/// Builds are identified by root directory, so a build included from
/// several places is stored exactly once.
#[derive(Debug, Default)]
pub struct StoredBuilds {
    root_dirs: HashSet<PathBuf>,
    order: Vec<PathBuf>,
}

impl StoredBuilds {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `definition` as stored. Returns `true` the first time its
    /// root directory is seen.
    pub fn store(&mut self, definition: &BuildDefinition) -> bool {
        let root_dir = definition.root_dir().to_path_buf();
        if self.root_dirs.insert(root_dir.clone()) {
            self.order.push(root_dir);
            true
        } else {
            false
        }
    }

    /// Returns `true` if a build with this root directory was stored.
    pub fn contains(&self, root_dir: &Path) -> bool {
        self.root_dirs.contains(root_dir)
    }

    /// Root directories of stored builds, in store order.
    pub fn stored(&self) -> &[PathBuf] {
        &self.order
    }

    /// Consumes the set, returning root directories in store order.
    pub fn into_stored(self) -> Vec<PathBuf> {
        self.order
    }
}

/// Mutable state of one write pass over a build tree.
#[derive(Debug, Default)]
pub(crate) struct WriteSession {
    pub stored_builds: StoredBuilds,
    pub required_services: HashMap<BuildPath, Vec<BuildServiceSpec>>,
    /// Nested state files written so far, not yet moved into place.
    pub nested_files: StagedFiles,
}

/// Builds materialized so far during one read pass.
#[derive(Debug, Default)]
pub(crate) struct ReadSession {
    loaded: HashSet<PathBuf>,
}

pub(crate) struct BuildStateWriter<'a, C> {
    pub tree: &'a BuildTree,
    pub state_file: &'a dyn StateFile,
    pub codec: &'a C,
    pub diagnostics: &'a DiagnosticSink,
}

impl<C: WorkNodeCodec> BuildStateWriter<'_, C> {
    /// Writes `build` and, recursively, the included builds it stores.
    ///
    /// Every project model of `build` stays locked for the whole call.
    pub fn write_build_state<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        build: &BuildUnit,
        session: &mut WriteSession,
    ) -> StateResult<()> {
        let projects = build.projects.lock_all();
        ctx.with_debug_frame("Gradle", |ctx| self.write_gradle_state(ctx, build, session))?;
        ctx.with_debug_frame("Work Graph", |ctx| {
            let relevant =
                relevant_projects(&build.identity(), &build.scheduled_work, &build.projects)?;
            write_project_registrations(ctx, build, &relevant)?;
            write_project_states(ctx, build, &projects, &relevant)?;
            write_required_build_services(ctx, build, session)?;
            self.codec.write_work(ctx, build, &build.scheduled_work)
        })?;
        ctx.with_debug_frame("cleanup registrations", |ctx| write_cleanup(ctx, build))?;
        debug!(build = %build.identity(), "stored build state");
        Ok(())
    }

    fn write_gradle_state<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        build: &BuildUnit,
        session: &mut WriteSession,
    ) -> StateResult<()> {
        ctx.with_isolate(build.identity(), |ctx| {
            ctx.write_strings(&build.start_parameter.task_names)?;
            ctx.with_debug_frame("included builds", |ctx| {
                ctx.write_collection(&build.included_builds, |ctx, included| {
                    self.write_included_build(ctx, included, session)
                })?;
                if build.has_source_dependency_rules {
                    report_source_dependencies(self.diagnostics, build);
                }
                ctx.write_bool(build.has_source_dependency_rules)?;
                Ok(())
            })
        })
    }

    fn write_included_build<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        included: &IncludedBuild,
        session: &mut WriteSession,
    ) -> StateResult<()> {
        let target = match included {
            IncludedBuild::Included(definition) => self.tree.build_for(definition)?,
            IncludedBuild::Root => self.tree.root(),
        };
        if target.is_root() {
            ctx.write_bool(false)?;
            return Ok(());
        }
        ctx.write_bool(true)?;
        write_build_definition(ctx, &target.definition)?;
        if !session.stored_builds.store(&target.definition) {
            ctx.write_bool(false)?;
            return Ok(());
        }
        ctx.write_bool(true)?;
        let nested = self
            .state_file
            .state_file_for_included_build(&target.definition);
        debug!(
            build = %target.identity(),
            file = %nested.path().display(),
            "storing included build"
        );
        let ((), staged) = write_staged(nested.as_ref(), |writer| -> StateResult<()> {
            let mut nested_ctx = WriteContext::new(writer);
            self.write_build_state(&mut nested_ctx, target, session)?;
            nested_ctx.flush()?;
            Ok(())
        })?;
        session.nested_files.push(nested, staged);
        Ok(())
    }
}

pub(crate) struct BuildStateReader<'a, C> {
    pub state_file: &'a dyn StateFile,
    pub codec: &'a C,
    pub diagnostics: &'a DiagnosticSink,
    pub operations: &'a BuildOperationRunner,
    pub synthesize_operations: bool,
}

impl<C: WorkNodeCodec> BuildStateReader<'_, C> {
    /// Reads the state of `build` and of every build stored beneath it.
    pub fn read_build_state<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        mut build: BuildUnit,
        session: &mut ReadSession,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<CachedBuildState> {
        let children = ctx.with_debug_frame("Gradle", |ctx| {
            if self.synthesize_operations {
                let identity = build.identity();
                self.operations.run(
                    BuildOperation::for_build(OperationKind::LoadBuild, identity.clone()),
                    || {
                        self.operations.call(
                            BuildOperation::for_build(OperationKind::EvaluateSettings, identity),
                            || {},
                        );
                        self.read_gradle_state(ctx, &mut build, session, create_build)
                    },
                )
            } else {
                self.read_gradle_state(ctx, &mut build, session, create_build)
            }
        })?;
        let work_graph = ctx.with_debug_frame("Work Graph", |ctx| {
            read_project_registrations(ctx, &mut build)?;
            read_project_states(ctx, &build)?;
            read_required_build_services(ctx, &mut build)?;
            self.codec.read_work(ctx, &build)
        })?;
        ctx.with_debug_frame("cleanup registrations", |ctx| read_cleanup(ctx, &mut build))?;
        debug!(
            build = %build.identity(),
            projects = build.projects.len(),
            nodes = work_graph.len(),
            "loaded build state"
        );
        Ok(CachedBuildState {
            build,
            work_graph,
            children,
        })
    }

    fn read_gradle_state<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        build: &mut BuildUnit,
        session: &mut ReadSession,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<Vec<CachedBuildState>> {
        ctx.with_isolate(build.identity(), |ctx| {
            build.start_parameter.task_names = ctx.read_strings()?;
            ctx.with_debug_frame("included builds", |ctx| {
                let mut children = Vec::new();
                build.included_builds = ctx.read_list(|ctx| {
                    let (included, child) = self.read_included_build(ctx, session, create_build)?;
                    children.extend(child);
                    Ok::<_, StateError>(included)
                })?;
                if ctx.read_bool()? {
                    report_source_dependencies(self.diagnostics, build);
                    build.has_source_dependency_rules = true;
                }
                Ok(children)
            })
        })
    }

    fn read_included_build<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        session: &mut ReadSession,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<(IncludedBuild, Option<CachedBuildState>)> {
        if !ctx.read_bool()? {
            return Ok((IncludedBuild::Root, None));
        }
        let definition = read_build_definition(ctx)?;
        let stored = ctx.read_bool()?;
        if definition.from_build.is_none() {
            return Err(unsupported_reference(&definition));
        }
        if !stored {
            return if session.loaded.contains(definition.root_dir()) {
                Ok((IncludedBuild::Included(definition), None))
            } else {
                Err(unsupported_reference(&definition))
            };
        }
        if !session.loaded.insert(definition.root_dir.clone()) {
            return Err(unsupported_reference(&definition));
        }

        let mut unit = create_build(None, &definition.name);
        unit.definition = definition.clone();
        let nested = self.state_file.state_file_for_included_build(&definition);
        debug!(
            build = %unit.identity(),
            file = %nested.path().display(),
            "loading included build"
        );
        let mut nested_ctx = ReadContext::new(nested.input_stream()?);
        let state = self.read_build_state(&mut nested_ctx, unit, session, create_build)?;
        Ok((IncludedBuild::Included(definition), Some(state)))
    }
}

fn unsupported_reference(definition: &BuildDefinition) -> StateError {
    StateError::UnsupportedBuildReference {
        name: definition.name.clone(),
        root_dir: definition.root_dir.clone(),
    }
}

/// Warns that `build` declares source dependencies, which are not stored.
pub(crate) fn report_source_dependencies(diagnostics: &DiagnosticSink, build: &BuildUnit) {
    let identity = build.identity();
    warn!(build = %identity, "source dependencies are not supported by the configuration cache");
    diagnostics.emit(
        Diagnostic::warning(
            SOURCE_DEPENDENCIES,
            "source dependencies are not supported by the configuration cache",
        )
        .with_documentation(DocumentationSection::not_yet_implemented_source_dependencies())
        .with_note(format!("declared by build '{identity}'")),
    );
}

fn write_build_definition<W: Write>(
    ctx: &mut WriteContext<W>,
    definition: &BuildDefinition,
) -> StateResult<()> {
    ctx.write_string(&definition.name)?;
    ctx.write_file(definition.root_dir())?;
    ctx.write_value(&definition.from_build)?;
    ctx.write_bool(definition.plugin_build)?;
    Ok(())
}

fn read_build_definition<R: Read>(ctx: &mut ReadContext<R>) -> StateResult<BuildDefinition> {
    let name = ctx.read_string()?;
    let root_dir = ctx.read_file()?;
    let from_build: Option<BuildPath> = ctx.read_value()?;
    let plugin_build = ctx.read_bool()?;
    Ok(BuildDefinition {
        name,
        root_dir,
        from_build,
        plugin_build,
    })
}

fn write_project_registrations<W: Write>(
    ctx: &mut WriteContext<W>,
    build: &BuildUnit,
    relevant: &[ProjectId],
) -> StateResult<()> {
    ctx.write_collection(relevant, |ctx, &id| -> StateResult<()> {
        let project = build.projects.get(id);
        ctx.write_string(project.path().as_str())?;
        ctx.write_file(project.project_dir())?;
        ctx.write_file(project.build_dir())?;
        Ok(())
    })
}

fn read_project_registrations<R: Read>(
    ctx: &mut ReadContext<R>,
    build: &mut BuildUnit,
) -> StateResult<()> {
    ctx.read_collection(|ctx| -> StateResult<()> {
        let path = ProjectPath::parse(&ctx.read_string()?)?;
        let project_dir = ctx.read_file()?;
        let build_dir = ctx.read_file()?;
        build.projects.register(path, project_dir, build_dir)?;
        Ok(())
    })
}

fn write_project_states<W: Write>(
    ctx: &mut WriteContext<W>,
    build: &BuildUnit,
    projects: &AllProjectsGuard<'_>,
    relevant: &[ProjectId],
) -> StateResult<()> {
    let states: Vec<CachedProjectState> = relevant
        .iter()
        .filter_map(|&id| projects.cached_state(id))
        .collect();
    ctx.with_isolate(build.identity(), |ctx| {
        ctx.write_collection(&states, |ctx, state| ctx.write_value(state))
    })?;
    Ok(())
}

fn read_project_states<R: Read>(ctx: &mut ReadContext<R>, build: &BuildUnit) -> StateResult<()> {
    let identity = build.identity();
    ctx.with_isolate(identity.clone(), |ctx| {
        ctx.read_collection(|ctx| -> StateResult<()> {
            let state: CachedProjectState = ctx.read_value()?;
            let id = build
                .projects
                .find(&state.path)
                .ok_or_else(|| StateError::UnknownProject {
                    build: identity.clone(),
                    path: state.path.clone(),
                })?;
            build.projects.get(id).model().apply_cached_state(state);
            Ok(())
        })
    })
}

fn write_required_build_services<W: Write>(
    ctx: &mut WriteContext<W>,
    build: &BuildUnit,
    session: &WriteSession,
) -> StateResult<()> {
    let identity = build.identity();
    let services = session
        .required_services
        .get(&identity)
        .map(Vec::as_slice)
        .unwrap_or_default();
    ctx.with_isolate(identity, |ctx| ctx.write_value(services))?;
    Ok(())
}

fn read_required_build_services<R: Read>(
    ctx: &mut ReadContext<R>,
    build: &mut BuildUnit,
) -> StateResult<()> {
    let services: Vec<BuildServiceSpec> =
        ctx.with_isolate(build.identity(), |ctx| ctx.read_value())?;
    for service in services {
        if build.build_service(&service.name).is_none() {
            build.build_services.push(service);
        }
    }
    Ok(())
}

fn write_cleanup<W: Write>(ctx: &mut WriteContext<W>, build: &BuildUnit) -> StateResult<()> {
    ctx.with_isolate(build.identity(), |ctx| {
        ctx.write_collection(&build.output_cleanup, |ctx, path| ctx.write_file(path))
    })?;
    Ok(())
}

fn read_cleanup<R: Read>(ctx: &mut ReadContext<R>, build: &mut BuildUnit) -> StateResult<()> {
    build.output_cleanup = ctx.with_isolate(build.identity(), |ctx| ctx.read_list(|ctx| ctx.read_file()))?;
    Ok(())
}
