//! Root build state: the entry point for storing and loading a build tree.
//!
//! Stream layout, in order:
//!
//! 1. frame `Gradle`: settings file, root project name, build tree state
//!    (`environment state`, `plugin adapter`, `build cache`);
//! 2. the root build's state, recursing into stored included builds;
//! 3. frame `listener subscriptions`;
//! 4. the [`STATE_FILE_MARKER`] trailer.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;

use cairn_cache::{CacheError, StagedFiles, StateFile};
use cairn_codec::{CodecResult, ReadContext, WriteContext};
use cairn_common::BuildPath;
use cairn_diagnostics::DiagnosticSink;
use tracing::info;

use crate::error::{StateError, StateResult};
use crate::graph::{BuildTreeWorkGraph, FinalizedGraph, GraphError, WorkGraphBuilder};
use crate::model::{
    BuildCacheConfiguration, BuildServiceSpec, BuildTree, BuildTreeState, BuildUnit,
    CachedBuildState, EnvironmentState, FeaturePreview, GenericListener, ListenerSubscription,
    PluginAdapter,
};
use crate::operations::BuildOperationRunner;
use crate::replay::{replay, LoadOptions};
use crate::walker::{
    BuildFactory, BuildStateReader, BuildStateWriter, ReadSession, StoredBuilds, WriteSession,
};
use crate::work::WorkNodeCodec;

/// Trailer written after everything else. A reader that does not find it
/// right where it expects it has drifted out of step with the writer.
pub const STATE_FILE_MARKER: i32 = 0x1ecac8e;

/// Services of the loading invocation that a load updates.
pub struct LoadServices<'s> {
    /// Tree-wide state of the invocation, updated once the entry is verified.
    pub tree_state: &'s mut BuildTreeState,
    /// Receives the synthetic tooling events.
    pub operations: &'s BuildOperationRunner,
    /// Receives the restored work.
    pub work_graph: &'s mut BuildTreeWorkGraph,
}

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadedBuildTree {
    /// The restored root build and every build stored beneath it.
    pub state: CachedBuildState,
    /// The assembled work graph.
    pub graph: FinalizedGraph,
}

/// Result of writing a build tree.
///
/// The nested state files of included builds are staged, not yet in place.
/// They must be committed before the root stream is moved into place, and
/// are removed if the value is dropped.
#[derive(Debug)]
#[must_use = "nested state files are only moved into place by `commit_nested`"]
pub struct StoredTree {
    /// Root directories of the included builds that received their own
    /// nested state file, in store order.
    pub included_builds: Vec<PathBuf>,
    /// Staged nested state files.
    pub nested_files: StagedFiles,
}

impl StoredTree {
    /// Moves every nested state file into place.
    pub fn commit_nested(self) -> Result<Vec<PathBuf>, CacheError> {
        self.nested_files.commit()?;
        Ok(self.included_builds)
    }
}

/// Stores and loads the state of a whole build tree through one stream.
pub struct ConfigurationCacheState<'a, C> {
    codec: &'a C,
    state_file: &'a dyn StateFile,
    diagnostics: &'a DiagnosticSink,
}

impl<'a, C: WorkNodeCodec> ConfigurationCacheState<'a, C> {
    /// Creates a controller whose included builds nest under `state_file`.
    pub fn new(codec: &'a C, state_file: &'a dyn StateFile, diagnostics: &'a DiagnosticSink) -> Self {
        Self {
            codec,
            state_file,
            diagnostics,
        }
    }

    /// Writes the whole tree, root first.
    ///
    /// Included builds are written into staged nested files, returned in
    /// the [`StoredTree`] so that nothing reaches its final location unless
    /// the whole tree was written.
    pub fn write_root_build_state<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        tree: &BuildTree,
    ) -> StateResult<StoredTree> {
        let root = tree.root();
        if !root.is_root() {
            return Err(StateError::NotRootBuild {
                build: root.identity(),
            });
        }
        ctx.with_debug_frame("Gradle", |ctx| -> StateResult<()> {
            ctx.write_optional_file(root.settings_file.as_deref())?;
            ctx.write_string(&root.root_project_name)?;
            write_build_tree_state(ctx, root, &tree.state)
        })?;

        let listeners = relevant_listeners(tree);
        let mut session = WriteSession {
            stored_builds: StoredBuilds::new(),
            required_services: required_services_per_build(tree, &listeners)?,
            nested_files: StagedFiles::new(),
        };
        let writer = BuildStateWriter {
            tree,
            state_file: self.state_file,
            codec: self.codec,
            diagnostics: self.diagnostics,
        };
        writer.write_build_state(ctx, root, &mut session)?;
        write_listener_subscriptions(ctx, root, &listeners)?;
        ctx.write_int(STATE_FILE_MARKER)?;

        let included_builds = session.stored_builds.into_stored();
        info!(
            included_builds = included_builds.len(),
            bytes = ctx.position(),
            "stored build tree state"
        );
        Ok(StoredTree {
            included_builds,
            nested_files: session.nested_files,
        })
    }

    /// Reads the whole tree back, mirroring
    /// [`write_root_build_state`](Self::write_root_build_state).
    ///
    /// `create_build` builds the unit of each build being restored. The
    /// invocation's tree state is only updated after the trailer marker has
    /// been verified; on any error nothing is returned.
    pub fn read_root_build_state<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        services: LoadServices<'_>,
        options: LoadOptions,
        create_build: &mut BuildFactory<'_>,
    ) -> StateResult<LoadedBuildTree> {
        let (root, mut loaded) = ctx.with_debug_frame("Gradle", |ctx| -> StateResult<_> {
            let settings_file = ctx.read_optional_file()?;
            let root_project_name = ctx.read_string()?;
            let mut root = create_build(settings_file.as_deref(), &root_project_name);
            if !root.is_root() {
                return Err(StateError::NotRootBuild {
                    build: root.identity(),
                });
            }
            root.settings_file = settings_file;
            root.root_project_name = root_project_name;
            let loaded = read_build_tree_state(ctx, &root)?;
            Ok((root, loaded))
        })?;

        let reader = BuildStateReader {
            state_file: self.state_file,
            codec: self.codec,
            diagnostics: self.diagnostics,
            operations: services.operations,
            synthesize_operations: options.synthesizes_load_operations(),
        };
        let state = reader.read_build_state(ctx, root, &mut ReadSession::default(), create_build)?;
        let subscriptions = read_listener_subscriptions(ctx, &state.build)?;

        let found = ctx.read_int()?;
        if found != STATE_FILE_MARKER {
            return Err(StateError::CorruptCache {
                expected: STATE_FILE_MARKER,
                found,
            });
        }

        resolve_listener_subscriptions(&state, &subscriptions)?;
        loaded.listener_subscriptions = subscriptions;
        loaded.apply_to(services.tree_state);

        replay(&state, options.replay_mode(), services.operations);
        let graph = services
            .work_graph
            .schedule_work(|builder| add_work_graph(builder, &state))?;
        info!(
            builds = state.build_count(),
            nodes = graph.node_count(),
            "loaded build tree state"
        );
        Ok(LoadedBuildTree { state, graph })
    }
}

/// Registers each build's work list, root first, then children depth first.
fn add_work_graph(builder: &mut WorkGraphBuilder, state: &CachedBuildState) -> Result<(), GraphError> {
    builder.with_work_graph(state.build.identity(), state.work_graph.clone())?;
    for child in &state.children {
        add_work_graph(builder, child)?;
    }
    Ok(())
}

/// Tree state read from the stream, held back until the entry is verified.
struct LoadedTreeState {
    environment: EnvironmentState,
    feature_flags: Vec<FeaturePreview>,
    plugin_adapter: Option<PluginAdapter>,
    build_cache: BuildCacheConfiguration,
    listener_subscriptions: Vec<ListenerSubscription>,
}

impl LoadedTreeState {
    fn apply_to(self, state: &mut BuildTreeState) {
        state.environment.load_from(self.environment);
        for feature in self.feature_flags {
            state.feature_flags.enable(feature);
        }
        // an adapter already registered was set up by this invocation's own store
        if state.plugin_manager.adapter().is_none() {
            if let Some(mut adapter) = self.plugin_adapter {
                adapter.on_load_from_cache();
                state.plugin_manager.register_adapter(adapter);
            }
        }
        state.build_cache = self.build_cache;
        state
            .listener_subscriptions
            .extend(self.listener_subscriptions);
    }
}

fn write_build_tree_state<W: Write>(
    ctx: &mut WriteContext<W>,
    root: &BuildUnit,
    state: &BuildTreeState,
) -> StateResult<()> {
    ctx.with_isolate(root.identity(), |ctx| -> CodecResult<()> {
        ctx.with_debug_frame("environment state", |ctx| {
            ctx.write_value(&state.environment)?;
            let features: Vec<FeaturePreview> = state.feature_flags.enabled().collect();
            ctx.write_value(&features)
        })?;
        ctx.with_debug_frame("plugin adapter", |ctx| {
            match state.plugin_manager.adapter_to_store() {
                Some(adapter) => {
                    ctx.write_bool(true)?;
                    ctx.write_value(adapter)
                }
                None => ctx.write_bool(false),
            }
        })?;
        ctx.with_debug_frame("build cache", |ctx| ctx.write_value(&state.build_cache))
    })?;
    Ok(())
}

fn read_build_tree_state<R: Read>(
    ctx: &mut ReadContext<R>,
    root: &BuildUnit,
) -> StateResult<LoadedTreeState> {
    let loaded = ctx.with_isolate(root.identity(), |ctx| -> CodecResult<_> {
        let (environment, feature_flags) = ctx.with_debug_frame("environment state", |ctx| {
            let environment: EnvironmentState = ctx.read_value()?;
            let features: Vec<FeaturePreview> = ctx.read_value()?;
            Ok::<_, cairn_codec::CodecError>((environment, features))
        })?;
        let plugin_adapter = ctx.with_debug_frame("plugin adapter", |ctx| {
            if ctx.read_bool()? {
                ctx.read_value().map(Some)
            } else {
                Ok(None)
            }
        })?;
        let build_cache = ctx.with_debug_frame("build cache", |ctx| ctx.read_value())?;
        Ok(LoadedTreeState {
            environment,
            feature_flags,
            plugin_adapter,
            build_cache,
            listener_subscriptions: Vec::new(),
        })
    })?;
    Ok(loaded)
}

/// Listeners worth storing: everything except listeners backed by services
/// of the implicit plugin build, which is rebuilt on every invocation.
fn relevant_listeners(tree: &BuildTree) -> Vec<&ListenerSubscription> {
    tree.state
        .listener_subscriptions
        .iter()
        .filter(|listener| match listener {
            ListenerSubscription::ServiceBacked { build, .. } => tree
                .build_by_identity(build)
                .map_or(true, |b| !b.is_build_src()),
            ListenerSubscription::Generic(_) => true,
        })
        .collect()
}

fn required_services_per_build(
    tree: &BuildTree,
    listeners: &[&ListenerSubscription],
) -> StateResult<HashMap<BuildPath, Vec<BuildServiceSpec>>> {
    let mut required: HashMap<BuildPath, Vec<BuildServiceSpec>> = HashMap::new();
    for listener in listeners {
        let ListenerSubscription::ServiceBacked { build, name } = listener else {
            continue;
        };
        let service = tree
            .build_by_identity(build)
            .and_then(|b| b.build_service(name))
            .ok_or_else(|| StateError::UnknownBuildService {
                build: build.clone(),
                name: name.clone(),
            })?;
        let services = required.entry(build.clone()).or_default();
        if !services.iter().any(|s| &s.name == name) {
            services.push(service.clone());
        }
    }
    Ok(required)
}

fn write_listener_subscriptions<W: Write>(
    ctx: &mut WriteContext<W>,
    root: &BuildUnit,
    listeners: &[&ListenerSubscription],
) -> StateResult<()> {
    ctx.with_debug_frame("listener subscriptions", |ctx| {
        ctx.with_isolate(root.identity(), |ctx| {
            ctx.write_collection(listeners.iter().copied(), |ctx, listener| match listener {
                ListenerSubscription::ServiceBacked { build, name } => {
                    ctx.write_bool(true)?;
                    ctx.write_value(build)?;
                    ctx.write_string(name)
                }
                ListenerSubscription::Generic(generic) => {
                    ctx.write_bool(false)?;
                    ctx.write_value(generic)
                }
            })
        })
    })?;
    Ok(())
}

fn read_listener_subscriptions<R: Read>(
    ctx: &mut ReadContext<R>,
    root: &BuildUnit,
) -> StateResult<Vec<ListenerSubscription>> {
    let subscriptions = ctx.with_debug_frame("listener subscriptions", |ctx| {
        ctx.with_isolate(root.identity(), |ctx| {
            ctx.read_list(|ctx| -> CodecResult<ListenerSubscription> {
                if ctx.read_bool()? {
                    let build: BuildPath = ctx.read_value()?;
                    let name = ctx.read_string()?;
                    Ok(ListenerSubscription::ServiceBacked { build, name })
                } else {
                    let generic: GenericListener = ctx.read_value()?;
                    Ok(ListenerSubscription::Generic(generic))
                }
            })
        })
    })?;
    Ok(subscriptions)
}

fn resolve_listener_subscriptions(
    state: &CachedBuildState,
    subscriptions: &[ListenerSubscription],
) -> StateResult<()> {
    for subscription in subscriptions {
        let ListenerSubscription::ServiceBacked { build, name } = subscription else {
            continue;
        };
        let registered = state
            .find(build)
            .and_then(|restored| restored.build.build_service(name))
            .is_some();
        if !registered {
            return Err(StateError::UnknownBuildService {
                build: build.clone(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}
