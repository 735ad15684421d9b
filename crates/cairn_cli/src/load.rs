//! `cairn load`: reads the build tree back from the cache.
//!
//! Prints the assembled work graph per build, the replayed tooling events,
//! and any diagnostics. An entry that cannot be trusted is discarded.

use std::sync::Arc;

use cairn_diagnostics::DiagnosticSink;
use cairn_state::{
    BuildOperationRunner, BuildTreeState, BuildTreeWorkGraph, LoadOptions, LoadServices,
    LoadedBuildTree, RecordedEvent, RecordingListener, StateError, StateResult,
};
use tracing::warn;

use crate::report::{render_diagnostics, render_events, render_graph};
use crate::tree::build_factory;
use crate::workspace::Workspace;
use crate::{GlobalArgs, LoadArgs};

/// Everything a load produced.
pub struct LoadOutcome {
    /// The restored tree and its work graph.
    pub tree: LoadedBuildTree,
    /// Tree-wide state of this invocation after the load.
    pub tree_state: BuildTreeState,
    /// Tooling events replayed during the load.
    pub events: Vec<RecordedEvent>,
}

/// Loads the workspace's entry with fresh invocation services.
///
/// Entries failing with an error that invalidates them are deleted.
pub fn load_entry(
    workspace: &Workspace,
    options: LoadOptions,
    diagnostics: &DiagnosticSink,
) -> StateResult<LoadOutcome> {
    let events = Arc::new(RecordingListener::new());
    let operations = BuildOperationRunner::new(events.clone());
    let mut tree_state = BuildTreeState::default();
    let mut work_graph = BuildTreeWorkGraph::new();
    let mut create_build = build_factory(&workspace.config, &workspace.dir);

    let result = workspace.io.load(
        LoadServices {
            tree_state: &mut tree_state,
            operations: &operations,
            work_graph: &mut work_graph,
        },
        options,
        diagnostics,
        &mut create_build,
    );
    match result {
        Ok(tree) => Ok(LoadOutcome {
            tree,
            tree_state,
            events: events.events(),
        }),
        Err(err) => {
            if err.invalidates_entry() {
                warn!(error = %err, "discarding unusable configuration cache entry");
                if let Err(discard) = workspace.io.discard() {
                    warn!(error = %discard, "failed to discard configuration cache entry");
                }
            }
            Err(err)
        }
    }
}

/// Runs the `cairn load` command.
pub fn run(args: &LoadArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace = Workspace::open(global)?;
    if !workspace.io.has_entry() {
        return Err(format!("no cache entry in {}", workspace.io.dir().display()).into());
    }
    let options = LoadOptions {
        load_after_store_mode: args.identify || workspace.config.cache.load_after_store,
        loaded_after_store: false,
    };
    let diagnostics = DiagnosticSink::new();
    let outcome = load_entry(&workspace, options, &diagnostics).map_err(describe)?;

    if !global.quiet {
        eprintln!(
            "      Loaded {} builds, {} nodes ({:?} replay)",
            outcome.tree.state.build_count(),
            outcome.tree.graph.node_count(),
            options.replay_mode()
        );
        print!("{}", render_graph(&outcome.tree.graph));
        if global.verbose {
            eprintln!(
                "      {} environment changes, {} listeners restored",
                outcome.tree_state.environment.changes.len(),
                outcome.tree_state.listener_subscriptions.len()
            );
        }
        print!("{}", render_events(&outcome.events));
    }
    eprint!("{}", render_diagnostics(&diagnostics.take_all()));
    Ok(0)
}

fn describe(err: StateError) -> Box<dyn std::error::Error> {
    if err.invalidates_entry() {
        format!("{err} (the cache entry was discarded)").into()
    } else {
        Box::new(err)
    }
}
