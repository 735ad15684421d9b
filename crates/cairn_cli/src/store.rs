//! `cairn store`: writes the configured build tree into the cache.
//!
//! When `[cache] load_after_store` is set, the entry is read straight back
//! in the same invocation, as a later build would, without replaying
//! tooling events.

use cairn_diagnostics::DiagnosticSink;
use cairn_state::LoadOptions;

use crate::load::load_entry;
use crate::report::{render_diagnostics, render_graph};
use crate::tree::build_tree;
use crate::workspace::Workspace;
use crate::GlobalArgs;

/// Runs the `cairn store` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace = Workspace::open(global)?;
    let tree = build_tree(&workspace.config, &workspace.dir)?;
    let diagnostics = DiagnosticSink::new();

    let details = workspace.io.store(&tree, &diagnostics)?;
    if !global.quiet {
        eprintln!(
            "      Stored {} ({} included builds) in {}",
            details.root_build,
            details.stored_included_builds.len(),
            workspace.io.dir().display()
        );
    }

    if workspace.config.cache.load_after_store {
        let options = LoadOptions {
            load_after_store_mode: true,
            loaded_after_store: true,
        };
        let loaded = load_entry(&workspace, options, &diagnostics)?;
        if !global.quiet {
            print!("{}", render_graph(&loaded.tree.graph));
        }
    }

    eprint!("{}", render_diagnostics(&diagnostics.take_all()));
    Ok(0)
}
