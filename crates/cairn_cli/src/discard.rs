//! `cairn discard`: deletes the cache entry.

use crate::workspace::Workspace;
use crate::GlobalArgs;

/// Runs the `cairn discard` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace = Workspace::open(global)?;
    if !workspace.io.has_entry() {
        if !global.quiet {
            eprintln!("warning: no cache entry in {}", workspace.io.dir().display());
        }
        return Ok(0);
    }
    workspace.io.discard()?;
    if !global.quiet {
        eprintln!("   Discarded {}", workspace.io.dir().display());
    }
    Ok(0)
}
