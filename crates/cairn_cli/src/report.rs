//! Plain-text rendering of a loaded build tree.

use std::fmt::Write;

use cairn_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};
use cairn_state::{FinalizedGraph, ProgressDetails, ProjectTree, RecordedEvent};

/// Renders each build's scheduled work, with the dependencies of every node.
pub fn render_graph(graph: &FinalizedGraph) -> String {
    let mut out = String::new();
    for build in graph.builds() {
        let _ = writeln!(out, "build {build}");
        for node in graph.scheduled_nodes(build).unwrap_or_default() {
            let _ = write!(out, "  {}", node.id);
            let dependencies = graph.dependencies_of(&node.id);
            if !dependencies.is_empty() {
                let names: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();
                let _ = write!(out, " <- {}", names.join(", "));
            }
            out.push('\n');
        }
    }
    out
}

/// Renders the replayed tooling events, indented by nesting depth.
pub fn render_events(events: &[RecordedEvent]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for event in events {
        match event {
            RecordedEvent::Started(descriptor) => {
                let _ = writeln!(
                    out,
                    "{:indent$}> {}",
                    "",
                    descriptor.operation.display_name(),
                    indent = depth * 2
                );
                depth += 1;
            }
            RecordedEvent::Finished { failed, .. } => {
                depth = depth.saturating_sub(1);
                if *failed {
                    let _ = writeln!(out, "{:indent$}! failed", "", indent = depth * 2);
                }
            }
            RecordedEvent::Progress { details, .. } => {
                let _ = writeln!(
                    out,
                    "{:indent$}* {}",
                    "",
                    describe_progress(details),
                    indent = depth * 2
                );
            }
        }
    }
    out
}

fn describe_progress(details: &ProgressDetails) -> String {
    match details {
        ProgressDetails::BuildIdentified { build } => format!("build {build} identified"),
        ProgressDetails::ProjectsIdentified {
            build,
            root_project,
        } => format!(
            "projects of {build} identified ({} projects)",
            project_count(root_project)
        ),
    }
}

fn project_count(tree: &ProjectTree) -> usize {
    1 + tree.children.iter().map(project_count).sum::<usize>()
}

/// Renders collected diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().map(|d| TerminalRenderer.render(d)).collect()
}
