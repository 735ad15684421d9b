//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// ```text
/// warning[N001]: source dependencies are not supported by the configuration cache
///    = note: reported by build ':'
///    = see: config_cache:not_yet_implemented:source_dependencies
/// ```
pub struct TerminalRenderer;

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}[{}]: {}\n", diag.severity, diag.code, diag.message);
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        if let Some(section) = &diag.documentation {
            out.push_str(&format!("   = see: {section}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use crate::diagnostic::DocumentationSection;

    #[test]
    fn render_warning_with_notes_and_docs() {
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::NotYetImplemented, 1),
            "source dependencies are not supported",
        )
        .with_note("reported by build ':'")
        .with_documentation(DocumentationSection::not_yet_implemented_source_dependencies());

        let output = TerminalRenderer.render(&diag);

        assert!(output.starts_with("warning[N001]: source dependencies are not supported\n"));
        assert!(output.contains("= note: reported by build ':'"));
        assert!(output.contains("= see: config_cache:not_yet_implemented:source_dependencies"));
    }

    #[test]
    fn render_bare_error() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Error, 1), "corrupt");
        assert_eq!(TerminalRenderer.render(&diag), "error[E001]: corrupt\n");
    }
}
