//! Structured problem reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::code::{DiagnosticCode, Severity};

/// A documentation anchor explaining a problem and its workarounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationSection(pub String);

impl DocumentationSection {
    /// Section covering source dependencies, which are not captured yet.
    pub fn not_yet_implemented_source_dependencies() -> Self {
        Self("config_cache:not_yet_implemented:source_dependencies".to_string())
    }
}

impl fmt::Display for DocumentationSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A problem found while storing or loading a cache entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of problem.
    pub code: DiagnosticCode,
    /// The main message.
    pub message: String,
    /// Where to read more, if anywhere.
    pub documentation: Option<DocumentationSection>,
    /// Additional context (e.g. which build or debug frame reported it).
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            documentation: None,
            notes: Vec::new(),
        }
    }

    /// Attaches a documentation section.
    pub fn with_documentation(mut self, section: DocumentationSection) -> Self {
        self.documentation = Some(section);
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_warning_with_documentation() {
        let code = DiagnosticCode::new(Category::NotYetImplemented, 1);
        let diag = Diagnostic::warning(code, "source dependencies are not supported")
            .with_documentation(DocumentationSection::not_yet_implemented_source_dependencies())
            .with_note("reported by build ':'");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.notes.len(), 1);
        assert!(diag
            .documentation
            .unwrap()
            .to_string()
            .contains("source_dependencies"));
    }

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Error, 1), "corrupt");
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.documentation.is_none());
    }
}
