//! Problem reporting for configuration cache stores and loads.
//!
//! Problems that do not invalidate the cache entry (features the cache
//! cannot capture yet, degraded behavior) are collected as [`Diagnostic`]s
//! in a thread-safe [`DiagnosticSink`] and rendered for the terminal by
//! [`TerminalRenderer`].

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod sink;

pub use code::{Category, DiagnosticCode, Severity};
pub use diagnostic::{Diagnostic, DocumentationSection};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use sink::DiagnosticSink;
