//! Debug frame and isolate bookkeeping shared by both codec directions.

use cairn_common::BuildPath;

/// Trail shown when no debug frame is open.
const TOP_LEVEL: &str = "(top level)";

/// Stack of named debug frames.
///
/// Frames have no effect on the encoded bytes; they only label errors.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<String>,
}

impl FrameStack {
    /// Opens a frame.
    pub fn push(&mut self, name: &str) {
        tracing::trace!(frame = name, depth = self.frames.len(), "enter frame");
        self.frames.push(name.to_string());
    }

    /// Closes the innermost frame.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Returns the number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Renders the open frames as `outer > inner`.
    pub fn trace(&self) -> String {
        if self.frames.is_empty() {
            TOP_LEVEL.to_string()
        } else {
            self.frames.join(" > ")
        }
    }
}

/// Stack of open isolates, each owned by one build.
#[derive(Debug, Default)]
pub struct IsolateStack {
    owners: Vec<BuildPath>,
}

impl IsolateStack {
    /// Opens an isolate for the given build.
    pub fn push(&mut self, owner: BuildPath) {
        self.owners.push(owner);
    }

    /// Closes the innermost isolate.
    pub fn pop(&mut self) {
        self.owners.pop();
    }

    /// Returns the owner of the innermost isolate, if any.
    pub fn current(&self) -> Option<&BuildPath> {
        self.owners.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trace_is_top_level() {
        assert_eq!(FrameStack::default().trace(), "(top level)");
    }

    #[test]
    fn nested_trace() {
        let mut frames = FrameStack::default();
        frames.push("Gradle");
        frames.push("included builds");
        assert_eq!(frames.trace(), "Gradle > included builds");
        frames.pop();
        assert_eq!(frames.trace(), "Gradle");
        assert_eq!(frames.depth(), 1);
    }

    #[test]
    fn isolates_nest() {
        let mut isolates = IsolateStack::default();
        assert!(isolates.current().is_none());
        isolates.push(BuildPath::root());
        isolates.push(BuildPath::parse(":lib").unwrap());
        assert_eq!(isolates.current().unwrap().as_str(), ":lib");
        isolates.pop();
        assert!(isolates.current().unwrap().is_root());
    }
}
