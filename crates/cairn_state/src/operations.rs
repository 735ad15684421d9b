//! Build operation events observed by tooling.
//!
//! A [`BuildOperationRunner`] wraps work in start and finish notifications
//! and parents nested operations on the innermost running one. Progress
//! events are attached to the innermost running operation.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cairn_common::{BuildPath, ProjectPath};

/// Identifier of a started operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub u64);

/// Kinds of operations emitted while loading a build tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Loading a build's settings and structure.
    LoadBuild,
    /// Evaluating a build's settings.
    EvaluateSettings,
    /// Configuring a build.
    ConfigureBuild,
    /// Loading a build's projects.
    LoadProjects,
    /// Configuring one project.
    ConfigureProject,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::LoadBuild => "Load build",
            OperationKind::EvaluateSettings => "Evaluate settings",
            OperationKind::ConfigureBuild => "Configure build",
            OperationKind::LoadProjects => "Load projects",
            OperationKind::ConfigureProject => "Configure project",
        };
        f.write_str(name)
    }
}

/// An operation about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOperation {
    /// What the operation does.
    pub kind: OperationKind,
    /// Build the operation applies to.
    pub build: BuildPath,
    /// Project the operation applies to, if any.
    pub project: Option<ProjectPath>,
}

impl BuildOperation {
    /// Creates a build-level operation.
    pub fn for_build(kind: OperationKind, build: BuildPath) -> Self {
        Self {
            kind,
            build,
            project: None,
        }
    }

    /// Creates a project-level operation.
    pub fn for_project(kind: OperationKind, build: BuildPath, project: ProjectPath) -> Self {
        Self {
            kind,
            build,
            project: Some(project),
        }
    }

    /// Human readable name, e.g. `Configure project :lib:core`.
    pub fn display_name(&self) -> String {
        match &self.project {
            Some(project) if self.build.is_root() => format!("{} {project}", self.kind),
            Some(project) if project.is_root() => format!("{} {}", self.kind, self.build),
            Some(project) => format!("{} {}{project}", self.kind, self.build),
            None => format!("{} {}", self.kind, self.build),
        }
    }
}

/// A started operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOperationDescriptor {
    /// Unique id within the runner.
    pub id: OperationId,
    /// Enclosing operation, if any.
    pub parent: Option<OperationId>,
    /// The operation.
    pub operation: BuildOperation,
}

/// Project hierarchy announced when a build's projects are identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    /// Project name.
    pub name: String,
    /// Project path.
    pub path: ProjectPath,
    /// Project directory.
    pub project_dir: PathBuf,
    /// Child projects.
    pub children: Vec<ProjectTree>,
}

/// Progress notifications that carry no duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressDetails {
    /// A build became known to the tree.
    BuildIdentified {
        /// Build identity.
        build: BuildPath,
    },
    /// The projects of a build became known.
    ProjectsIdentified {
        /// Build identity.
        build: BuildPath,
        /// Root of the build's project hierarchy.
        root_project: ProjectTree,
    },
}

/// Receives operation notifications.
pub trait BuildOperationListener: Send + Sync {
    /// Called before an operation runs.
    fn started(&self, operation: &BuildOperationDescriptor);

    /// Called after an operation ran, whatever its outcome.
    fn finished(&self, operation: &BuildOperationDescriptor, failed: bool);

    /// Called for a progress notification.
    fn progress(&self, parent: Option<OperationId>, details: &ProgressDetails);
}

/// Runs operations and notifies a listener.
pub struct BuildOperationRunner {
    listener: Arc<dyn BuildOperationListener>,
    next_id: AtomicU64,
    running: Mutex<Vec<OperationId>>,
}

impl BuildOperationRunner {
    /// Creates a runner notifying `listener`.
    pub fn new(listener: Arc<dyn BuildOperationListener>) -> Self {
        Self {
            listener,
            next_id: AtomicU64::new(1),
            running: Mutex::new(Vec::new()),
        }
    }

    /// Runs `f` as the given operation.
    ///
    /// The finish notification fires on success, on error, and on unwind.
    pub fn run<T, E>(
        &self,
        operation: BuildOperation,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut running = self.start(operation);
        let result = f();
        running.failed = result.is_err();
        result
    }

    /// Runs an infallible `f` as the given operation.
    pub fn call<T>(&self, operation: BuildOperation, f: impl FnOnce() -> T) -> T {
        let mut running = self.start(operation);
        let value = f();
        running.failed = false;
        value
    }

    /// Emits a progress notification under the innermost running operation.
    pub fn progress(&self, details: ProgressDetails) {
        let parent = self.stack().last().copied();
        self.listener.progress(parent, &details);
    }

    fn start(&self, operation: BuildOperation) -> RunningOperation<'_> {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let parent = {
            let mut stack = self.stack();
            let parent = stack.last().copied();
            stack.push(id);
            parent
        };
        let descriptor = BuildOperationDescriptor {
            id,
            parent,
            operation,
        };
        tracing::trace!(id = id.0, name = %descriptor.operation.display_name(), "operation started");
        self.listener.started(&descriptor);
        RunningOperation {
            runner: self,
            descriptor,
            failed: true,
        }
    }

    fn stack(&self) -> std::sync::MutexGuard<'_, Vec<OperationId>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RunningOperation<'a> {
    runner: &'a BuildOperationRunner,
    descriptor: BuildOperationDescriptor,
    failed: bool,
}

impl Drop for RunningOperation<'_> {
    fn drop(&mut self) {
        {
            let mut stack = self.runner.stack();
            if let Some(position) = stack.iter().rposition(|&id| id == self.descriptor.id) {
                stack.truncate(position);
            }
        }
        self.runner.listener.finished(&self.descriptor, self.failed);
    }
}

/// One notification captured by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    /// An operation started.
    Started(BuildOperationDescriptor),
    /// An operation finished.
    Finished {
        /// The finished operation.
        id: OperationId,
        /// Whether it failed.
        failed: bool,
    },
    /// A progress notification.
    Progress {
        /// Enclosing operation.
        parent: Option<OperationId>,
        /// The notification.
        details: ProgressDetails,
    },
}

/// A listener that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    /// Returns the started operations, in start order.
    pub fn started(&self) -> Vec<BuildOperationDescriptor> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Started(descriptor) => Some(descriptor.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the progress notifications, in emission order.
    pub fn progress(&self) -> Vec<ProgressDetails> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Progress { details, .. } => Some(details.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clears the recorded events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BuildOperationListener for RecordingListener {
    fn started(&self, operation: &BuildOperationDescriptor) {
        self.lock().push(RecordedEvent::Started(operation.clone()));
    }

    fn finished(&self, operation: &BuildOperationDescriptor, failed: bool) {
        self.lock().push(RecordedEvent::Finished {
            id: operation.id,
            failed,
        });
    }

    fn progress(&self, parent: Option<OperationId>, details: &ProgressDetails) {
        self.lock().push(RecordedEvent::Progress {
            parent,
            details: details.clone(),
        });
    }
}
