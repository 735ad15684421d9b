//! Assembles the per-build work lists of a loaded tree into one graph.

use std::collections::{HashMap, HashSet};

use cairn_common::BuildPath;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::work::{NodeId, WorkNode};

/// Errors raised while assembling the work graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Work was scheduled twice on the same graph.
    #[error("work has already been scheduled")]
    AlreadyScheduled,
    /// A build registered its work list twice.
    #[error("work graph of build '{0}' registered twice")]
    DuplicateBuild(BuildPath),
    /// Two builds scheduled the same node.
    #[error("node '{0}' scheduled twice")]
    DuplicateNode(NodeId),
    /// A node depends on a node no build scheduled.
    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency {
        /// The dependent node.
        node: NodeId,
        /// The missing dependency.
        dependency: NodeId,
    },
}

/// Entry point for scheduling the work of a build tree.
#[derive(Debug, Default)]
pub struct BuildTreeWorkGraph {
    scheduled: bool,
}

impl BuildTreeWorkGraph {
    /// Creates a graph with nothing scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects work lists through `schedule`, then finalizes the graph.
    ///
    /// A graph can be scheduled once.
    pub fn schedule_work<F>(&mut self, schedule: F) -> Result<FinalizedGraph, GraphError>
    where
        F: FnOnce(&mut WorkGraphBuilder) -> Result<(), GraphError>,
    {
        if self.scheduled {
            return Err(GraphError::AlreadyScheduled);
        }
        self.scheduled = true;
        let mut builder = WorkGraphBuilder::default();
        schedule(&mut builder)?;
        builder.finalize()
    }
}

/// Collects the ordered work list of each build.
#[derive(Debug, Default)]
pub struct WorkGraphBuilder {
    builds: Vec<(BuildPath, Vec<WorkNode>)>,
    registered: HashSet<BuildPath>,
}

impl WorkGraphBuilder {
    /// Registers the work list of one build.
    pub fn with_work_graph(
        &mut self,
        build: BuildPath,
        nodes: Vec<WorkNode>,
    ) -> Result<(), GraphError> {
        if !self.registered.insert(build.clone()) {
            return Err(GraphError::DuplicateBuild(build));
        }
        self.builds.push((build, nodes));
        Ok(())
    }

    fn finalize(self) -> Result<FinalizedGraph, GraphError> {
        let mut graph = DiGraph::new();
        let mut indexes = HashMap::new();
        for node in self.builds.iter().flat_map(|(_, nodes)| nodes) {
            let index = graph.add_node(node.id.clone());
            if indexes.insert(node.id.clone(), index).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        for node in self.builds.iter().flat_map(|(_, nodes)| nodes) {
            let to = indexes[&node.id];
            for dependency in &node.dependencies {
                let from = *indexes
                    .get(dependency)
                    .ok_or_else(|| GraphError::UnknownDependency {
                        node: node.id.clone(),
                        dependency: dependency.clone(),
                    })?;
                graph.add_edge(from, to, ());
            }
        }
        tracing::debug!(
            builds = self.builds.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "work graph finalized"
        );
        Ok(FinalizedGraph {
            graph,
            indexes,
            builds: self.builds,
        })
    }
}

/// The assembled work graph of a build tree.
///
/// Edges run from a dependency to its dependent. Each build's node list is
/// kept exactly in the order it was registered.
#[derive(Debug)]
pub struct FinalizedGraph {
    graph: DiGraph<NodeId, ()>,
    indexes: HashMap<NodeId, NodeIndex>,
    builds: Vec<(BuildPath, Vec<WorkNode>)>,
}

impl FinalizedGraph {
    /// Build identities in registration order.
    pub fn builds(&self) -> impl Iterator<Item = &BuildPath> {
        self.builds.iter().map(|(build, _)| build)
    }

    /// The nodes scheduled by `build`, in stored order.
    pub fn scheduled_nodes(&self, build: &BuildPath) -> Option<&[WorkNode]> {
        self.builds
            .iter()
            .find(|(b, _)| b == build)
            .map(|(_, nodes)| nodes.as_slice())
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the node was scheduled by some build.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.indexes.contains_key(node)
    }

    /// Nodes that `node` depends on.
    pub fn dependencies_of(&self, node: &NodeId) -> Vec<&NodeId> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Nodes that depend on `node`.
    pub fn dependents_of(&self, node: &NodeId) -> Vec<&NodeId> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Returns `true` if no dependency cycle exists.
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph)
    }

    fn neighbors(&self, node: &NodeId, direction: Direction) -> Vec<&NodeId> {
        let Some(&index) = self.indexes.get(node) else {
            return Vec::new();
        };
        let mut found: Vec<&NodeId> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|i| &self.graph[i])
            .collect();
        found.sort();
        found
    }
}
