//! Scheduled work items and the codec that stores them.
//!
//! The state machinery never interprets a node's action; it only needs to
//! know which project owns a node (to decide which projects are relevant)
//! and which nodes it depends on (to assemble the work graph on load).

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};

use cairn_codec::{ReadContext, WriteContext};
use cairn_common::{BuildPath, ProjectPath};
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};
use crate::model::BuildUnit;

/// Identity of a work node: its build and its path within that build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Build that schedules the node.
    pub build: BuildPath,
    /// Node path within the build (e.g. `:app:compile`).
    pub path: String,
}

impl NodeId {
    /// Creates a node identity.
    pub fn new(build: BuildPath, path: impl Into<String>) -> Self {
        Self {
            build,
            path: path.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.build.is_root() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}{}", self.build, self.path)
        }
    }
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkNode {
    /// Node identity.
    pub id: NodeId,
    /// Project owning the node, `None` for build-level work.
    pub owner: Option<ProjectPath>,
    /// Opaque action payload.
    pub action: String,
    /// Nodes that must run first, possibly in other builds.
    pub dependencies: Vec<NodeId>,
}

impl WorkNode {
    /// Creates a node without dependencies.
    pub fn new(id: NodeId, owner: Option<ProjectPath>, action: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            action: action.into(),
            dependencies: Vec::new(),
        }
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, dependency: NodeId) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Stores and restores the scheduled work of one build.
///
/// Implementations must read exactly what they wrote; the surrounding
/// stream continues right after.
pub trait WorkNodeCodec {
    /// Writes the nodes scheduled by `build`.
    fn write_work<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        build: &BuildUnit,
        nodes: &[WorkNode],
    ) -> StateResult<()>;

    /// Reads the nodes scheduled by `build`.
    fn read_work<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        build: &BuildUnit,
    ) -> StateResult<Vec<WorkNode>>;
}

/// Default [`WorkNodeCodec`].
///
/// Nodes are written in order, then their dependency lists. A dependency
/// on a node of the same build is written as that node's index; any other
/// dependency is written as a full [`NodeId`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkNodeCodec;

impl WorkNodeCodec for DefaultWorkNodeCodec {
    fn write_work<W: Write>(
        &self,
        ctx: &mut WriteContext<W>,
        build: &BuildUnit,
        nodes: &[WorkNode],
    ) -> StateResult<()> {
        let identity = build.identity();
        let mut indexes = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if node.id.build != identity {
                return Err(invalid(
                    &identity,
                    format!("node '{}' belongs to another build", node.id),
                ));
            }
            if indexes.insert(&node.id, index).is_some() {
                return Err(invalid(&identity, format!("node '{}' scheduled twice", node.id)));
            }
        }

        ctx.with_isolate(identity.clone(), |ctx| {
            ctx.write_collection(nodes, |ctx, node| -> StateResult<()> {
                ctx.write_string(&node.id.path)?;
                match &node.owner {
                    Some(owner) => {
                        ctx.write_bool(true)?;
                        ctx.write_string(owner.as_str())?;
                    }
                    None => ctx.write_bool(false)?,
                }
                ctx.write_string(&node.action)?;
                Ok(())
            })?;
            for node in nodes {
                ctx.write_collection(&node.dependencies, |ctx, dependency| -> StateResult<()> {
                    match indexes.get(dependency) {
                        Some(&index) => {
                            ctx.write_bool(true)?;
                            ctx.write_size(index)?;
                        }
                        None => {
                            ctx.write_bool(false)?;
                            ctx.write_value(dependency)?;
                        }
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
    }

    fn read_work<R: Read>(
        &self,
        ctx: &mut ReadContext<R>,
        build: &BuildUnit,
    ) -> StateResult<Vec<WorkNode>> {
        let identity = build.identity();
        ctx.with_isolate(identity.clone(), |ctx| {
            let mut nodes = ctx.read_list(|ctx| -> StateResult<WorkNode> {
                let path = ctx.read_string()?;
                let owner = if ctx.read_bool()? {
                    Some(ProjectPath::parse(&ctx.read_string()?)?)
                } else {
                    None
                };
                let action = ctx.read_string()?;
                Ok(WorkNode::new(NodeId::new(identity.clone(), path), owner, action))
            })?;
            let ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
            for node in &mut nodes {
                node.dependencies = ctx.read_list(|ctx| -> StateResult<NodeId> {
                    if ctx.read_bool()? {
                        let index = ctx.read_size()?;
                        ids.get(index).cloned().ok_or_else(|| {
                            invalid(&identity, format!("dependency index {index} out of range"))
                        })
                    } else {
                        Ok(ctx.read_value()?)
                    }
                })?;
            }
            Ok(nodes)
        })
    }
}

fn invalid(build: &BuildPath, reason: String) -> StateError {
    StateError::InvalidWorkGraph {
        build: build.clone(),
        reason,
    }
}
