//! Structural verification of operation graphs.

use thiserror::Error;

use super::{NodeId, OpGraph};

/// Structural defect in an [`OpGraph`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("graph has no root")]
    MissingRoot,

    #[error("root {root} is out of bounds ({len} nodes)")]
    RootOutOfBounds { root: NodeId, len: usize },

    #[error("node {node} references missing child {child}")]
    DanglingChild { node: NodeId, child: NodeId },

    #[error("node {node} references {child}, which is not an earlier node")]
    ForwardReference { node: NodeId, child: NodeId },

    #[error("node {node} is unreachable from the root")]
    Unreachable { node: NodeId },
}

impl ValidationError {
    /// Node the defect is attached to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::MissingRoot => None,
            Self::RootOutOfBounds { root, .. } => Some(*root),
            Self::DanglingChild { node, .. }
            | Self::ForwardReference { node, .. }
            | Self::Unreachable { node } => Some(*node),
        }
    }
}

/// Check that `graph` is a rooted DAG with no dangling or unreachable nodes.
///
/// Children must precede their parent in the arena, which rules out cycles.
/// Child counts are fixed by the [`Node`](super::Node) variants themselves.
pub fn well_formed(graph: &OpGraph) -> Result<(), ValidationError> {
    let root = graph.root().ok_or(ValidationError::MissingRoot)?;
    if root.index() >= graph.len() {
        return Err(ValidationError::RootOutOfBounds { root, len: graph.len() });
    }

    for (id, node) in graph.iter() {
        for child in node.children() {
            if child.index() >= graph.len() {
                return Err(ValidationError::DanglingChild { node: id, child });
            }
            if child >= id {
                return Err(ValidationError::ForwardReference { node: id, child });
            }
        }
    }

    // Children precede parents, so one reverse sweep marks everything
    // reachable from the root.
    let mut reachable = vec![false; graph.len()];
    reachable[root.index()] = true;
    for (id, node) in graph.iter().collect::<Vec<_>>().into_iter().rev() {
        if reachable[id.index()] {
            for child in node.children() {
                reachable[child.index()] = true;
            }
        }
    }

    match reachable.iter().position(|r| !r) {
        Some(index) => Err(ValidationError::Unreachable { node: NodeId(index as u32) }),
        None => Ok(()),
    }
}
