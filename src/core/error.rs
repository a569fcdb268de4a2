// This module defines the error taxonomy of the generator using the thiserror crate.
// GenError distinguishes the three failure classes of a run: configuration errors
// (a requested filter set has no admissible variant for a family, or the family is
// unknown), malformed descriptions (authored operation graphs or support tables that
// violate structural invariants, caught when the family is loaded), and internal
// lowering inconsistencies (a node whose format cannot be resolved under a variant).
// Every variant carries the family/descriptor, axis or node needed to fix the input.
// GenResult<T> is the convenience alias used throughout the crate.

//! Error types for the emulation generator.

use thiserror::Error;

use super::axes::Axis;
use crate::ir::NodeId;

/// Main error type for generation.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("unknown instruction family `{name}` (available: {available})")]
    UnknownFamily {
        name: String,
        available: String,
    },

    #[error("{family}/{descriptor}: no admissible variant for {axis} = {requested}")]
    Configuration {
        family: String,
        descriptor: String,
        axis: Axis,
        requested: String,
    },

    #[error("malformed description `{descriptor}`{}: {reason}", node_suffix(.node))]
    MalformedDescription {
        descriptor: String,
        node: Option<NodeId>,
        reason: String,
    },

    #[error("lowering `{descriptor}` [{variant}] failed at node {node} ({op}): {reason}")]
    Lowering {
        descriptor: String,
        variant: String,
        node: NodeId,
        op: &'static str,
        reason: String,
    },

    #[error("emitted name `{name}` produced twice")]
    DuplicateName {
        name: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn node_suffix(node: &Option<NodeId>) -> String {
    node.map(|n| format!(" at node {n}")).unwrap_or_default()
}

impl GenError {
    /// Axis named by a configuration error.
    pub fn axis(&self) -> Option<Axis> {
        match self {
            Self::Configuration { axis, .. } => Some(*axis),
            _ => None,
        }
    }
}

/// Result type alias for generation.
pub type GenResult<T> = Result<T, GenError>;
