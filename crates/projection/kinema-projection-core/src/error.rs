//! Error types for the projection tree.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProjectionError {
    /// Id not allocated by this tree, or already removed
    #[error("Unknown projection node: {0:?}")]
    UnknownNode(NodeId),

    /// A second parentless node
    #[error("Projection tree already has a root: {0:?}")]
    DuplicateRoot(NodeId),

    /// Operation needs an attached element
    #[error("Projection node is not mounted: {0:?}")]
    NotMounted(NodeId),

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

pub type Result<T> = core::result::Result<T, ProjectionError>;
