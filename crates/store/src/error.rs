use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge references missing node: {0} -> {1}")]
    MissingEndpoint(NodeId, NodeId),

    #[error("Edge not found: {0} -> {1}")]
    EdgeNotFound(NodeId, NodeId),

    #[error("Verified edges can only be created by promoting a provisional edge")]
    DirectVerifiedEdge,

    #[error("Provisional edges must be proposed through the edge gate")]
    UngatedProvisionalEdge,

    #[error("Graph unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
