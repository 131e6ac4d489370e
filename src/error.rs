use thiserror::Error;

use crate::color::NodeId;

/** errors raised by the coloring engine.
Configuration and precondition errors are raised before a run starts,
execution faults are reported by the session boundary.
*/
#[derive(Debug, Error)]
pub enum ColoringError {
    /// rejected options (palette size, iteration count, attempt cap...)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// stochastic strategies refuse graphs with nodes that have no edges
    #[error("isolated nodes (no incident edge): {nodes:?}")]
    IsolatedNodes { nodes: Vec<NodeId> },

    /// the graph snapshot is not well formed
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// unexpected fault while a strategy was stepping
    #[error("execution fault: {0}")]
    ExecutionFault(String),

    /// malformed instance file
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
