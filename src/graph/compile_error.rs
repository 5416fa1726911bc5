//! Errors from `StateGraph::compile`.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CompilationError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("graph must have exactly one edge from START")]
    MissingStart,

    #[error("graph must have exactly one edge to END")]
    MissingEnd,

    #[error("edges must form a single linear chain from START to END: {0}")]
    InvalidChain(String),

    #[error("node has both an edge and conditional edges: {0}")]
    NodeHasBothEdgeAndConditional(String),

    #[error("conditional path_map references unknown node: {0}")]
    InvalidConditionalPathMap(String),
}
