//! Errors raised by graph initialization and execution.

use thiserror::Error;

use crate::graph_agent::validator::ValidationReport;

#[derive(Debug, Error, Clone)]
pub enum GraphError {
    #[error("graph failed validation: {0:?}")]
    Validation(ValidationReport),

    #[error("no entry nodes matched input")]
    NoEntryNodes,

    #[error("checkpoint restore failed: {0}")]
    CheckpointRestore(String),

    #[error("node {node_id} execution failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("operation not permitted while {0}")]
    InvalidState(&'static str),

    #[error("run canceled")]
    Canceled,
}
