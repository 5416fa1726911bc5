//! Toolkit-level errors (registration and batch dispatch).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ToolkitError {
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("tool not registered: {0}")]
    UnregisteredTool(String),

    #[error("tool {0}: input does not match schema")]
    ValidationError(String),

    #[error("tool {0}: call rejected by approval callback")]
    UserRejected(String),

    #[error("tool {0}: {message}")]
    Execution { name: String, message: String },
}
