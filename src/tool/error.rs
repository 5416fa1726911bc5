//! Errors raised by a single tool call (C1 Tool Contract).

use thiserror::Error;

/// Error surfaced while validating, invoking, or retrying a single tool.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    /// `inputSchema` failed to compile at registration time.
    #[error("tool {name}: input schema does not compile: {reason}")]
    InvalidSchema { name: String, reason: String },

    /// Call args did not validate against the tool's compiled `inputSchema`.
    #[error("tool {name}: arguments failed schema validation: {reason}")]
    ValidationFailed { name: String, reason: String },

    /// The tool body itself raised an error; carries whether it is retryable
    /// per the tool's `errorPolicy`.
    #[error("tool {name}: {message}")]
    Execution {
        name: String,
        message: String,
        guidance: Option<String>,
        retryable: bool,
    },

    /// Retries were exhausted without a successful call.
    #[error("tool {name}: exhausted {attempts} attempt(s): {last}")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        last: Box<ToolError>,
    },

    /// A `pauseBeforeUse` hook rejected the call before it ran.
    #[error("tool {name}: paused for approval and rejected")]
    ApprovalRejected { name: String },
}

impl ToolError {
    pub fn retryable(&self) -> bool {
        match self {
            ToolError::Execution { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolError::InvalidSchema { name, .. }
            | ToolError::ValidationFailed { name, .. }
            | ToolError::Execution { name, .. }
            | ToolError::RetriesExhausted { name, .. }
            | ToolError::ApprovalRejected { name } => name,
        }
    }
}
