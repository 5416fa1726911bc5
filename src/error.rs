//! Top-level error type composing every subsystem's errors.

use thiserror::Error;

use crate::factory::FactoryError;
use crate::graph_agent::GraphError;
use crate::react::ReactError;
use crate::tool::ToolError;
use crate::toolkit::ToolkitError;

#[derive(Debug, Error, Clone)]
pub enum AgentError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    #[error(transparent)]
    React(#[from] ReactError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    /// The run's cancellation token was signaled; the only condition that
    /// tears down a whole run.
    #[error("operation canceled")]
    Canceled,

    #[error("{0}")]
    Other(String),
}
