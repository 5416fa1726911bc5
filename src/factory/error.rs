//! Errors raised while validating or building a `GraphAgent` from config.

use thiserror::Error;

use crate::graph_agent::GraphError;

#[derive(Debug, Error, Clone)]
pub enum FactoryError {
    #[error("invalid graph configuration: {0:?}")]
    InvalidConfig(Vec<String>),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
