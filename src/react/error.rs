//! Errors raised by the ReAct loop.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ReactError {
    #[error("react-parsing-error: {0}")]
    ParsingError(String),

    #[error("UnknownError: {0}")]
    Unknown(String),

    #[error("operation canceled")]
    Canceled,
}
