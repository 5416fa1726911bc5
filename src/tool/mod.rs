//! Tool contract and retriever extension (C1, C2).

mod call;
mod error;
mod spec;
mod trait_def;

pub use call::{ToolCall, ToolCallError, ToolOutcome};
pub use error::ToolError;
pub use spec::{CompiledSchema, Concatenate, ErrorPolicyEntry, RetrievalConfig, ToolKind, ToolSpec};
pub use trait_def::{Retriever, RetrievalConfigOverride, Tool};
