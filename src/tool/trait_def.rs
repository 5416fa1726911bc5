//! The `Tool` contract (C1) and its retriever extension (C2).

use async_trait::async_trait;
use serde_json::Value;

use crate::tool::error::ToolError;
use crate::tool::spec::{RetrievalConfig, ToolSpec};

/// Behavior shared by all tools: metadata plus a single async call.
///
/// A `Toolkit` wraps a registered `Tool` with schema validation, the
/// pause-before-use hook, and the retry loop — implementors only provide
/// `spec()` and the bare `execute`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    /// Runs the tool body once. Validation, retries, and pausing are handled
    /// by the `Toolkit` that dispatches the call, not here.
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Extends `Tool` by merging a caller-supplied retrieval config with the
/// tool's defaults before dispatch.
#[async_trait]
pub trait Retriever: Tool {
    fn default_retrieval_config(&self) -> RetrievalConfig {
        self.spec()
            .default_retrieval_config
            .clone()
            .unwrap_or_default()
    }

    /// Merges `overrides` onto the tool's defaults, respecting the
    /// `*_modifiable` flags (a non-modifiable field keeps its default even if
    /// the caller supplied an override).
    fn merge_retrieval_config(&self, overrides: &RetrievalConfigOverride) -> RetrievalConfig {
        let defaults = self.default_retrieval_config();
        RetrievalConfig {
            similarity: if defaults.similarity_modifiable {
                overrides.similarity.unwrap_or(defaults.similarity)
            } else {
                defaults.similarity
            },
            top_k: if defaults.top_k_modifiable {
                overrides.top_k.unwrap_or(defaults.top_k)
            } else {
                defaults.top_k
            },
            ..defaults
        }
    }
}

/// Caller-supplied overrides for a retriever call; `None` fields keep the
/// tool's default.
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigOverride {
    pub similarity: Option<f64>,
    pub top_k: Option<u32>,
}
