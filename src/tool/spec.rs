//! Tool metadata record and the retrieval-config it carries for
//! retriever-kind tools.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::ids::ToolId;
use crate::tool::error::ToolError;

/// Whether a tool is a plain actor (side-effecting action) or a retriever
/// (extends the actor contract with a mergeable retrieval config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Actor,
    Retriever,
}

/// Per-error-name guidance used by the retry loop and surfaced to the caller.
#[derive(Debug, Clone, Default)]
pub struct ErrorPolicyEntry {
    pub guidance: Option<String>,
    pub retryable: bool,
}

/// Default retrieval tunables for a retriever-kind tool.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub similarity: f64,
    pub similarity_modifiable: bool,
    pub top_k: u32,
    pub top_k_modifiable: bool,
    pub optimize: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity: 0.75,
            similarity_modifiable: true,
            top_k: 5,
            top_k_modifiable: true,
            optimize: false,
        }
    }
}

/// A compiled `jsonschema` validator, built once at registration — a tool
/// whose input schema does not compile is rejected before it can run.
#[derive(Clone)]
pub struct CompiledSchema(pub Arc<JSONSchema>);

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledSchema(..)")
    }
}

impl CompiledSchema {
    pub fn compile(schema: &Value) -> Result<Self, String> {
        JSONSchema::compile(schema)
            .map(|s| CompiledSchema(Arc::new(s)))
            .map_err(|e| e.to_string())
    }

    pub fn validate(&self, args: &Value) -> Result<(), String> {
        self.0
            .validate(args)
            .map_err(|errors| {
                errors
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
    }
}

/// Concatenation function for parallel tool calls: combines the `args` of every
/// call in a parallel group into a single `args` value before one dispatch
/// Only meaningful when `Tool::parallel` is true.
pub type Concatenate = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Immutable metadata describing a registered tool.
///
/// Built once via [`ToolSpec::new`] plus `with_*` chaining, then handed to a
/// `Toolkit` for registration — registration is where `input_schema` is
/// compiled and cached as [`CompiledSchema`].
#[derive(Clone)]
pub struct ToolSpec {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub use_case: Option<String>,
    pub kind: ToolKind,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub invocation_examples: Vec<String>,
    pub retries: u32,
    pub error_policy: HashMap<String, ErrorPolicyEntry>,
    pub parallel: bool,
    pub concatenate: Option<Concatenate>,
    pub max_iterations: u32,
    pub pause_before_use: bool,
    pub user_modify_query: bool,
    /// Only meaningful when `kind == ToolKind::Retriever`; dropped at
    /// registration for actor-kind tools.
    pub default_retrieval_config: Option<RetrievalConfig>,
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("retries", &self.retries)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ToolKind) -> Self {
        let name = name.into();
        Self {
            id: ToolId::new(name.clone()),
            name,
            description: description.into(),
            use_case: None,
            kind,
            input_schema: serde_json::json!({}),
            output_schema: None,
            invocation_examples: Vec::new(),
            retries: 0,
            error_policy: HashMap::new(),
            parallel: false,
            concatenate: None,
            max_iterations: 1,
            pause_before_use: false,
            user_modify_query: false,
            default_retrieval_config: match kind {
                ToolKind::Retriever => Some(RetrievalConfig::default()),
                ToolKind::Actor => None,
            },
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_parallel(mut self, parallel: bool, concatenate: Option<Concatenate>) -> Self {
        self.parallel = parallel;
        self.concatenate = concatenate;
        self
    }

    pub fn with_pause_before_use(mut self, pause: bool) -> Self {
        self.pause_before_use = pause;
        self
    }

    pub fn with_error_policy(mut self, name: impl Into<String>, entry: ErrorPolicyEntry) -> Self {
        self.error_policy.insert(name.into(), entry);
        self
    }

    /// Actor-kind tools never carry retrieval config, matching the §3.2
    /// invariant ("if kind = actor, retrieval-config fields are dropped").
    pub fn with_retrieval_config(mut self, config: RetrievalConfig) -> Self {
        if self.kind == ToolKind::Retriever {
            self.default_retrieval_config = Some(config);
        }
        self
    }

    /// Compiles `input_schema` once; call this during `Toolkit::register`.
    pub fn compile_schema(&self) -> Result<CompiledSchema, ToolError> {
        CompiledSchema::compile(&self.input_schema).map_err(|reason| ToolError::InvalidSchema {
            name: self.name.clone(),
            reason,
        })
    }

    /// Looks up retry guidance for a named error, falling back to "not retryable".
    pub fn policy_for(&self, error_name: &str) -> ErrorPolicyEntry {
        self.error_policy
            .get(error_name)
            .cloned()
            .unwrap_or_default()
    }
}
