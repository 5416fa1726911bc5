//! Toolkit: registry + dispatcher for typed tools.

mod approval;
mod error;

pub use approval::{always_approve, ApprovalCallback, ApprovalDecision};
pub use error::ToolkitError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::warn;

use crate::events::{AgentEvent, EventBus};
use crate::retry::RetryPolicy;
use crate::tool::{
    CompiledSchema, Retriever, RetrievalConfigOverride, Tool, ToolCall, ToolCallError, ToolKind,
    ToolOutcome, ToolSpec,
};

/// A registered tool, kept either as a plain actor or, for retriever-kind
/// tools registered via [`Toolkit::register_retriever`], as a `Retriever`
/// so `merge_retrieval_config` is reachable from dispatch.
enum ToolHandle {
    Actor(Arc<dyn Tool>),
    Retriever(Arc<dyn Retriever>),
}

impl ToolHandle {
    fn spec(&self) -> &ToolSpec {
        match self {
            ToolHandle::Actor(tool) => tool.spec(),
            ToolHandle::Retriever(tool) => tool.spec(),
        }
    }

    async fn execute(&self, args: Value) -> Result<Value, crate::tool::ToolError> {
        match self {
            ToolHandle::Actor(tool) => tool.execute(args).await,
            ToolHandle::Retriever(tool) => tool.execute(args).await,
        }
    }

    fn as_retriever(&self) -> Option<&Arc<dyn Retriever>> {
        match self {
            ToolHandle::Retriever(tool) => Some(tool),
            ToolHandle::Actor(_) => None,
        }
    }
}

struct RegisteredTool {
    handle: ToolHandle,
    schema: CompiledSchema,
}

/// Registry and dispatcher for tools: validates args, requests approval,
/// retries per-tool policy, counts failures, and groups parallel calls.
pub struct Toolkit {
    tools: HashMap<String, RegisteredTool>,
    failure_count: DashMap<String, u32>,
    approval_callback: ApprovalCallback,
    pause_threshold: u32,
    events: Option<Arc<EventBus>>,
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolkit {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            failure_count: DashMap::new(),
            approval_callback: always_approve(),
            pause_threshold: 2,
            events: None,
        }
    }

    pub fn with_approval_callback(mut self, callback: ApprovalCallback) -> Self {
        self.approval_callback = callback;
        self
    }

    pub fn with_pause_threshold(mut self, threshold: u32) -> Self {
        self.pause_threshold = threshold;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Registers a plain actor tool. Name must be unique; schema is compiled
    /// once here.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolkitError> {
        self.register_handle(ToolHandle::Actor(tool))
    }

    /// Registers a retriever-kind tool, keeping it reachable as `dyn Retriever`
    /// so `run_single` can field-wise merge a caller's `ragConfig` override
    /// over its defaults instead of only filling in when the caller omits it.
    pub fn register_retriever(&mut self, tool: Arc<dyn Retriever>) -> Result<(), ToolkitError> {
        self.register_handle(ToolHandle::Retriever(tool))
    }

    fn register_handle(&mut self, handle: ToolHandle) -> Result<(), ToolkitError> {
        let name = handle.spec().name.clone();
        if self.tools.contains_key(&name) {
            return Err(ToolkitError::AlreadyRegistered(name));
        }
        let schema = handle
            .spec()
            .compile_schema()
            .map_err(|e| ToolkitError::Execution {
                name: name.clone(),
                message: e.to_string(),
            })?;
        self.tools.insert(name.clone(), RegisteredTool { handle, schema });
        self.failure_count.insert(name, 0);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn failure_count(&self, name: &str) -> u32 {
        self.failure_count.get(name).map(|c| *c).unwrap_or(0)
    }

    /// Batch dispatch: serial calls run in submission order;
    /// calls to the same `parallel` tool are grouped and collapsed into one
    /// dispatch via the tool's `concatenate` function.
    pub async fn execute_calls(
        &self,
        calls: Vec<ToolCall>,
    ) -> Result<Vec<ToolOutcome>, ToolkitError> {
        for call in &calls {
            if !self.tools.contains_key(&call.name) {
                return Err(ToolkitError::UnregisteredTool(call.name.clone()));
            }
        }

        let mut serial: Vec<ToolCall> = Vec::new();
        let mut parallel_groups: Vec<(String, Vec<ToolCall>)> = Vec::new();

        for call in calls {
            let entry = &self.tools[&call.name];
            if entry.handle.spec().parallel {
                if let Some((_, group)) = parallel_groups
                    .iter_mut()
                    .find(|(name, _)| name == &call.name)
                {
                    group.push(call);
                } else {
                    parallel_groups.push((call.name.clone(), vec![call]));
                }
            } else {
                serial.push(call);
            }
        }

        let mut results = Vec::new();
        for call in serial {
            results.push(self.run_single(call).await);
        }

        for (name, group) in parallel_groups {
            let entry = &self.tools[&name];
            let combined_args = match &entry.handle.spec().concatenate {
                Some(concatenate) => {
                    let args: Vec<Value> = group.iter().map(|c| c.args.clone()).collect();
                    concatenate(&args)
                }
                None => group[0].args.clone(),
            };
            results.push(
                self.run_single(ToolCall {
                    name: name.clone(),
                    args: combined_args,
                })
                .await,
            );
        }

        Ok(results)
    }

    /// Single-call flow: validate, pause-before-use, retry, record.
    async fn run_single(&self, call: ToolCall) -> ToolOutcome {
        let start_time = Utc::now();
        let entry = &self.tools[&call.name];
        let spec = entry.handle.spec();

        if let Err(reason) = entry.schema.validate(&call.args) {
            self.emit(AgentEvent::ToolValidationFailed {
                tool: call.name.clone(),
                reason: reason.clone(),
            });
            let end_time = Utc::now();
            return ToolOutcome::Failure {
                error: ToolCallError {
                    name: "ValidationError".to_string(),
                    message: reason,
                    guidance: None,
                    retryable: false,
                },
                call,
                start_time,
                end_time,
                duration_ms: 0,
                attempts: 0,
            };
        }

        let mut args = call.args.clone();

        // §4.1 step 3: the pause hook is only consulted for tools that
        // declare `pauseBeforeUse`; other tools never see the approval
        // callback except on the repeated-failure threshold below.
        if spec.pause_before_use {
            let decision = (self.approval_callback)(&call, self.failure_count(&call.name));
            if let Some(modified) = decision.modified_args {
                args = modified;
            }
            if !decision.approved {
                self.emit(AgentEvent::ToolPausedForApproval {
                    tool: call.name.clone(),
                });
                let end_time = Utc::now();
                return ToolOutcome::Failure {
                    error: ToolCallError {
                        name: "UserRejected".to_string(),
                        message: "rejected before use".to_string(),
                        guidance: None,
                        retryable: false,
                    },
                    call,
                    start_time,
                    end_time,
                    duration_ms: 0,
                    attempts: 0,
                };
            }
        }

        if spec.kind == ToolKind::Retriever {
            if let Some(retriever) = entry.handle.as_retriever() {
                if let Value::Object(ref mut map) = args {
                    let overrides = map
                        .get("ragConfig")
                        .map(rag_override_from_value)
                        .unwrap_or_default();
                    let merged = retriever.merge_retrieval_config(&overrides);
                    map.insert(
                        "ragConfig".to_string(),
                        serde_json::json!({
                            "similarity": merged.similarity,
                            "topK": merged.top_k,
                            "optimize": merged.optimize,
                        }),
                    );
                }
            }
        }

        let retry_policy = retry_policy_for(spec.retries);
        let max_attempts = retry_policy.max_attempts() + 1;
        let mut attempts = 0u32;
        let mut last_error: Option<ToolCallError> = None;

        while attempts < max_attempts {
            attempts += 1;
            match entry.handle.execute(args.clone()).await {
                Ok(output) => {
                    self.failure_count.insert(call.name.clone(), 0);
                    let end_time = Utc::now();
                    return ToolOutcome::Success {
                        call: ToolCall { args, ..call },
                        output,
                        start_time,
                        end_time,
                        duration_ms: (end_time - start_time).num_milliseconds(),
                        attempts,
                    };
                }
                Err(err) => {
                    let mut count = self.failure_count.entry(call.name.clone()).or_insert(0);
                    *count += 1;
                    let current_count = *count;
                    drop(count);

                    if current_count >= self.pause_threshold {
                        warn!(tool = %call.name, failures = current_count, "re-requesting approval after repeated failures");
                        self.emit(AgentEvent::ToolPausedForApproval {
                            tool: call.name.clone(),
                        });
                        let reapproval = (self.approval_callback)(&call, current_count);
                        if !reapproval.approved {
                            let end_time = Utc::now();
                            return ToolOutcome::Failure {
                                error: ToolCallError {
                                    name: "UserRejected".to_string(),
                                    message: "rejected after repeated failures".to_string(),
                                    guidance: None,
                                    retryable: false,
                                },
                                call,
                                start_time,
                                end_time,
                                duration_ms: (end_time - start_time).num_milliseconds(),
                                attempts,
                            };
                        }
                    }

                    let policy = spec.policy_for(err.name());
                    let retryable = policy.retryable || err.retryable();
                    last_error = Some(ToolCallError {
                        name: err.name().to_string(),
                        message: err.to_string(),
                        guidance: policy.guidance.clone(),
                        retryable,
                    });
                    if !retryable || attempts >= max_attempts {
                        break;
                    }
                    self.emit(AgentEvent::ToolRetry {
                        tool: call.name.clone(),
                        attempt: attempts,
                    });
                    let delay = retry_policy.delay_for(attempts);
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let end_time = Utc::now();
        let error = last_error.unwrap_or(ToolCallError {
            name: "UnknownError".to_string(),
            message: "exceeded retry limit".to_string(),
            guidance: None,
            retryable: false,
        });
        ToolOutcome::Failure {
            call: ToolCall { args, ..call },
            error,
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds(),
            attempts,
        }
    }

    /// Concatenates sanitized name/description/schemas/examples for every
    /// registered tool, separated by `---`; empty when no tools registered.
    pub fn prepare_prompt_payload(&self) -> String {
        self.tools
            .values()
            .map(|entry| {
                let spec: &ToolSpec = entry.handle.spec();
                format!(
                    "name: {}\ndescription: {}\ninput_schema: {}\noutput_schema: {}\nexamples: {}",
                    sanitize(&spec.name),
                    sanitize(&spec.description),
                    spec.input_schema,
                    spec.output_schema
                        .clone()
                        .unwrap_or(Value::Null),
                    spec.invocation_examples.join(", "),
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

fn sanitize(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

/// Maps a tool's `retries` count onto the shared backoff vocabulary so
/// tool-call retries don't carry their own ad hoc counter.
fn retry_policy_for(retries: u32) -> RetryPolicy {
    if retries == 0 {
        RetryPolicy::None
    } else {
        RetryPolicy::fixed(retries, Duration::from_millis(50))
    }
}

/// Parses a caller-supplied `ragConfig` value into an override, field by
/// field, so a partial override (e.g. only `similarity`) still leaves the
/// other field to be filled from the tool's defaults by
/// `Retriever::merge_retrieval_config`.
fn rag_override_from_value(value: &Value) -> RetrievalConfigOverride {
    RetrievalConfigOverride {
        similarity: value.get("similarity").and_then(Value::as_f64),
        top_k: value
            .get("topK")
            .and_then(Value::as_u64)
            .map(|n| n as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolError, ToolKind, ToolSpec};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AdderTool {
        spec: ToolSpec,
    }

    impl AdderTool {
        fn new() -> Self {
            Self {
                spec: ToolSpec::new("adder", "adds two numbers", ToolKind::Actor).with_input_schema(
                    serde_json::json!({
                        "type": "object",
                        "required": ["a", "b"],
                        "properties": {"a": {"type": "number"}, "b": {"type": "number"}}
                    }),
                ),
            }
        }
    }

    #[async_trait]
    impl Tool for AdderTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(serde_json::json!(a + b))
        }
    }

    /// S1 — Toolkit validation.
    #[tokio::test]
    async fn missing_required_field_fails_validation() {
        let mut toolkit = Toolkit::new();
        toolkit.register(Arc::new(AdderTool::new())).unwrap();

        let results = toolkit
            .execute_calls(vec![ToolCall {
                name: "adder".into(),
                args: serde_json::json!({"a": 1}),
            }])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        match &results[0] {
            ToolOutcome::Failure { error, .. } => {
                assert_eq!(error.name, "ValidationError");
            }
            ToolOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    struct FlakyTool {
        spec: ToolSpec,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ToolError::Execution {
                    name: "Transient".into(),
                    message: "transient failure".into(),
                    guidance: None,
                    retryable: true,
                })
            } else {
                Ok(serde_json::json!(42))
            }
        }
    }

    /// S2 — Toolkit retry and recovery.
    #[tokio::test]
    async fn flaky_tool_recovers_within_retry_budget() {
        let mut toolkit = Toolkit::new();
        let spec = ToolSpec::new("flaky", "flaky tool", ToolKind::Actor)
            .with_retries(2)
            .with_error_policy(
                "Transient",
                crate::tool::ErrorPolicyEntry {
                    guidance: None,
                    retryable: true,
                },
            );
        toolkit
            .register(Arc::new(FlakyTool {
                spec,
                calls: AtomicU32::new(0),
            }))
            .unwrap();

        let results = toolkit
            .execute_calls(vec![ToolCall {
                name: "flaky".into(),
                args: serde_json::json!({}),
            }])
            .await
            .unwrap();

        match &results[0] {
            ToolOutcome::Success {
                output, attempts, ..
            } => {
                assert_eq!(output, &serde_json::json!(42));
                assert_eq!(*attempts, 3);
            }
            ToolOutcome::Failure { error, .. } => panic!("expected success, got {:?}", error),
        }
        assert_eq!(toolkit.failure_count("flaky"), 0);
    }

    struct SumTool {
        spec: ToolSpec,
        invocations: AtomicU32,
    }

    #[async_trait]
    impl Tool for SumTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(args)
        }
    }

    /// S3 — Parallel grouping.
    #[tokio::test]
    async fn parallel_calls_collapse_into_one_dispatch() {
        let mut toolkit = Toolkit::new();
        let spec = ToolSpec::new("sum", "sums values", ToolKind::Actor).with_parallel(
            true,
            Some(Arc::new(|args: &[Value]| {
                let values: Vec<Value> = args
                    .iter()
                    .flat_map(|a| a["values"].as_array().cloned().unwrap_or_default())
                    .collect();
                serde_json::json!({"values": values})
            })),
        );
        toolkit
            .register(Arc::new(SumTool {
                spec,
                invocations: AtomicU32::new(0),
            }))
            .unwrap();

        let results = toolkit
            .execute_calls(vec![
                ToolCall {
                    name: "sum".into(),
                    args: serde_json::json!({"values": [1]}),
                },
                ToolCall {
                    name: "sum".into(),
                    args: serde_json::json!({"values": [2, 3]}),
                },
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        match &results[0] {
            ToolOutcome::Success { output, .. } => {
                assert_eq!(output, &serde_json::json!({"values": [1, 2, 3]}));
            }
            ToolOutcome::Failure { error, .. } => panic!("expected success, got {:?}", error),
        }
    }

    #[test]
    fn register_is_idempotent_only_by_name() {
        let mut toolkit = Toolkit::new();
        toolkit.register(Arc::new(AdderTool::new())).unwrap();
        let err = toolkit.register(Arc::new(AdderTool::new())).unwrap_err();
        assert!(matches!(err, ToolkitError::AlreadyRegistered(name) if name == "adder"));
    }

    struct EchoRetriever {
        spec: ToolSpec,
    }

    impl EchoRetriever {
        fn new() -> Self {
            Self {
                spec: ToolSpec::new("search", "searches documents", ToolKind::Retriever)
                    .with_retrieval_config(crate::tool::RetrievalConfig {
                        similarity: 0.5,
                        similarity_modifiable: true,
                        top_k: 3,
                        top_k_modifiable: false,
                        optimize: false,
                    }),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoRetriever {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    impl crate::tool::Retriever for EchoRetriever {}

    /// A partial caller override must fill only the modifiable field from
    /// the caller and leave the non-modifiable field at the tool's default.
    #[tokio::test]
    async fn retriever_merges_partial_override_field_wise() {
        let mut toolkit = Toolkit::new();
        toolkit
            .register_retriever(Arc::new(EchoRetriever::new()))
            .unwrap();

        let results = toolkit
            .execute_calls(vec![ToolCall {
                name: "search".into(),
                args: serde_json::json!({"query": "q", "ragConfig": {"similarity": 0.9, "topK": 50}}),
            }])
            .await
            .unwrap();

        match &results[0] {
            ToolOutcome::Success { output, .. } => {
                assert_eq!(output["ragConfig"]["similarity"], 0.9);
                // top_k is not modifiable on this tool's default config, so
                // the caller's override of 50 must be discarded.
                assert_eq!(output["ragConfig"]["topK"], 3);
            }
            ToolOutcome::Failure { error, .. } => panic!("expected success, got {:?}", error),
        }
    }

    struct NeverCalledTool {
        spec: ToolSpec,
        invocations: AtomicU32,
    }

    #[async_trait]
    impl Tool for NeverCalledTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    /// S4 — `pauseBeforeUse` gates dispatch on the approval callback before
    /// any attempt; a rejection must never reach the tool body.
    #[tokio::test]
    async fn pause_before_use_rejection_skips_execution() {
        let mut toolkit = Toolkit::new()
            .with_approval_callback(Arc::new(|_, _| ApprovalDecision::reject()));
        let spec = ToolSpec::new("sensitive", "needs approval", ToolKind::Actor)
            .with_pause_before_use(true);
        toolkit
            .register(Arc::new(NeverCalledTool {
                spec,
                invocations: AtomicU32::new(0),
            }))
            .unwrap();

        let results = toolkit
            .execute_calls(vec![ToolCall {
                name: "sensitive".into(),
                args: serde_json::json!({}),
            }])
            .await
            .unwrap();

        match &results[0] {
            ToolOutcome::Failure { error, .. } => {
                assert_eq!(error.name, "UserRejected");
            }
            ToolOutcome::Success { .. } => panic!("expected rejection"),
        }
    }

    /// A tool with `pauseBeforeUse` unset must never consult the approval
    /// callback at all, even when one is configured.
    #[tokio::test]
    async fn pause_before_use_disabled_skips_approval_callback() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut toolkit = Toolkit::new().with_approval_callback(Arc::new(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            ApprovalDecision::approve()
        }));
        toolkit.register(Arc::new(AdderTool::new())).unwrap();

        toolkit
            .execute_calls(vec![ToolCall {
                name: "adder".into(),
                args: serde_json::json!({"a": 1, "b": 2}),
            }])
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn events_fire_on_validation_failure_and_pause() {
        use crate::events::EventBus;
        use std::sync::atomic::AtomicBool;

        let bus = Arc::new(EventBus::new());
        let validation_fired = Arc::new(AtomicBool::new(false));
        let pause_fired = Arc::new(AtomicBool::new(false));
        let vf = validation_fired.clone();
        bus.subscribe(
            "tool-validation-failed",
            Arc::new(move |_| vf.store(true, Ordering::SeqCst)),
        );
        let pf = pause_fired.clone();
        bus.subscribe(
            "tool-paused-for-approval",
            Arc::new(move |_| pf.store(true, Ordering::SeqCst)),
        );

        let mut toolkit = Toolkit::new()
            .with_events(bus)
            .with_approval_callback(Arc::new(|_, _| ApprovalDecision::reject()));
        toolkit.register(Arc::new(AdderTool::new())).unwrap();
        let pause_spec = ToolSpec::new("sensitive", "needs approval", ToolKind::Actor)
            .with_pause_before_use(true);
        toolkit
            .register(Arc::new(NeverCalledTool {
                spec: pause_spec,
                invocations: AtomicU32::new(0),
            }))
            .unwrap();

        toolkit
            .execute_calls(vec![ToolCall {
                name: "adder".into(),
                args: serde_json::json!({"a": 1}),
            }])
            .await
            .unwrap();
        assert!(validation_fired.load(Ordering::SeqCst));

        toolkit
            .execute_calls(vec![ToolCall {
                name: "sensitive".into(),
                args: serde_json::json!({}),
            }])
            .await
            .unwrap();
        assert!(pause_fired.load(Ordering::SeqCst));
    }
}
