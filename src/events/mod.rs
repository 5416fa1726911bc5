//! Typed observability event bus.
//!
//! Dynamic `emit('arbitrary-name', payload)` becomes a closed sum of event
//! kinds; anything not named below goes through `AgentEvent::Custom`, kept
//! for forward compatibility, not general use.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// One event kind per observable lifecycle/step/tool/LLM/error moment.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    // Lifecycle
    GraphAgentInitializing,
    GraphAgentReady,
    GraphAgentError { message: String },
    AgentStateChanged { from: String, to: String },

    // Execution
    GraphExecutionStart,
    GraphExecutionComplete,
    GraphExecutionError { message: String },
    GraphExecutionAborted,
    GraphEntryNodesDetermined { node_ids: Vec<String> },
    GraphEvaluatingEdges { node_id: String },
    GraphEdgeTraversed { edge_id: String, to: String },
    GraphEdgeNotTraversed { edge_id: String },
    GraphExclusiveGroupNoMatch { group: String, node_id: String },
    GraphJoinNodeWaiting { node_id: String },
    GraphJoinNodeReady { node_id: String },

    // Node
    GraphNodeExecutionStart { node_id: String },
    GraphNodeExecutionComplete { node_id: String, duration_ms: i64 },
    GraphNodeExecutionError { node_id: String, message: String },
    GraphNodePaused { node_id: String },
    GraphNodeAwaitingInput { node_id: String },
    GraphNodeAwaitingApproval { node_id: String },
    GraphNodeLowConfidence { node_id: String, confidence: f64 },
    GraphNodeChatWaiting { node_id: String },

    // Rollback
    RollbackCheckpointCreated { node_id: String },
    GraphExecutionRolledBack { steps: u32 },
    RollbackCheckpointsCleared,

    // Tooling
    ToolValidationFailed { tool: String, reason: String },
    ToolRetry { tool: String, attempt: u32 },
    ToolPausedForApproval { tool: String },

    // LLM
    LlmInvocationStart { step: u32, prompt_len: usize },
    LlmInvocationComplete { step: u32 },
    LlmStreamingChunk { step: u32, chunk: String },

    /// Escape hatch for anything not covered above.
    Custom { name: String, payload: Value },
}

impl AgentEvent {
    /// Topic key used for subscriber routing; one topic per event kind.
    pub fn topic(&self) -> &'static str {
        use AgentEvent::*;
        match self {
            GraphAgentInitializing => "graph-agent-initializing",
            GraphAgentReady => "graph-agent-ready",
            GraphAgentError { .. } => "graph-agent-error",
            AgentStateChanged { .. } => "agent-state-changed",
            GraphExecutionStart => "graph-execution-start",
            GraphExecutionComplete => "graph-execution-complete",
            GraphExecutionError { .. } => "graph-execution-error",
            GraphExecutionAborted => "graph-execution-aborted",
            GraphEntryNodesDetermined { .. } => "graph-entry-nodes-determined",
            GraphEvaluatingEdges { .. } => "graph-evaluating-edges",
            GraphEdgeTraversed { .. } => "graph-edge-traversed",
            GraphEdgeNotTraversed { .. } => "graph-edge-not-traversed",
            GraphExclusiveGroupNoMatch { .. } => "graph-exclusive-group-no-match",
            GraphJoinNodeWaiting { .. } => "graph-join-node-waiting",
            GraphJoinNodeReady { .. } => "graph-join-node-ready",
            GraphNodeExecutionStart { .. } => "graph-node-execution-start",
            GraphNodeExecutionComplete { .. } => "graph-node-execution-complete",
            GraphNodeExecutionError { .. } => "graph-node-execution-error",
            GraphNodePaused { .. } => "graph-node-paused",
            GraphNodeAwaitingInput { .. } => "graph-node-awaiting-input",
            GraphNodeAwaitingApproval { .. } => "graph-node-awaiting-approval",
            GraphNodeLowConfidence { .. } => "graph-node-low-confidence",
            GraphNodeChatWaiting { .. } => "graph-node-chat-waiting",
            RollbackCheckpointCreated { .. } => "rollback-checkpoint-created",
            GraphExecutionRolledBack { .. } => "graph-execution-rolled-back",
            RollbackCheckpointsCleared => "rollback-checkpoints-cleared",
            ToolValidationFailed { .. } => "tool-validation-failed",
            ToolRetry { .. } => "tool-retry",
            ToolPausedForApproval { .. } => "tool-paused-for-approval",
            LlmInvocationStart { .. } => "llm-invocation-start",
            LlmInvocationComplete { .. } => "llm-invocation-complete",
            LlmStreamingChunk { .. } => "llm-streaming-chunk",
            Custom { .. } => "custom",
        }
    }
}

type Listener = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// Topic-keyed publish/subscribe bus. Delivery is synchronous and ordered
/// per topic per emitter.
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<&'static str, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    pub fn subscribe(&self, topic: &'static str, listener: Listener) {
        self.listeners.entry(topic).or_default().push(listener);
    }

    /// Subscribes to every topic.
    pub fn subscribe_all(&self, listener: Listener) {
        self.subscribe("*", listener);
    }

    pub fn publish(&self, event: AgentEvent) {
        if let Some(listeners) = self.listeners.get(event.topic()) {
            for listener in listeners.iter() {
                listener(&event);
            }
        }
        if let Some(listeners) = self.listeners.get("*") {
            for listener in listeners.iter() {
                listener(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_only_to_matching_topic() {
        let bus = EventBus::new();
        let matched = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));
        let m = matched.clone();
        bus.subscribe("graph-execution-start", Arc::new(move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        }));
        let o = other.clone();
        bus.subscribe("graph-execution-complete", Arc::new(move |_| {
            o.fetch_add(1, Ordering::SeqCst);
        }));

        bus.publish(AgentEvent::GraphExecutionStart);

        assert_eq!(matched.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }
}
