//! The Graph Agent execution engine (C5): entry selection, node dispatch,
//! edge evaluation, join synchronization, exclusive-group arbitration,
//! pause/resume, rollback, and user-interaction handling.
//!
//! State mutation is centralized: spawned node tasks run independently but
//! report completion over an mpsc channel to one run loop (`run_from`), which
//! is the only place that fans out to new nodes or mutates `ExecutionState`
//! after a run has started. This stands in for the source's ad-hoc mutable
//! state shared across promise chains (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::{AgentEvent, EventBus};
use crate::graph_agent::command::{GraphCommand, InteractionReply};
use crate::graph_agent::edge::GraphEdge;
use crate::graph_agent::error::GraphError;
use crate::graph_agent::node::{GraphNode, LlmRef};
use crate::graph_agent::state::{
    ExecutionState, HistoryEntry, InteractionKind, JoinState, NodeExecutionContext, NodeStatus,
    PauseSettings, PendingInteraction, RollbackCheckpoint,
};
use crate::graph_agent::user_interaction::{estimate_confidence, UserInteraction, UserInteractionMode};
use crate::graph_agent::validator::{self, ValidationReport};
use crate::ids::NodeId;
use crate::llm::LlmClient;
use crate::memory::Checkpointer;
use crate::message::Message;
use crate::react::ReactAgent;
use crate::toolkit::Toolkit;

const USER_INPUT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const APPROVAL_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const CHAT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_CONTEXT_HISTORY_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Initializing,
    Ready,
    Running,
    Paused,
    Stopped,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseBarrier {
    Before,
    After,
    Between,
}

#[derive(Debug, Clone, Default)]
pub struct PauseOptions {
    pub before: bool,
    pub after: bool,
    pub between: bool,
    pub branches: Vec<NodeId>,
}

/// Concurrent, pausable, checkpointable state machine routing input through a
/// directed graph of ReAct-capable nodes.
pub struct GraphAgent {
    nodes: RwLock<HashMap<NodeId, GraphNode>>,
    edges: RwLock<Vec<GraphEdge>>,
    llm_registry: HashMap<String, Arc<dyn LlmClient>>,
    toolkit: Arc<Toolkit>,
    events: Arc<EventBus>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    state: Mutex<ExecutionState>,
    agent_state: Mutex<AgentState>,
    resume_notify: Notify,
    interaction_waiters: Mutex<HashMap<NodeId, oneshot::Sender<InteractionReply>>>,
    run_cancel: Mutex<Option<CancellationToken>>,
    pending_resume_node: Mutex<Option<NodeId>>,
    pub validation_warnings: Vec<String>,
}

impl GraphAgent {
    /// Validates the graph, coerces React-disabled nodes to `max_steps = 1`
    /// (a node signals "disabled" with `max_steps == 0`), builds the join
    /// tracker, and transitions to `ready`.
    pub fn new(
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        llm_registry: HashMap<String, Arc<dyn LlmClient>>,
        toolkit: Arc<Toolkit>,
        events: Arc<EventBus>,
    ) -> Result<Self, GraphError> {
        Self::with_checkpointer(nodes, edges, llm_registry, toolkit, events, None)
    }

    pub fn with_checkpointer(
        mut nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
        llm_registry: HashMap<String, Arc<dyn LlmClient>>,
        toolkit: Arc<Toolkit>,
        events: Arc<EventBus>,
        checkpointer: Option<Arc<dyn Checkpointer>>,
    ) -> Result<Self, GraphError> {
        events.publish(AgentEvent::GraphAgentInitializing);

        for node in &mut nodes {
            if node.react_config.max_steps == 0 {
                node.react_config.max_steps = 1;
            }
        }

        let report: ValidationReport = validator::validate(&nodes, &edges);
        if !report.valid {
            events.publish(AgentEvent::GraphAgentError {
                message: format!("{} validation error(s)", report.errors.len()),
            });
            return Err(GraphError::Validation(report));
        }
        for warning in &report.warnings {
            warn!(warning, "graph validation warning");
        }

        let mut join_tracker: HashMap<NodeId, JoinState> = HashMap::new();
        for edge in edges.iter().filter(|e| e.is_join) {
            let entry = join_tracker.entry(edge.to.clone()).or_default();
            entry.required.extend(edge.join_predecessors.iter().cloned());
        }

        let mut exclusive_edge_groups: HashMap<String, std::collections::HashSet<crate::ids::EdgeId>> =
            HashMap::new();
        for edge in &edges {
            if let Some(group) = &edge.exclusive_group {
                exclusive_edge_groups
                    .entry(group.clone())
                    .or_default()
                    .insert(edge.id.clone());
            }
        }

        let state = ExecutionState {
            join_tracker,
            exclusive_edge_groups,
            ..Default::default()
        };

        events.publish(AgentEvent::GraphAgentReady);

        Ok(Self {
            nodes: RwLock::new(nodes.into_iter().map(|n| (n.id.clone(), n)).collect()),
            edges: RwLock::new(edges),
            llm_registry,
            toolkit,
            events,
            checkpointer,
            state: Mutex::new(state),
            agent_state: Mutex::new(AgentState::Ready),
            resume_notify: Notify::new(),
            interaction_waiters: Mutex::new(HashMap::new()),
            run_cancel: Mutex::new(None),
            pending_resume_node: Mutex::new(None),
            validation_warnings: report.warnings,
        })
    }

    pub async fn agent_state(&self) -> AgentState {
        *self.agent_state.lock().await
    }

    async fn set_agent_state(&self, new_state: AgentState) {
        let mut state = self.agent_state.lock().await;
        let from = format!("{:?}", *state);
        *state = new_state;
        self.events.publish(AgentEvent::AgentStateChanged {
            from,
            to: format!("{new_state:?}"),
        });
    }

    /// Command-prefixed input routes to nodes declaring that command;
    /// otherwise `_newmessage` nodes; otherwise nodes with no incoming edge.
    async fn select_entry(&self, input: &str) -> Result<(Vec<NodeId>, String), GraphError> {
        let nodes = self.nodes.read().await;
        let edges = self.edges.read().await;

        let (entry, processed_input) = if let Some(command) = input.split_whitespace().next().filter(|t| t.starts_with('/')) {
            let entry: Vec<NodeId> = nodes
                .values()
                .filter(|n| n.command.as_deref() == Some(command))
                .map(|n| n.id.clone())
                .collect();
            let rest = input[command.len()..].trim_start().to_string();
            (entry, rest)
        } else {
            let entry: Vec<NodeId> = nodes
                .values()
                .filter(|n| n.command.as_deref() == Some(GraphNode::NEW_MESSAGE_COMMAND))
                .map(|n| n.id.clone())
                .collect();
            (entry, input.to_string())
        };

        let entry = if entry.is_empty() {
            let has_incoming: std::collections::HashSet<NodeId> =
                edges.iter().map(|e| e.to.clone()).collect();
            nodes
                .values()
                .filter(|n| !has_incoming.contains(&n.id))
                .map(|n| n.id.clone())
                .collect()
        } else {
            entry
        };

        if entry.is_empty() {
            return Err(GraphError::NoEntryNodes);
        }

        Ok((entry, processed_input))
    }

    /// High-level convenience over `stream`: joins yielded chunks.
    pub async fn invoke(self: &Arc<Self>, input: &str) -> Result<String, GraphError> {
        let chunks = self.stream(input).await?;
        Ok(chunks.join("\n"))
    }

    pub async fn stream(self: &Arc<Self>, input: &str) -> Result<Vec<String>, GraphError> {
        let (entry_nodes, processed_input) = self.select_entry(input).await?;
        self.run_from(entry_nodes.into_iter().map(|id| (id, processed_input.clone())).collect())
            .await
    }

    /// Runs one or more node starts to completion (via fan-out), returning
    /// each start node's output in submission order followed by every other
    /// completed node's output in arrival order, deduped by `emitted_ids`.
    async fn run_from(self: &Arc<Self>, starts: Vec<(NodeId, String)>) -> Result<Vec<String>, GraphError> {
        {
            let mut state = self.state.lock().await;
            state.emitted_ids.clear();
            state.completed_queue.clear();
        }
        let cancel = CancellationToken::new();
        *self.run_cancel.lock().await = Some(cancel.clone());
        self.set_agent_state(AgentState::Running).await;
        self.events.publish(AgentEvent::GraphExecutionStart);
        self.events.publish(AgentEvent::GraphEntryNodesDetermined {
            node_ids: starts.iter().map(|(id, _)| id.to_string()).collect(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<GraphCommand>();
        let start_order: Vec<NodeId> = starts.iter().map(|(id, _)| id.clone()).collect();
        let mut pending = 0usize;
        for (node_id, input) in starts {
            pending += 1;
            let this = self.clone();
            let tx2 = tx.clone();
            let cancel2 = cancel.clone();
            tokio::spawn(async move { run_node(this, node_id, input, tx2, cancel2).await });
        }

        let mut outputs_by_node: HashMap<NodeId, String> = HashMap::new();
        let mut arrival_order: Vec<NodeId> = Vec::new();

        while pending > 0 {
            match rx.recv().await {
                Some(GraphCommand::NodeCompleted(ctx)) => {
                    pending -= 1;
                    let node_id = ctx.node_id.clone();
                    let output = ctx.output.clone().unwrap_or_default();
                    outputs_by_node.insert(node_id.clone(), output.clone());
                    arrival_order.push(node_id.clone());
                    pending += self.fan_out(&node_id, &output, &tx, &cancel).await;
                }
                Some(GraphCommand::NodeFailed { node_id, message }) => {
                    pending -= 1;
                    self.events.publish(AgentEvent::GraphNodeExecutionError {
                        node_id: node_id.to_string(),
                        message,
                    });
                }
                None => break,
            }
        }

        self.set_agent_state(AgentState::Ready).await;
        if cancel.is_cancelled() {
            self.events.publish(AgentEvent::GraphExecutionAborted);
            return Err(GraphError::Canceled);
        }
        self.events.publish(AgentEvent::GraphExecutionComplete);

        let mut result = Vec::new();
        let mut state = self.state.lock().await;
        for node_id in start_order.iter().chain(arrival_order.iter()) {
            if state.emitted_ids.contains(node_id) {
                continue;
            }
            if let Some(output) = outputs_by_node.get(node_id) {
                result.push(output.clone());
                state.emitted_ids.insert(node_id.clone());
            }
        }
        Ok(result)
    }

    /// Fan-out after a node completes (spec §4.5.4): groups outgoing edges by
    /// exclusive group, evaluates conditions, and spawns targets whose join
    /// gate (if any) is satisfied. Returns the count of newly spawned nodes.
    async fn fan_out(
        self: &Arc<Self>,
        node_id: &NodeId,
        output: &str,
        tx: &mpsc::UnboundedSender<GraphCommand>,
        cancel: &CancellationToken,
    ) -> usize {
        {
            let mut state = self.state.lock().await;
            let mut targets_to_notify = Vec::new();
            for (target, join) in state.join_tracker.iter_mut() {
                if join.required.contains(node_id) {
                    join.completed.insert(node_id.clone());
                    if join.completed == join.required {
                        join.ready = true;
                        targets_to_notify.push(target.clone());
                    }
                }
            }
            for target in targets_to_notify {
                self.events.publish(AgentEvent::GraphJoinNodeReady {
                    node_id: target.to_string(),
                });
            }
        }

        let outgoing: Vec<GraphEdge> = {
            let edges = self.edges.read().await;
            edges.iter().filter(|e| &e.from == node_id).cloned().collect()
        };

        let mut groups: HashMap<String, Vec<GraphEdge>> = HashMap::new();
        for edge in outgoing {
            groups.entry(edge.group_key().to_string()).or_default().push(edge);
        }

        let mut spawned = 0usize;
        for (key, mut group_edges) in groups {
            if key == "default" {
                for edge in &group_edges {
                    self.events.publish(AgentEvent::GraphEvaluatingEdges {
                        node_id: node_id.to_string(),
                    });
                    if edge.condition.evaluate(output, &self.llm_registry, &self.events, cancel).await {
                        if self.try_traverse(edge, output, tx, cancel).await {
                            spawned += 1;
                        }
                    } else {
                        self.events.publish(AgentEvent::GraphEdgeNotTraversed {
                            edge_id: edge.id.to_string(),
                        });
                    }
                }
            } else {
                group_edges.sort_by_key(|e| e.priority);
                let mut matched = false;
                for edge in &group_edges {
                    if edge.condition.evaluate(output, &self.llm_registry, &self.events, cancel).await {
                        matched = true;
                        if self.try_traverse(edge, output, tx, cancel).await {
                            spawned += 1;
                        }
                        break;
                    }
                }
                if !matched {
                    self.events.publish(AgentEvent::GraphExclusiveGroupNoMatch {
                        group: key,
                        node_id: node_id.to_string(),
                    });
                }
            }
        }
        spawned
    }

    /// Spawns `edge.to` unless it is gated by an unready join (the join
    /// tracker is keyed by target node, so this gates every edge into a join
    /// target, not only the edge marked `is_join`).
    async fn try_traverse(
        self: &Arc<Self>,
        edge: &GraphEdge,
        output: &str,
        tx: &mpsc::UnboundedSender<GraphCommand>,
        cancel: &CancellationToken,
    ) -> bool {
        {
            let mut state = self.state.lock().await;
            if let Some(join) = state.join_tracker.get(&edge.to) {
                if !join.ready {
                    self.events.publish(AgentEvent::GraphJoinNodeWaiting {
                        node_id: edge.to.to_string(),
                    });
                    return false;
                }
            }
            if let Some(join) = state.join_tracker.get_mut(&edge.to) {
                join.completed.clear();
                join.ready = false;
            }
        }

        let this = self.clone();
        let to = edge.to.clone();
        let input = output.to_string();
        let tx2 = tx.clone();
        let cancel2 = cancel.clone();
        tokio::spawn(async move { run_node(this, to, input, tx2, cancel2).await });
        self.events.publish(AgentEvent::GraphEdgeTraversed {
            edge_id: edge.id.to_string(),
            to: edge.to.to_string(),
        });
        true
    }

    pub async fn pause(&self, opts: PauseOptions) {
        let mut state = self.state.lock().await;
        state.pause_settings.before |= opts.before;
        state.pause_settings.after |= opts.after;
        state.pause_settings.between |= opts.between;
        for branch in opts.branches {
            state.paused_branches.insert(branch);
        }
        drop(state);
        self.set_agent_state(AgentState::Paused).await;
    }

    pub async fn resume(&self) {
        {
            let mut state = self.state.lock().await;
            state.pause_settings = PauseSettings::default();
            state.paused_branches.clear();
        }
        self.set_agent_state(AgentState::Running).await;
        self.resume_notify.notify_waiters();
    }

    pub async fn abort(&self) {
        if let Some(cancel) = self.run_cancel.lock().await.as_ref() {
            cancel.cancel();
        }
        self.set_agent_state(AgentState::Paused).await;
        self.events.publish(AgentEvent::GraphExecutionAborted);
    }

    /// Permitted only while paused; upserts nodes/edges by id.
    pub async fn update_graph_configuration(
        &self,
        upsert_nodes: Vec<GraphNode>,
        upsert_edges: Vec<GraphEdge>,
    ) -> Result<(), GraphError> {
        if self.agent_state().await != AgentState::Paused {
            return Err(GraphError::InvalidState("not paused"));
        }
        {
            let mut nodes = self.nodes.write().await;
            for node in upsert_nodes {
                nodes.insert(node.id.clone(), node);
            }
        }
        {
            let mut edges = self.edges.write().await;
            for edge in upsert_edges {
                if let Some(existing) = edges.iter_mut().find(|e| e.id == edge.id) {
                    *existing = edge;
                } else {
                    edges.push(edge);
                }
            }
        }
        Ok(())
    }

    /// Permitted only while not running.
    pub async fn rollback(&self, steps: usize) -> Result<(), GraphError> {
        if self.agent_state().await == AgentState::Running {
            return Err(GraphError::InvalidState("running"));
        }
        let mut state = self.state.lock().await;
        state.rollback(steps).map_err(GraphError::CheckpointRestore)?;
        drop(state);
        self.events.publish(AgentEvent::GraphExecutionRolledBack { steps: steps as u32 });
        Ok(())
    }

    pub async fn get_rollback_checkpoints(&self) -> Vec<RollbackCheckpoint> {
        self.state.lock().await.rollback_checkpoints.iter().cloned().collect()
    }

    pub async fn clear_rollback_checkpoints(&self) {
        self.state.lock().await.clear_rollback_checkpoints();
        self.events.publish(AgentEvent::RollbackCheckpointsCleared);
    }

    pub async fn get_pending_user_interactions(&self) -> HashMap<NodeId, PendingInteraction> {
        self.state.lock().await.pending_user_interactions.clone()
    }

    pub async fn get_execution_state(&self) -> ExecutionState {
        self.state.lock().await.clone()
    }

    pub async fn provide_user_input(&self, node_id: &NodeId, input: String) -> bool {
        self.reply_interaction(node_id, InteractionReply::Input(input)).await
    }

    pub async fn provide_user_approval(&self, node_id: &NodeId, approved: bool) -> bool {
        self.reply_interaction(node_id, InteractionReply::Approval(approved)).await
    }

    pub async fn provide_chat_action(&self, node_id: &NodeId, continue_chat: bool, input: Option<String>) -> bool {
        self.reply_interaction(node_id, InteractionReply::ChatAction { continue_chat, input })
            .await
    }

    async fn reply_interaction(&self, node_id: &NodeId, reply: InteractionReply) -> bool {
        if let Some(sender) = self.interaction_waiters.lock().await.remove(node_id) {
            sender.send(reply).is_ok()
        } else {
            false
        }
    }

    /// Re-hydrates pause/branch state from an external checkpoint and arms
    /// `continue_with_input` to replay only the restored node's subgraph.
    pub async fn restore_from_checkpoint(&self, conversation_id: &str, checkpoint_id: &str) -> Result<(), GraphError> {
        let checkpointer = self
            .checkpointer
            .as_ref()
            .ok_or_else(|| GraphError::CheckpointRestore("no checkpointer configured".to_string()))?;
        let payload = checkpointer
            .get(conversation_id, checkpoint_id)
            .await
            .map_err(|e| GraphError::CheckpointRestore(e.to_string()))?
            .ok_or_else(|| GraphError::CheckpointRestore("checkpoint not found".to_string()))?;

        let resume_node_id = payload
            .get("resume_node_id")
            .and_then(Value::as_str)
            .map(NodeId::from);
        let paused_branches: std::collections::HashSet<NodeId> = payload
            .get("paused_branches")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(NodeId::from).collect())
            .unwrap_or_default();

        {
            let mut state = self.state.lock().await;
            state.pause_settings = PauseSettings {
                before: true,
                ..Default::default()
            };
            state.paused_branches = paused_branches;
        }
        *self.pending_resume_node.lock().await = resume_node_id;
        self.set_agent_state(AgentState::Paused).await;
        Ok(())
    }

    /// Replays only the tail subgraph reachable from the point restored by
    /// `restore_from_checkpoint`; falls back to ordinary entry selection if
    /// no checkpoint was restored.
    pub async fn continue_with_input(self: &Arc<Self>, input: &str) -> Result<Vec<String>, GraphError> {
        let resume_node_id = self.pending_resume_node.lock().await.take();
        match resume_node_id {
            Some(node_id) => self.run_from(vec![(node_id, input.to_string())]).await,
            None => self.stream(input).await,
        }
    }

    async fn collect_context(&self, node_id: &NodeId, history: &[String]) -> Vec<Message> {
        let edges = self.edges.read().await;
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = history.iter().map(|h| Message::user(h.clone())).collect();

        for edge in edges.iter().filter(|e| &e.to == node_id && !e.context_from.is_empty()) {
            let mut fragment = String::new();
            for referenced in &edge.context_from {
                let entries = state
                    .execution_history
                    .iter()
                    .filter(|h| &h.node_id == referenced)
                    .rev()
                    .take(MAX_CONTEXT_HISTORY_ENTRIES)
                    .collect::<Vec<_>>();
                for entry in entries.into_iter().rev() {
                    fragment.push_str(&format!("[{}] {}\n", entry.node_name, entry.output));
                }
            }
            if !fragment.is_empty() {
                messages.push(Message::system(fragment));
            }
            if let Some(memory_override) = &edge.memory_override {
                messages.push(Message::system(format!("memory override: {memory_override}")));
            }
        }
        messages
    }
}

fn is_paused_for(state: &ExecutionState, node_id: &NodeId, barrier: PauseBarrier) -> bool {
    let flag = match barrier {
        PauseBarrier::Before => state.pause_settings.before,
        PauseBarrier::After => state.pause_settings.after,
        PauseBarrier::Between => state.pause_settings.between,
    };
    flag || state.paused_branches.contains(node_id)
}

async fn wait_if_paused(
    this: &Arc<GraphAgent>,
    node_id: &NodeId,
    barrier: PauseBarrier,
    cancel: &CancellationToken,
) -> Result<(), GraphError> {
    let should_wait = {
        let state = this.state.lock().await;
        is_paused_for(&state, node_id, barrier)
    };
    if !should_wait {
        return Ok(());
    }
    this.events.publish(AgentEvent::GraphNodePaused {
        node_id: node_id.to_string(),
    });
    loop {
        tokio::select! {
            _ = this.resume_notify.notified() => {
                let still_paused = {
                    let state = this.state.lock().await;
                    is_paused_for(&state, node_id, barrier)
                };
                if !still_paused {
                    return Ok(());
                }
            }
            _ = cancel.cancelled() => return Err(GraphError::Canceled),
        }
    }
}

async fn await_interaction(
    this: &Arc<GraphAgent>,
    node_id: &NodeId,
    kind: InteractionKind,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<InteractionReply> {
    let (reply_tx, reply_rx) = oneshot::channel();
    {
        let mut state = this.state.lock().await;
        state
            .pending_user_interactions
            .insert(node_id.clone(), PendingInteraction { kind, since: Utc::now() });
    }
    this.interaction_waiters.lock().await.insert(node_id.clone(), reply_tx);

    let result = tokio::select! {
        reply = reply_rx => reply.ok(),
        _ = tokio::time::sleep(timeout) => None,
        _ = cancel.cancelled() => None,
    };

    this.state.lock().await.pending_user_interactions.remove(node_id);
    this.interaction_waiters.lock().await.remove(node_id);
    result
}

/// Runs one node to completion: checkpoint, pause barriers, ReAct invocation
/// per its user-interaction mode, optional approval gate, then reports back
/// over `tx`. Never panics the run loop — failures become `NodeFailed`.
async fn run_node(
    this: Arc<GraphAgent>,
    node_id: NodeId,
    input: String,
    tx: mpsc::UnboundedSender<GraphCommand>,
    cancel: CancellationToken,
) {
    let node = match this.nodes.read().await.get(&node_id).cloned() {
        Some(n) => n,
        None => {
            let _ = tx.send(GraphCommand::NodeFailed {
                node_id,
                message: "node not found".to_string(),
            });
            return;
        }
    };

    let started_at = Utc::now();
    {
        let mut state = this.state.lock().await;
        state.push_checkpoint(node_id.clone(), node.name.clone());
        state.current_nodes.insert(
            node_id.clone(),
            NodeExecutionContext {
                node_id: node_id.clone(),
                status: NodeStatus::Running,
                input: input.clone(),
                output: None,
                started_at,
            },
        );
    }
    this.events.publish(AgentEvent::RollbackCheckpointCreated {
        node_id: node_id.to_string(),
    });
    this.events.publish(AgentEvent::GraphNodeExecutionStart {
        node_id: node_id.to_string(),
    });

    if let Err(e) = wait_if_paused(&this, &node_id, PauseBarrier::Before, &cancel).await {
        let _ = tx.send(GraphCommand::NodeFailed {
            node_id,
            message: e.to_string(),
        });
        return;
    }

    match run_node_body(&this, &node, &input, &cancel).await {
        Ok(output) => {
            if let Err(e) = wait_if_paused(&this, &node_id, PauseBarrier::After, &cancel).await {
                let _ = tx.send(GraphCommand::NodeFailed {
                    node_id,
                    message: e.to_string(),
                });
                return;
            }
            let duration_ms = (Utc::now() - started_at).num_milliseconds();
            let finished = NodeExecutionContext {
                node_id: node_id.clone(),
                status: NodeStatus::Completed,
                input: input.clone(),
                output: Some(output.clone()),
                started_at,
            };
            {
                let mut state = this.state.lock().await;
                state.current_nodes.remove(&node_id);
                state.completed_queue.push(finished.clone());
                state.execution_history.push(HistoryEntry {
                    node_id: node_id.clone(),
                    node_name: node.name.clone(),
                    input,
                    output,
                    started_at,
                    duration_ms,
                });
            }
            this.events.publish(AgentEvent::GraphNodeExecutionComplete {
                node_id: node_id.to_string(),
                duration_ms,
            });
            let _ = tx.send(GraphCommand::NodeCompleted(finished));
        }
        Err(e) => {
            let mut state = this.state.lock().await;
            if let Some(ctx) = state.current_nodes.get_mut(&node_id) {
                ctx.status = NodeStatus::Failed;
            }
            drop(state);
            this.events.publish(AgentEvent::GraphNodeExecutionError {
                node_id: node_id.to_string(),
                message: e.to_string(),
            });
            let _ = tx.send(GraphCommand::NodeFailed {
                node_id,
                message: e.to_string(),
            });
        }
    }
}

async fn run_node_body(
    this: &Arc<GraphAgent>,
    node: &GraphNode,
    input: &str,
    cancel: &CancellationToken,
) -> Result<String, GraphError> {
    let llm = this
        .llm_registry
        .get(&node.llm.provider_name)
        .cloned()
        .ok_or_else(|| GraphError::NodeExecution {
            node_id: node.id.to_string(),
            message: format!("no LLM registered for provider '{}'", node.llm.provider_name),
        })?;

    let context = this.collect_context(&node.id, &[]).await;
    let react_agent = ReactAgent::new(llm, this.toolkit.clone(), node.react_config.clone())
        .with_events(this.events.clone());
    let interaction = node.user_interaction.clone().unwrap_or_default();

    let mut output = match interaction.mode {
        UserInteractionMode::SingleReactCycle => {
            run_single_react_cycle(this, &node.id, &react_agent, input, &context, cancel, &interaction).await?
        }
        UserInteractionMode::ContinuousChat => {
            run_continuous_chat(this, &node.id, &react_agent, input, &context, cancel).await?
        }
    };

    if interaction.require_approval {
        output = require_approval(this, &node.id, output, cancel).await?;
    }

    Ok(output)
}

async fn run_single_react_cycle(
    this: &Arc<GraphAgent>,
    node_id: &NodeId,
    react_agent: &ReactAgent,
    input: &str,
    context: &[Message],
    cancel: &CancellationToken,
    interaction: &UserInteraction,
) -> Result<String, GraphError> {
    let outcome = react_agent
        .invoke(input, context, cancel)
        .await
        .map_err(|e| GraphError::NodeExecution {
            node_id: node_id.to_string(),
            message: e.to_string(),
        })?;
    let mut answer = outcome.final_answer;

    if let Some(threshold) = interaction.confidence_threshold {
        let confidence = estimate_confidence(&answer);
        if confidence < threshold {
            this.events.publish(AgentEvent::GraphNodeLowConfidence {
                node_id: node_id.to_string(),
                confidence,
            });
            this.events.publish(AgentEvent::GraphNodeAwaitingInput {
                node_id: node_id.to_string(),
            });
            match await_interaction(this, node_id, InteractionKind::Input, USER_INPUT_TIMEOUT, cancel).await {
                Some(InteractionReply::Input(text)) if text.eq_ignore_ascii_case("accept") => {}
                Some(InteractionReply::Input(text)) if text.eq_ignore_ascii_case("retry") => {
                    let retried = react_agent
                        .invoke(&format!("{input}\n\n(please try again)"), context, cancel)
                        .await
                        .map_err(|e| GraphError::NodeExecution {
                            node_id: node_id.to_string(),
                            message: e.to_string(),
                        })?;
                    answer = retried.final_answer;
                }
                Some(InteractionReply::Input(text)) if interaction.allow_user_prompting => {
                    let retried = react_agent
                        .invoke(&format!("{input}\n\nUser guidance: {text}"), context, cancel)
                        .await
                        .map_err(|e| GraphError::NodeExecution {
                            node_id: node_id.to_string(),
                            message: e.to_string(),
                        })?;
                    answer = retried.final_answer;
                }
                // Timeout or any other reply shape: accept the current output.
                _ => {}
            }
        }
    }

    Ok(answer)
}

async fn run_continuous_chat(
    this: &Arc<GraphAgent>,
    node_id: &NodeId,
    react_agent: &ReactAgent,
    input: &str,
    context: &[Message],
    cancel: &CancellationToken,
) -> Result<String, GraphError> {
    let mut conversation: Vec<Message> = context.to_vec();
    let mut turn_input = input.to_string();
    let mut last_output = String::new();

    loop {
        let outcome = react_agent
            .invoke(&turn_input, &conversation, cancel)
            .await
            .map_err(|e| GraphError::NodeExecution {
                node_id: node_id.to_string(),
                message: e.to_string(),
            })?;
        last_output = outcome.final_answer;
        conversation.push(Message::assistant(last_output.clone()));

        this.events.publish(AgentEvent::GraphNodeChatWaiting {
            node_id: node_id.to_string(),
        });
        match await_interaction(this, node_id, InteractionKind::Chat, CHAT_TIMEOUT, cancel).await {
            Some(InteractionReply::ChatAction {
                continue_chat: true,
                input: next_input,
            }) => {
                turn_input = next_input.unwrap_or_default();
                conversation.push(Message::user(turn_input.clone()));
            }
            // Explicit end, timeout, or any other reply: the chat is over.
            _ => break,
        }
    }

    Ok(last_output)
}

async fn require_approval(
    this: &Arc<GraphAgent>,
    node_id: &NodeId,
    output: String,
    cancel: &CancellationToken,
) -> Result<String, GraphError> {
    this.events.publish(AgentEvent::GraphNodeAwaitingApproval {
        node_id: node_id.to_string(),
    });
    match await_interaction(this, node_id, InteractionKind::Approval, APPROVAL_TIMEOUT, cancel).await {
        Some(InteractionReply::Approval(true)) => Ok(output),
        _ => Err(GraphError::NodeExecution {
            node_id: node_id.to_string(),
            message: "rejected by approval".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_agent::condition::Condition;
    use crate::llm::MockLlmClient;

    fn mock_llm(response: &str) -> Arc<dyn LlmClient> {
        Arc::new(MockLlmClient::new(vec![response.to_string()]))
    }

    fn registry_with_mock(response: &str) -> HashMap<String, Arc<dyn LlmClient>> {
        let mut registry: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
        registry.insert("mock".to_string(), mock_llm(response));
        registry
    }

    fn keyword_edge(id: &str, from: &str, to: &str, keyword: &str) -> GraphEdge {
        GraphEdge::new(
            id,
            from,
            to,
            Condition::Keyword {
                keyword: keyword.to_string(),
            },
        )
    }

    /// S4 — command-prefixed input routes only to the matching node; plain
    /// input routes only to `_newmessage` nodes.
    #[tokio::test]
    async fn command_prefixed_input_routes_to_matching_node_only() {
        let n1 = GraphNode::new("n1", "N1", LlmRef::new("mock", "mock")).with_command("/greet");
        let n2 = GraphNode::new("n2", "N2", LlmRef::new("mock", "mock"))
            .with_command(GraphNode::NEW_MESSAGE_COMMAND);
        let agent = GraphAgent::new(
            vec![n1, n2],
            vec![],
            registry_with_mock("Thought: ok\nFinal Answer: done"),
            Arc::new(Toolkit::new()),
            Arc::new(EventBus::new()),
        )
        .unwrap();

        let (entry, processed) = agent.select_entry("/greet world").await.unwrap();
        assert_eq!(entry, vec![NodeId::from("n1")]);
        assert_eq!(processed, "world");

        let (entry, processed) = agent.select_entry("world").await.unwrap();
        assert_eq!(entry, vec![NodeId::from("n2")]);
        assert_eq!(processed, "world");
    }

    /// S5 — within an exclusive group, only the lowest-priority matching
    /// edge traverses.
    #[tokio::test]
    async fn exclusive_group_picks_lowest_priority_match() {
        let n1 = GraphNode::new("n1", "N1", LlmRef::new("mock", "mock")).with_command("/start");
        let n2 = GraphNode::new("n2", "N2", LlmRef::new("mock", "mock"));
        let n3 = GraphNode::new("n3", "N3", LlmRef::new("mock", "mock"));
        let e1 = keyword_edge("e1", "n1", "n2", "yes").with_exclusive_group("G", 1);
        let e2 = keyword_edge("e2", "n1", "n3", "yes").with_exclusive_group("G", 0);

        let agent = Arc::new(
            GraphAgent::new(
                vec![n1, n2, n3],
                vec![e1, e2],
                registry_with_mock("Thought: ok\nFinal Answer: yes please"),
                Arc::new(Toolkit::new()),
                Arc::new(EventBus::new()),
            )
            .unwrap(),
        );

        agent.stream("/start go").await.unwrap();
        let state = agent.get_execution_state().await;
        let visited: Vec<String> = state
            .execution_history
            .iter()
            .map(|h| h.node_id.to_string())
            .collect();
        assert!(visited.contains(&"n1".to_string()));
        assert!(visited.contains(&"n3".to_string()));
        assert!(!visited.contains(&"n2".to_string()));
    }

    /// S6 — a join target dispatches exactly once, only after every
    /// predecessor it names has completed.
    #[tokio::test]
    async fn join_node_fires_exactly_once_after_both_predecessors_complete() {
        let a = GraphNode::new("a", "A", LlmRef::new("mock", "mock"))
            .with_command(GraphNode::NEW_MESSAGE_COMMAND);
        let b = GraphNode::new("b", "B", LlmRef::new("mock", "mock"))
            .with_command(GraphNode::NEW_MESSAGE_COMMAND);
        let c = GraphNode::new("c", "C", LlmRef::new("mock", "mock"));
        let edge_a = keyword_edge("eA", "a", "c", "");
        let edge_b = keyword_edge("eB", "b", "c", "").as_join(vec![NodeId::from("a"), NodeId::from("b")]);

        let agent = Arc::new(
            GraphAgent::new(
                vec![a, b, c],
                vec![edge_a, edge_b],
                registry_with_mock("Thought: ok\nFinal Answer: done"),
                Arc::new(Toolkit::new()),
                Arc::new(EventBus::new()),
            )
            .unwrap(),
        );

        agent.stream("hello").await.unwrap();
        let state = agent.get_execution_state().await;
        let c_count = state
            .execution_history
            .iter()
            .filter(|h| h.node_id.as_str() == "c")
            .count();
        assert_eq!(c_count, 1);
    }

    /// S7 — rollback(2) restores history to exactly the state before the
    /// second-most-recent node execution.
    #[tokio::test]
    async fn rollback_restores_to_earlier_checkpoint() {
        let a = GraphNode::new("a", "A", LlmRef::new("mock", "mock"))
            .with_command(GraphNode::NEW_MESSAGE_COMMAND);
        let b = GraphNode::new("b", "B", LlmRef::new("mock", "mock"));
        let c = GraphNode::new("c", "C", LlmRef::new("mock", "mock"));
        let edge_ab = keyword_edge("e1", "a", "b", "");
        let edge_bc = keyword_edge("e2", "b", "c", "");

        let agent = Arc::new(
            GraphAgent::new(
                vec![a, b, c],
                vec![edge_ab, edge_bc],
                registry_with_mock("Thought: ok\nFinal Answer: done"),
                Arc::new(Toolkit::new()),
                Arc::new(EventBus::new()),
            )
            .unwrap(),
        );

        agent.stream("hi").await.unwrap();
        assert_eq!(agent.get_rollback_checkpoints().await.len(), 3);

        agent.rollback(2).await.unwrap();
        let state = agent.get_execution_state().await;
        assert_eq!(state.execution_history.len(), 1);
        assert_eq!(state.execution_history[0].node_id.as_str(), "a");
        assert_eq!(agent.get_rollback_checkpoints().await.len(), 1);
    }
}
