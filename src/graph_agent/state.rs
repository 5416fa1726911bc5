//! Execution state owned by one `GraphAgent` instance: exactly the fields
//! mutated by node execution, fan-out, pause/resume, and rollback.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::ids::{EdgeId, NodeId};

/// Rollback checkpoints are a bounded ring; the oldest is evicted first.
pub const ROLLBACK_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    AwaitingInput,
    AwaitingApproval,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct NodeExecutionContext {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub input: String,
    pub output: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub node_id: NodeId,
    pub node_name: String,
    pub input: String,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct JoinState {
    pub required: HashSet<NodeId>,
    pub completed: HashSet<NodeId>,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PauseSettings {
    pub before: bool,
    pub after: bool,
    pub between: bool,
    pub auto_checkpoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Approval,
    Input,
    Chat,
}

#[derive(Debug, Clone)]
pub struct PendingInteraction {
    pub kind: InteractionKind,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RollbackCheckpoint {
    pub node_id: NodeId,
    pub node_name: String,
    pub at: DateTime<Utc>,
    pub execution_history_snapshot: Vec<HistoryEntry>,
    pub current_nodes_snapshot: HashMap<NodeId, NodeExecutionContext>,
    pub join_tracker_snapshot: HashMap<NodeId, JoinState>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    pub current_nodes: HashMap<NodeId, NodeExecutionContext>,
    pub completed_queue: Vec<NodeExecutionContext>,
    pub emitted_ids: HashSet<NodeId>,
    pub execution_history: Vec<HistoryEntry>,
    pub join_tracker: HashMap<NodeId, JoinState>,
    pub exclusive_edge_groups: HashMap<String, HashSet<EdgeId>>,
    pub paused_branches: HashSet<NodeId>,
    pub pause_settings: PauseSettings,
    pub pending_user_interactions: HashMap<NodeId, PendingInteraction>,
    pub rollback_checkpoints: VecDeque<RollbackCheckpoint>,
}

impl ExecutionState {
    pub fn push_checkpoint(&mut self, node_id: NodeId, node_name: String) {
        if self.rollback_checkpoints.len() >= ROLLBACK_CAP {
            self.rollback_checkpoints.pop_front();
        }
        self.rollback_checkpoints.push_back(RollbackCheckpoint {
            node_id,
            node_name,
            at: Utc::now(),
            execution_history_snapshot: self.execution_history.clone(),
            current_nodes_snapshot: self.current_nodes.clone(),
            join_tracker_snapshot: self.join_tracker.clone(),
        });
    }

    /// Restores state to the checkpoint taken `steps` completions before the
    /// current tail, and truncates the checkpoint ring accordingly.
    pub fn rollback(&mut self, steps: usize) -> Result<(), String> {
        if steps == 0 || steps > self.rollback_checkpoints.len() {
            return Err(format!(
                "cannot roll back {steps} step(s): only {} checkpoint(s) available",
                self.rollback_checkpoints.len()
            ));
        }
        let target_index = self.rollback_checkpoints.len() - steps;
        let checkpoint = self.rollback_checkpoints[target_index].clone();
        self.execution_history = checkpoint.execution_history_snapshot;
        self.current_nodes = checkpoint.current_nodes_snapshot;
        self.join_tracker = checkpoint.join_tracker_snapshot;
        self.rollback_checkpoints.truncate(target_index);
        Ok(())
    }

    pub fn clear_rollback_checkpoints(&mut self) {
        self.rollback_checkpoints.clear();
    }
}
