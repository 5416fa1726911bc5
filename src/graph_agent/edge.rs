//! Directed connector between two nodes, carrying a traversal condition.

use serde_json::Value;

use crate::graph_agent::condition::Condition;
use crate::ids::{EdgeId, NodeId};

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub condition: Condition,
    /// Visible only to `to` for the duration of this traversal's node run.
    pub memory_override: Option<Value>,
    /// NodeIds whose recent history should be folded into `to`'s context.
    pub context_from: Vec<NodeId>,
    pub exclusive_group: Option<String>,
    pub priority: i32,
    pub is_join: bool,
    pub join_predecessors: Vec<NodeId>,
}

impl GraphEdge {
    pub fn new(id: impl Into<EdgeId>, from: impl Into<NodeId>, to: impl Into<NodeId>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            condition,
            memory_override: None,
            context_from: Vec::new(),
            exclusive_group: None,
            priority: 0,
            is_join: false,
            join_predecessors: Vec::new(),
        }
    }

    pub fn with_exclusive_group(mut self, group: impl Into<String>, priority: i32) -> Self {
        self.exclusive_group = Some(group.into());
        self.priority = priority;
        self
    }

    pub fn as_join(mut self, predecessors: Vec<NodeId>) -> Self {
        self.is_join = true;
        self.join_predecessors = predecessors;
        self
    }

    pub fn with_context_from(mut self, nodes: Vec<NodeId>) -> Self {
        self.context_from = nodes;
        self
    }

    /// Group key used by fan-out grouping: edges without an explicit group
    /// share the implicit "default" group.
    pub fn group_key(&self) -> &str {
        self.exclusive_group.as_deref().unwrap_or("default")
    }
}
