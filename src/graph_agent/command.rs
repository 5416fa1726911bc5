//! Messages a spawned node task reports back to the owning run loop. The run
//! loop is the sole mutator of `ExecutionState` once a run starts, reached
//! only through this channel — no node task touches shared state directly
//! after it finishes running.

use crate::graph_agent::state::NodeExecutionContext;
use crate::ids::NodeId;

#[derive(Debug)]
pub enum GraphCommand {
    NodeCompleted(NodeExecutionContext),
    NodeFailed { node_id: NodeId, message: String },
}

/// A reply delivered to a node task blocked on a pending user interaction.
#[derive(Debug, Clone)]
pub enum InteractionReply {
    Input(String),
    Approval(bool),
    ChatAction {
        continue_chat: bool,
        input: Option<String>,
    },
}
