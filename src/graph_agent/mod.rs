//! Graph Agent execution core (C5) and its structural validator (C6): a
//! concurrent, pausable, checkpointable state machine that routes input
//! through a directed graph of ReAct-capable nodes.

mod command;
mod condition;
mod edge;
mod engine;
mod error;
mod node;
mod state;
mod user_interaction;
pub mod validator;
pub mod visualization;

pub use command::InteractionReply;
pub use condition::Condition;
pub use edge::GraphEdge;
pub use engine::{AgentState, GraphAgent, PauseOptions};
pub use error::GraphError;
pub use node::{GraphNode, LlmRef};
pub use state::{
    ExecutionState, HistoryEntry, InteractionKind, JoinState, NodeExecutionContext, NodeStatus,
    PauseSettings, PendingInteraction, RollbackCheckpoint, ROLLBACK_CAP,
};
pub use user_interaction::{estimate_confidence, UserInteraction, UserInteractionMode};
pub use validator::ValidationReport;
pub use visualization::{generate_dot, generate_text};
