//! Execution core for graph and ReAct LLM agents: a toolkit (registry +
//! dispatcher for typed tools), a single-loop ReAct agent, and a concurrent,
//! pausable, checkpointable graph agent that routes input through a
//! directed graph of ReAct-capable nodes.
//!
//! LLM providers, embeddings, conversation storage, and the HTTP/CLI
//! surface are external collaborators; this crate only defines the traits
//! they must satisfy (see [`llm`] and [`memory`]).

pub mod error;
pub mod events;
pub mod factory;
pub mod graph;
pub mod graph_agent;
pub mod ids;
pub mod llm;
pub mod memory;
pub mod message;
pub mod react;
pub mod retry;
pub mod tool;
pub mod toolkit;

pub use error::AgentError;
pub use events::{AgentEvent, EventBus};
pub use ids::{AgentId, ConversationId, EdgeId, NodeId, ToolId, UserId};
pub use message::Message;
pub use react::{CotConfig, ReactAgent, ReactOutcome};
pub use retry::RetryPolicy;
pub use tool::{Tool, ToolCall, ToolOutcome, ToolSpec};
pub use toolkit::Toolkit;

pub use graph_agent::{GraphAgent, GraphEdge, GraphNode};
