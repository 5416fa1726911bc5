//! State graph substrate: nodes, routing, compile, invoke.

mod compile_error;
mod conditional;
mod next;
mod node;
mod state_graph;

pub use compile_error::CompilationError;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use next::Next;
pub use node::Node;
pub use state_graph::{CompiledStateGraph, StateGraph, END, START};
