//! Routing signal returned by a node's `run`.

/// What a `StateGraph` should do after a node finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Follow the linear edge (or let conditional routing decide).
    Continue,
    /// Jump directly to the named node, bypassing edges.
    Node(String),
    /// Stop the graph.
    End,
}
