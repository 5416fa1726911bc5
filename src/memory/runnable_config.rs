//! Per-run configuration threaded through `invoke`/`stream`.

/// Ambient run config: thread/user identity plus resume hints.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    pub checkpoint_ns: Option<String>,
    pub resume_from_node_id: Option<String>,
}
