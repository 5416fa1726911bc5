//! Approval callback contract.

use std::sync::Arc;

use serde_json::Value;

use crate::tool::ToolCall;

/// Outcome of an approval request: accept as-is, accept with rewritten args,
/// or reject (fatal for that call).
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub modified_args: Option<Value>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            modified_args: None,
        }
    }

    pub fn approve_with_args(args: Value) -> Self {
        Self {
            approved: true,
            modified_args: Some(args),
        }
    }

    pub fn reject() -> Self {
        Self {
            approved: false,
            modified_args: None,
        }
    }
}

/// `(call, failureCount) -> decision`. Called before every attempt once
/// `pauseBeforeUse`/pause-threshold conditions trigger it.
pub type ApprovalCallback = Arc<dyn Fn(&ToolCall, u32) -> ApprovalDecision + Send + Sync>;

/// Default callback: always approves, matching a toolkit with no approval
/// policy configured.
pub fn always_approve() -> ApprovalCallback {
    Arc::new(|_, _| ApprovalDecision::approve())
}
