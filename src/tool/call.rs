//! Tool call/result envelope.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A single tool invocation requested by an agent.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

/// Structured error carried by a [`ToolOutcome::Failure`].
#[derive(Debug, Clone)]
pub struct ToolCallError {
    pub name: String,
    pub message: String,
    pub guidance: Option<String>,
    pub retryable: bool,
}

/// Timed success/failure envelope returned by the Tool base.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Success {
        call: ToolCall,
        output: Value,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_ms: i64,
        attempts: u32,
    },
    Failure {
        call: ToolCall,
        error: ToolCallError,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_ms: i64,
        attempts: u32,
    },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    pub fn call(&self) -> &ToolCall {
        match self {
            ToolOutcome::Success { call, .. } | ToolOutcome::Failure { call, .. } => call,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ToolOutcome::Success { attempts, .. } | ToolOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }
}
