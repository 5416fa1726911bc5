//! Chat messages exchanged between caller, LLM, and tools.

use serde::{Deserialize, Serialize};

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
    /// Observation fed back into the loop after a tool call.
    Tool { tool_name: String, content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(content.into())
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    /// Text content regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Message::System(s) | Message::User(s) | Message::Assistant(s) => s,
            Message::Tool { content, .. } => content,
        }
    }
}
