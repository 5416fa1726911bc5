//! LLM provider contract — out of scope as a concrete
//! implementation; only the trait and a deterministic mock live here.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

#[derive(Debug, Clone, Default)]
pub struct LlmCallOptions {
    pub provider_name: Option<String>,
    pub model_id: Option<String>,
    pub token_limit: Option<u32>,
}

/// `chat(messages, opts) -> response`; MUST observe cancellation between
/// awaits. Streaming providers additionally implement `chat_stream`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        opts: &LlmCallOptions,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LlmError>;
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum LlmError {
    #[error("llm call canceled")]
    Canceled,
    #[error("llm provider error: {0}")]
    Provider(String),
}

/// Deterministic test double: returns scripted responses in order, then
/// repeats the last one. Used by ReAct/GraphAgent tests in place of a real
/// provider.
pub struct MockLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        _messages: &[Message],
        _opts: &LlmCallOptions,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Canceled);
        }
        let mut responses = self.responses.lock().unwrap();
        let content = if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap_or_default()
        };
        Ok(LlmResponse {
            content,
            usage: None,
        })
    }
}
