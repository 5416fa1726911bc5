//! Edge traversal conditions: a cheap keyword test or an LLM analysis call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::events::{AgentEvent, EventBus};
use crate::graph_agent::node::LlmRef;
use crate::llm::{LlmCallOptions, LlmClient};
use crate::message::Message;

#[derive(Debug, Clone)]
pub enum Condition {
    Keyword { keyword: String },
    Analysis { prompt: String, analysis_provider: LlmRef },
}

const POSITIVE_MARKERS: &[&str] = &["yes", "true", "satisfied"];

impl Condition {
    /// Evaluates this condition against an upstream node's output.
    /// `Analysis` LLM errors evaluate to `false` and emit an error event
    /// rather than aborting the fan-out.
    pub async fn evaluate(
        &self,
        output: &str,
        llm_registry: &HashMap<String, Arc<dyn LlmClient>>,
        events: &EventBus,
        cancel: &CancellationToken,
    ) -> bool {
        match self {
            Condition::Keyword { keyword } => {
                output.to_lowercase().contains(&keyword.to_lowercase())
            }
            Condition::Analysis {
                prompt,
                analysis_provider,
            } => {
                let Some(llm) = llm_registry.get(&analysis_provider.provider_name) else {
                    events.publish(AgentEvent::GraphExecutionError {
                        message: format!(
                            "no LLM registered for analysis provider '{}'",
                            analysis_provider.provider_name
                        ),
                    });
                    return false;
                };
                let analysis_prompt = format!("{prompt}\n\nText to analyze: {output}");
                match llm
                    .chat(
                        &[Message::user(analysis_prompt)],
                        &LlmCallOptions::default(),
                        cancel,
                    )
                    .await
                {
                    Ok(response) => {
                        let lower = response.content.to_lowercase();
                        POSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
                    }
                    Err(e) => {
                        events.publish(AgentEvent::GraphExecutionError {
                            message: format!("edge analysis failed: {e}"),
                        });
                        false
                    }
                }
            }
        }
    }

    /// Short human-readable label used by visualization output.
    pub fn describe(&self) -> String {
        match self {
            Condition::Keyword { keyword } => format!("keyword:{keyword}"),
            Condition::Analysis { analysis_provider, .. } => {
                format!("analysis:{}", analysis_provider.provider_name)
            }
        }
    }
}
