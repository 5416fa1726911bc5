//! Single-agent reason-act loop.

mod config;
mod error;
mod parse;

pub use config::{CotConfig, SelfConsistencyConfig, DEFAULT_PROMPT_TEMPLATE};
pub use error::ReactError;
pub use parse::{parse_step, ParsedStep};

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{AgentEvent, EventBus};
use crate::llm::{LlmCallOptions, LlmClient};
use crate::message::Message;
use crate::tool::ToolCall;
use crate::toolkit::Toolkit;

/// Final outcome of a `ReactAgent::invoke` call.
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    pub final_answer: String,
    pub steps_taken: u32,
    pub max_steps_exceeded: bool,
}

/// Reason-act loop bound to one LLM and one Toolkit.
pub struct ReactAgent {
    llm: Arc<dyn LlmClient>,
    toolkit: Arc<Toolkit>,
    config: CotConfig,
    events: Option<Arc<EventBus>>,
}

impl ReactAgent {
    pub fn new(llm: Arc<dyn LlmClient>, toolkit: Arc<Toolkit>, config: CotConfig) -> Self {
        Self {
            llm,
            toolkit,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Runs the loop; if self-consistency is enabled, runs `samples`
    /// independent rollouts and returns the majority answer.
    pub async fn invoke(
        &self,
        input: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ReactOutcome, ReactError> {
        if !self.config.self_consistency.enabled || self.config.self_consistency.samples <= 1 {
            return self.invoke_once(input, history, cancel).await;
        }

        let mut outcomes = Vec::new();
        for _ in 0..self.config.self_consistency.samples {
            outcomes.push(self.invoke_once(input, history, cancel).await?);
        }
        Ok(majority_vote(outcomes))
    }

    async fn invoke_once(
        &self,
        input: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<ReactOutcome, ReactError> {
        let history_text = history
            .iter()
            .map(|m| m.content().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let mut scratchpad = String::new();

        for step in 1..=self.config.max_steps {
            if cancel.is_cancelled() {
                return Err(ReactError::Canceled);
            }

            let prompt = self
                .config
                .prompt_template
                .replace("{history}", &history_text)
                .replace("{input}", input)
                .replace("{scratchpad}", &scratchpad);

            self.emit(AgentEvent::LlmInvocationStart {
                step,
                prompt_len: prompt.len(),
            });
            let response = self
                .llm
                .chat(
                    &[Message::user(prompt)],
                    &LlmCallOptions::default(),
                    cancel,
                )
                .await
                .map_err(|e| ReactError::Unknown(e.to_string()))?;
            self.emit(AgentEvent::LlmInvocationComplete { step });

            if let Some(stop) = self
                .config
                .stop_sequences
                .iter()
                .find(|s| response.content.contains(s.as_str()))
            {
                let partial = response.content.split(stop.as_str()).next().unwrap_or("");
                return Ok(ReactOutcome {
                    final_answer: partial.trim().to_string(),
                    steps_taken: step,
                    max_steps_exceeded: false,
                });
            }

            let parsed = parse::parse_step(&response.content);
            let parsed = match parsed {
                Ok(p) => p,
                Err(e) => {
                    warn!(step, "react-parsing-error: {e}");
                    return Err(e);
                }
            };

            match parsed {
                ParsedStep::FinalAnswer { answer, .. } => {
                    return Ok(ReactOutcome {
                        final_answer: answer,
                        steps_taken: step,
                        max_steps_exceeded: false,
                    });
                }
                ParsedStep::Action {
                    thought,
                    action,
                    action_input,
                } => {
                    let observation = self.dispatch_action(&action, action_input).await;
                    scratchpad.push_str(&format!(
                        "\nThought: {thought}\nAction: {action}\nObservation: {observation}\n"
                    ));
                    debug!(step, action = %action, "react step observed");
                }
            }
        }

        Ok(ReactOutcome {
            final_answer: scratchpad.trim().to_string(),
            steps_taken: self.config.max_steps,
            max_steps_exceeded: true,
        })
    }

    /// Tool errors become observations; they never terminate the loop.
    async fn dispatch_action(&self, action: &str, action_input: serde_json::Value) -> String {
        if !self.toolkit.is_registered(action) {
            return format!("error: unknown tool '{action}'");
        }
        let call = ToolCall {
            name: action.to_string(),
            args: action_input,
        };
        match self.toolkit.execute_calls(vec![call]).await {
            Ok(outcomes) => match outcomes.into_iter().next() {
                Some(crate::tool::ToolOutcome::Success { output, .. }) => output.to_string(),
                Some(crate::tool::ToolOutcome::Failure { error, .. }) => {
                    format!("error: {}", error.message)
                }
                None => "error: tool produced no result".to_string(),
            },
            Err(e) => format!("error: {e}"),
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Token-chunk-free streaming: since `LlmClient` here is non-streaming,
    /// each element is one step's thought/action/observation (or the final
    /// answer), not a per-token chunk.
    pub async fn stream(
        &self,
        input: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ReactError> {
        let outcome = self.invoke_once(input, history, cancel).await?;
        Ok(vec![outcome.final_answer])
    }
}

fn majority_vote(outcomes: Vec<ReactOutcome>) -> ReactOutcome {
    let mut tally: HashMap<String, u32> = HashMap::new();
    for outcome in &outcomes {
        let key = outcome.final_answer.trim().to_lowercase();
        *tally.entry(key).or_insert(0) += 1;
    }
    let winner_key = tally
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(key, _)| key)
        .unwrap_or_default();
    outcomes
        .into_iter()
        .find(|o| o.final_answer.trim().to_lowercase() == winner_key)
        .expect("outcomes is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn stops_on_final_answer() {
        let llm = Arc::new(MockLlmClient::new(vec![
            "Thought: done\nFinal Answer: 42".to_string(),
        ]));
        let toolkit = Arc::new(Toolkit::new());
        let agent = ReactAgent::new(llm, toolkit, CotConfig::default());
        let outcome = agent
            .invoke("what is the answer?", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.final_answer, "42");
        assert_eq!(outcome.steps_taken, 1);
        assert!(!outcome.max_steps_exceeded);
    }

    #[tokio::test]
    async fn exhausts_max_steps_without_final_answer() {
        let llm = Arc::new(MockLlmClient::new(vec![
            "Thought: thinking\nAction: nope\nAction Input: {}".to_string(),
        ]));
        let toolkit = Arc::new(Toolkit::new());
        let mut config = CotConfig::default();
        config.max_steps = 2;
        let agent = ReactAgent::new(llm, toolkit, config);
        let outcome = agent
            .invoke("loop forever", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.max_steps_exceeded);
        assert_eq!(outcome.steps_taken, 2);
    }
}
