//! Chain-of-thought tuning for a ReAct agent.

/// `cot.*` tunables. `max_steps` is the single source of truth for the loop
/// bound — the source's separate `user-interaction.maxCoTSteps` is not
/// carried (see DESIGN.md's Open Question decisions).
#[derive(Debug, Clone)]
pub struct CotConfig {
    pub max_steps: u32,
    pub prompt_template: String,
    pub self_consistency: SelfConsistencyConfig,
    pub stop_sequences: Vec<String>,
}

impl Default for CotConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            self_consistency: SelfConsistencyConfig::default(),
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelfConsistencyConfig {
    pub enabled: bool,
    pub samples: u32,
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = "{history}\n\nUser: {input}\n\n{scratchpad}";
