//! Node record: a ReAct-capable vertex in a graph, bound to one LLM.

use crate::ids::NodeId;
use crate::react::CotConfig;
use crate::graph_agent::user_interaction::UserInteraction;

/// Picks which registered LLM client a node (or an analysis condition) calls.
#[derive(Debug, Clone)]
pub struct LlmRef {
    pub provider_name: String,
    pub model_id: String,
    pub token_limit: Option<u32>,
}

impl LlmRef {
    pub fn new(provider_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model_id: model_id.into(),
            token_limit: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    /// Matches a leading `/command` token in input during entry selection.
    pub command: Option<String>,
    pub name: String,
    pub description: String,
    pub llm: LlmRef,
    pub react_config: CotConfig,
    pub user_interaction: Option<UserInteraction>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, llm: LlmRef) -> Self {
        Self {
            id: id.into(),
            command: None,
            name: name.into(),
            description: String::new(),
            llm,
            react_config: CotConfig::default(),
            user_interaction: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_react_config(mut self, config: CotConfig) -> Self {
        self.react_config = config;
        self
    }

    pub fn with_user_interaction(mut self, interaction: UserInteraction) -> Self {
        self.user_interaction = Some(interaction);
        self
    }

    /// Reserved command used for entry selection when input carries no
    /// explicit `/command` prefix.
    pub const NEW_MESSAGE_COMMAND: &'static str = "_newmessage";
}
