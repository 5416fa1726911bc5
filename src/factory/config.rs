//! Serializable node/edge configuration a caller assembles (from a DB row,
//! an admin API body, or a static file) and hands to [`build_graph_agent`](super::build_graph_agent).
//!
//! Mirrors the `Node`/`Edge`/`Condition` wire shape closely enough to
//! deserialize directly from JSON, the way
//! `graphweave::react_builder::ReactBuildConfig` is a plain struct a caller
//! fills in before handing it to the builder.

use serde::{Deserialize, Serialize};

use crate::graph_agent::{Condition, GraphEdge, GraphNode, LlmRef, UserInteraction, UserInteractionMode};
use crate::ids::{EdgeId, NodeId};
use crate::react::{CotConfig, SelfConsistencyConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphAgentConfig {
    pub nodes: Vec<NodeConfig>,
    pub edges: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: Option<String>,
    pub llm_provider: String,
    pub llm_model: String,
    #[serde(default)]
    pub token_limit: Option<u32>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub react_enabled: bool,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default)]
    pub self_consistency_samples: Option<u32>,
    #[serde(default)]
    pub user_interaction: Option<UserInteractionConfig>,
}

fn default_max_steps() -> u32 {
    10
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            command: None,
            llm_provider: String::new(),
            llm_model: String::new(),
            token_limit: None,
            max_steps: default_max_steps(),
            react_enabled: true,
            prompt_template: None,
            stop_sequences: Vec::new(),
            self_consistency_samples: None,
            user_interaction: None,
        }
    }
}

impl NodeConfig {
    /// Converts to a `GraphNode`; a node with `react_enabled = false` is
    /// coerced to `max_steps = 1` by `GraphAgent::new`, not here.
    pub fn to_node(&self) -> GraphNode {
        let mut llm = LlmRef::new(self.llm_provider.clone(), self.llm_model.clone());
        llm.token_limit = self.token_limit;

        let mut react_config = CotConfig {
            max_steps: if self.react_enabled { self.max_steps } else { 0 },
            ..CotConfig::default()
        };
        if let Some(template) = &self.prompt_template {
            react_config.prompt_template = template.clone();
        }
        react_config.stop_sequences = self.stop_sequences.clone();
        if let Some(samples) = self.self_consistency_samples {
            react_config.self_consistency = SelfConsistencyConfig {
                enabled: samples > 1,
                samples,
            };
        }

        let mut node = GraphNode::new(NodeId::from(self.id.as_str()), self.name.clone(), llm)
            .with_react_config(react_config);
        node.description = self.description.clone();
        if let Some(command) = &self.command {
            node = node.with_command(command.clone());
        }
        if let Some(interaction) = &self.user_interaction {
            node = node.with_user_interaction(interaction.to_user_interaction());
        }
        node
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInteractionConfig {
    #[serde(default)]
    pub continuous_chat: bool,
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub approval_prompt: Option<String>,
    #[serde(default)]
    pub allow_user_prompting: bool,
    #[serde(default)]
    pub show_end_chat_button: bool,
}

impl UserInteractionConfig {
    pub fn to_user_interaction(&self) -> UserInteraction {
        UserInteraction {
            mode: if self.continuous_chat {
                UserInteractionMode::ContinuousChat
            } else {
                UserInteractionMode::SingleReactCycle
            },
            require_approval: self.require_approval,
            confidence_threshold: self.confidence_threshold,
            approval_prompt: self.approval_prompt.clone(),
            allow_user_prompting: self.allow_user_prompting,
            show_end_chat_button: self.show_end_chat_button,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConditionConfig {
    Keyword { keyword: String },
    Analysis {
        prompt: String,
        analysis_provider: String,
        analysis_model: String,
    },
}

impl Default for ConditionConfig {
    fn default() -> Self {
        ConditionConfig::Keyword {
            keyword: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub id: String,
    pub from: String,
    pub to: String,
    pub condition: ConditionConfig,
    #[serde(default)]
    pub memory_override: Option<serde_json::Value>,
    #[serde(default)]
    pub context_from: Vec<String>,
    #[serde(default)]
    pub exclusive_group: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_join: bool,
    #[serde(default)]
    pub join_predecessors: Vec<String>,
}

impl EdgeConfig {
    pub fn to_edge(&self) -> GraphEdge {
        let condition = match &self.condition {
            ConditionConfig::Keyword { keyword } => Condition::Keyword {
                keyword: keyword.clone(),
            },
            ConditionConfig::Analysis {
                prompt,
                analysis_provider,
                analysis_model,
            } => Condition::Analysis {
                prompt: prompt.clone(),
                analysis_provider: LlmRef::new(analysis_provider.clone(), analysis_model.clone()),
            },
        };

        let mut edge = GraphEdge::new(
            EdgeId::from(self.id.as_str()),
            NodeId::from(self.from.as_str()),
            NodeId::from(self.to.as_str()),
            condition,
        )
        .with_context_from(self.context_from.iter().map(|s| NodeId::from(s.as_str())).collect());

        if let Some(group) = &self.exclusive_group {
            edge = edge.with_exclusive_group(group.clone(), self.priority);
        }
        if self.is_join {
            edge = edge.as_join(
                self.join_predecessors
                    .iter()
                    .map(|s| NodeId::from(s.as_str()))
                    .collect(),
            );
        }
        edge.memory_override = self.memory_override.clone();
        edge
    }
}
