//! Builds a `GraphAgent` (or a bare `ReactAgent`) from a serializable
//! configuration, the way `react_builder::build` assembles a runner from a
//! `ReactBuildConfig`: validate, fill defaults, wire collaborators, fail
//! fast with a descriptive error rather than partial construction.

mod config;
mod error;

use std::collections::HashMap;
use std::sync::Arc;

pub use config::{EdgeConfig, NodeConfig, GraphAgentConfig};
pub use error::FactoryError;

use crate::events::EventBus;
use crate::graph_agent::{validator, GraphAgent, ValidationReport};
use crate::llm::LlmClient;
use crate::memory::Checkpointer;
use crate::toolkit::Toolkit;

/// Validates a config's graph shape and LLM references without constructing
/// anything. Call before `build_graph_agent` to surface problems early, e.g.
/// in a CLI `--check-config` flag or an admin API endpoint.
pub fn validate_config(
    config: &GraphAgentConfig,
    llm_registry: &HashMap<String, Arc<dyn LlmClient>>,
) -> ValidationReport {
    let nodes: Vec<_> = config.nodes.iter().map(NodeConfig::to_node).collect();
    let edges: Vec<_> = config.edges.iter().map(EdgeConfig::to_edge).collect();
    let mut report = validator::validate(&nodes, &edges);

    for node in &config.nodes {
        if !llm_registry.contains_key(&node.llm_provider) {
            report.valid = false;
            report.errors.push(format!(
                "node {} references unregistered LLM provider '{}'",
                node.id, node.llm_provider
            ));
        }
    }

    let mut seen_ids = std::collections::HashSet::new();
    for node in &config.nodes {
        if !seen_ids.insert(&node.id) {
            report.valid = false;
            report.errors.push(format!("duplicate node id '{}'", node.id));
        }
    }

    report
}

/// Builds a ready `GraphAgent` from config, failing with `FactoryError`
/// before any node runs if the graph or its LLM references are invalid.
pub fn build_graph_agent(
    config: GraphAgentConfig,
    llm_registry: HashMap<String, Arc<dyn LlmClient>>,
    toolkit: Arc<Toolkit>,
    events: Arc<EventBus>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
) -> Result<Arc<GraphAgent>, FactoryError> {
    let report = validate_config(&config, &llm_registry);
    if !report.valid {
        return Err(FactoryError::InvalidConfig(report.errors));
    }

    let nodes = config.nodes.iter().map(NodeConfig::to_node).collect();
    let edges = config.edges.iter().map(EdgeConfig::to_edge).collect();

    let agent = GraphAgent::with_checkpointer(nodes, edges, llm_registry, toolkit, events, checkpointer)
        .map_err(FactoryError::Graph)?;
    Ok(Arc::new(agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn registry() -> HashMap<String, Arc<dyn LlmClient>> {
        let mut registry: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
        registry.insert(
            "mock".to_string(),
            Arc::new(MockLlmClient::new(vec!["Final Answer: ok".to_string()])),
        );
        registry
    }

    #[test]
    fn missing_llm_provider_fails_validation() {
        let config = GraphAgentConfig {
            nodes: vec![NodeConfig {
                id: "a".to_string(),
                name: "A".to_string(),
                command: None,
                llm_provider: "unregistered".to_string(),
                llm_model: "x".to_string(),
                ..Default::default()
            }],
            edges: vec![],
        };
        let report = validate_config(&config, &HashMap::new());
        assert!(!report.valid);
    }

    #[test]
    fn valid_config_builds_an_agent() {
        let config = GraphAgentConfig {
            nodes: vec![NodeConfig {
                id: "a".to_string(),
                name: "A".to_string(),
                command: Some(crate::graph_agent::GraphNode::NEW_MESSAGE_COMMAND.to_string()),
                llm_provider: "mock".to_string(),
                llm_model: "mock".to_string(),
                ..Default::default()
            }],
            edges: vec![],
        };
        let agent = build_graph_agent(
            config,
            registry(),
            Arc::new(Toolkit::new()),
            Arc::new(EventBus::new()),
            None,
        );
        assert!(agent.is_ok());
    }

    #[test]
    fn duplicate_node_ids_fail_validation() {
        let node = |id: &str| NodeConfig {
            id: id.to_string(),
            name: id.to_string(),
            command: None,
            llm_provider: "mock".to_string(),
            llm_model: "mock".to_string(),
            ..Default::default()
        };
        let config = GraphAgentConfig {
            nodes: vec![node("a"), node("a")],
            edges: vec![],
        };
        let report = validate_config(&config, &registry());
        assert!(!report.valid);
    }
}
