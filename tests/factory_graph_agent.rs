//! Cross-module: building a `GraphAgent` from `factory::GraphAgentConfig`
//! and driving a node whose internal ReAct loop calls a real `Toolkit` tool.

mod init_logging;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use weft::factory::{build_graph_agent, EdgeConfig, GraphAgentConfig, NodeConfig};
use weft::graph_agent::AgentState;
use weft::llm::{LlmClient, MockLlmClient};
use weft::memory::{Checkpointer, InMemoryCheckpointer};
use weft::tool::{Tool, ToolError, ToolKind, ToolSpec};
use weft::{EventBus, Toolkit};

struct EchoTool {
    spec: ToolSpec,
}

impl EchoTool {
    fn new() -> Self {
        Self {
            spec: ToolSpec::new("echo", "echoes its input", ToolKind::Actor).with_input_schema(
                serde_json::json!({
                    "type": "object",
                    "required": ["text"],
                    "properties": {"text": {"type": "string"}}
                }),
            ),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        Ok(args["text"].clone())
    }
}

fn registry(responses: Vec<&str>) -> HashMap<String, Arc<dyn LlmClient>> {
    let mut registry: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
    registry.insert(
        "mock".to_string(),
        Arc::new(MockLlmClient::new(responses.into_iter().map(String::from).collect())),
    );
    registry
}

#[tokio::test]
async fn entry_node_dispatches_tool_call_through_its_react_loop() {
    let mut toolkit = Toolkit::new();
    toolkit.register(Arc::new(EchoTool::new())).unwrap();

    let config = GraphAgentConfig {
        nodes: vec![NodeConfig {
            id: "a".to_string(),
            name: "A".to_string(),
            command: Some("_newmessage".to_string()),
            llm_provider: "mock".to_string(),
            llm_model: "mock".to_string(),
            ..Default::default()
        }],
        edges: vec![],
    };

    let agent = build_graph_agent(
        config,
        registry(vec![
            "Thought: I'll echo it\nAction: echo\nAction Input: {\"text\":\"hello\"}",
            "Thought: done\nFinal Answer: hello",
        ]),
        Arc::new(toolkit),
        Arc::new(EventBus::new()),
        None,
    )
    .unwrap();

    let answer = agent.invoke("hi there").await.unwrap();
    assert_eq!(answer, "hello");

    let state = agent.get_execution_state().await;
    assert_eq!(state.execution_history.len(), 1);
    assert_eq!(state.execution_history[0].node_id.as_str(), "a");
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_node_runs() {
    let config = GraphAgentConfig {
        nodes: vec![NodeConfig {
            id: "a".to_string(),
            name: "A".to_string(),
            command: None,
            llm_provider: "unregistered-provider".to_string(),
            llm_model: "x".to_string(),
            ..Default::default()
        }],
        edges: vec![EdgeConfig {
            id: "dangling".to_string(),
            from: "a".to_string(),
            to: "does-not-exist".to_string(),
            ..Default::default()
        }],
    };

    let result = build_graph_agent(
        config,
        HashMap::new(),
        Arc::new(Toolkit::new()),
        Arc::new(EventBus::new()),
        None,
    );

    assert!(result.is_err());
}

#[tokio::test]
async fn restore_from_checkpoint_resumes_only_the_saved_node() {
    let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());

    let config = GraphAgentConfig {
        nodes: vec![
            NodeConfig {
                id: "a".to_string(),
                name: "A".to_string(),
                command: Some("_newmessage".to_string()),
                llm_provider: "mock".to_string(),
                llm_model: "mock".to_string(),
                ..Default::default()
            },
            NodeConfig {
                id: "b".to_string(),
                name: "B".to_string(),
                command: None,
                llm_provider: "mock".to_string(),
                llm_model: "mock".to_string(),
                ..Default::default()
            },
        ],
        edges: vec![],
    };

    let agent = build_graph_agent(
        config,
        registry(vec!["Thought: resumed\nFinal Answer: resumed-b"]),
        Arc::new(Toolkit::new()),
        Arc::new(EventBus::new()),
        Some(checkpointer.clone()),
    )
    .unwrap();

    let checkpoint_id = checkpointer
        .save(
            "conv-1",
            serde_json::json!({"resume_node_id": "b", "paused_branches": []}),
        )
        .await
        .unwrap();

    agent
        .restore_from_checkpoint("conv-1", &checkpoint_id)
        .await
        .unwrap();
    assert_eq!(agent.agent_state().await, AgentState::Paused);

    let chunks = agent.continue_with_input("continue please").await.unwrap();
    assert_eq!(chunks, vec!["resumed-b".to_string()]);

    let state = agent.get_execution_state().await;
    assert_eq!(state.execution_history.len(), 1);
    assert_eq!(state.execution_history[0].node_id.as_str(), "b");
}

#[tokio::test]
async fn restore_from_checkpoint_without_a_checkpointer_fails() {
    let config = GraphAgentConfig {
        nodes: vec![NodeConfig {
            id: "a".to_string(),
            name: "A".to_string(),
            command: Some("_newmessage".to_string()),
            llm_provider: "mock".to_string(),
            llm_model: "mock".to_string(),
            ..Default::default()
        }],
        edges: vec![],
    };

    let agent = build_graph_agent(
        config,
        registry(vec!["Final Answer: ok"]),
        Arc::new(Toolkit::new()),
        Arc::new(EventBus::new()),
        None,
    )
    .unwrap();

    let result = agent.restore_from_checkpoint("conv-1", "missing").await;
    assert!(result.is_err());
}
