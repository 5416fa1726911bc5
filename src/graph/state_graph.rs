//! Minimal state graph: add nodes/edges, compile, then invoke with state.
//!
//! This is the substrate a single `GraphAgent` node's internal Think → Act →
//! Observe loop compiles to — not the top-level multi-branch execution
//! engine (see `crate::graph_agent` for that). Unlike a single linear chain,
//! conditional edges may route back to an earlier node (the ReAct loop does
//! exactly this), so `invoke` runs until a node returns `Next::End` or a
//! conditional router yields `END`, bounded by `max_steps` as a safety net.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::AgentError;
use crate::graph::compile_error::CompilationError;
use crate::graph::conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
use crate::graph::next::Next;
use crate::graph::node::Node;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

pub struct StateGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: Vec<(String, String)>,
    conditional_edges: HashMap<String, ConditionalRouter<S>>,
}

impl<S> Default for StateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            conditional_edges: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn add_edge(&mut self, from_id: impl Into<String>, to_id: impl Into<String>) -> &mut Self {
        self.edges.push((from_id.into(), to_id.into()));
        self
    }

    pub fn add_conditional_edges(
        &mut self,
        source: impl Into<String>,
        path: ConditionalRouterFn<S>,
        path_map: Option<HashMap<String, String>>,
    ) -> &mut Self {
        self.conditional_edges
            .insert(source.into(), ConditionalRouter::new(path, path_map));
        self
    }

    pub fn compile(self) -> Result<CompiledStateGraph<S>, CompilationError> {
        for (from, to) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(CompilationError::NodeNotFound(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(CompilationError::NodeNotFound(to.clone()));
            }
        }
        for (source, router) in &self.conditional_edges {
            if !self.nodes.contains_key(source) {
                return Err(CompilationError::NodeNotFound(source.clone()));
            }
            if let Some(path_map) = &router.path_map {
                for target in path_map.values() {
                    if target != END && !self.nodes.contains_key(target) {
                        return Err(CompilationError::InvalidConditionalPathMap(target.clone()));
                    }
                }
            }
        }

        let start_edges: Vec<_> = self
            .edges
            .iter()
            .filter(|(f, _)| f == START)
            .map(|(_, t)| t.clone())
            .collect();
        let first = match start_edges.len() {
            0 => return Err(CompilationError::MissingStart),
            1 => start_edges.into_iter().next().unwrap(),
            _ => return Err(CompilationError::InvalidChain("multiple edges from START".into())),
        };

        let has_end = self.edges.iter().any(|(_, t)| t == END)
            || self.conditional_edges.values().any(|r| {
                r.path_map
                    .as_ref()
                    .map_or(true, |m| m.values().any(|v| v == END))
            });
        if !has_end {
            return Err(CompilationError::MissingEnd);
        }

        let edge_froms: HashSet<_> = self
            .edges
            .iter()
            .filter(|(f, _)| f.as_str() != START)
            .map(|(f, _)| f.clone())
            .collect();
        for source in self.conditional_edges.keys() {
            if edge_froms.contains(source) {
                return Err(CompilationError::NodeHasBothEdgeAndConditional(
                    source.clone(),
                ));
            }
        }

        let mut next_map: HashMap<String, NextEntry<S>> = self
            .edges
            .iter()
            .filter(|(f, _)| f.as_str() != START)
            .map(|(f, t)| (f.clone(), NextEntry::Unconditional(t.clone())))
            .collect();
        for (source, router) in self.conditional_edges {
            next_map.insert(source, NextEntry::Conditional(router));
        }

        Ok(CompiledStateGraph {
            nodes: self.nodes,
            first_node_id: first,
            next_map,
        })
    }
}

pub struct CompiledStateGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    first_node_id: String,
    next_map: HashMap<String, NextEntry<S>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Runs the graph to completion, bounded by `max_steps` node executions.
    pub async fn invoke(&self, mut state: S, max_steps: u32) -> Result<S, AgentError> {
        let mut current = self.first_node_id.clone();
        for _ in 0..max_steps {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| AgentError::Other(format!("node not found: {current}")))?;
            let (new_state, next) = node.run(state).await?;
            state = new_state;
            current = match next {
                Next::End => return Ok(state),
                Next::Node(id) => id,
                Next::Continue => match self.next_map.get(&current) {
                    Some(NextEntry::Unconditional(to)) => to.clone(),
                    Some(NextEntry::Conditional(router)) => router.resolve(&state),
                    None => return Ok(state),
                },
            };
            if current == END {
                return Ok(state);
            }
        }
        Err(AgentError::Other(format!(
            "state graph exceeded max_steps ({max_steps})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone, Debug)]
    struct Counter(i32);

    struct Increment;

    #[async_trait]
    impl Node<Counter> for Increment {
        fn id(&self) -> &str {
            "increment"
        }
        async fn run(&self, state: Counter) -> Result<(Counter, Next), AgentError> {
            Ok((Counter(state.0 + 1), Next::Continue))
        }
    }

    #[tokio::test]
    async fn linear_chain_reaches_end() {
        let mut graph = StateGraph::<Counter>::new();
        graph.add_node("increment", Arc::new(Increment));
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let compiled = graph.compile().unwrap();
        let out = compiled.invoke(Counter(0), 10).await.unwrap();
        assert_eq!(out.0, 1);
    }

    #[tokio::test]
    async fn conditional_loop_terminates_via_router() {
        let mut graph = StateGraph::<Counter>::new();
        graph.add_node("increment", Arc::new(Increment));
        graph.add_edge(START, "increment");
        graph.add_conditional_edges(
            "increment",
            Arc::new(|s: &Counter| if s.0 >= 3 { END.to_string() } else { "increment".to_string() }),
            None,
        );
        let compiled = graph.compile().unwrap();
        let out = compiled.invoke(Counter(0), 10).await.unwrap();
        assert_eq!(out.0, 3);
    }
}
