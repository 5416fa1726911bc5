//! Export a graph's node/edge structure to Graphviz DOT or plain text, for
//! debugging exclusive groups and joins without running anything.

use std::fmt::Write;

use crate::graph_agent::edge::GraphEdge;
use crate::graph_agent::node::GraphNode;

/// Renders nodes as boxes and edges as arrows labeled with their condition.
/// Join edges are dashed; edges sharing an exclusive group are colored alike.
pub fn generate_dot(nodes: &[GraphNode], edges: &[GraphEdge]) -> String {
    let mut dot = String::from("digraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box];\n\n");

    for node in nodes {
        let label = if let Some(command) = &node.command {
            format!("{} ({})", node.name, command)
        } else {
            node.name.clone()
        };
        let _ = writeln!(dot, "  \"{}\" [label=\"{}\"];", node.id, label);
    }
    dot.push('\n');

    for edge in edges {
        let mut attrs = vec![format!("label=\"{}\"", edge.condition.describe())];
        if edge.is_join {
            attrs.push("style=dashed".to_string());
        }
        if let Some(group) = &edge.exclusive_group {
            attrs.push(format!("color=\"{}\"", group_color(group)));
        }
        let _ = writeln!(
            dot,
            "  \"{}\" -> \"{}\" [{}];",
            edge.from,
            edge.to,
            attrs.join(", ")
        );
    }

    dot.push_str("}\n");
    dot
}

/// Renders a human-readable summary: nodes, then each node's outgoing edges
/// grouped by exclusive group.
pub fn generate_text(nodes: &[GraphNode], edges: &[GraphEdge]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Graph Structure:");
    let _ = writeln!(text, "Nodes: {}", nodes.len());
    let _ = writeln!(text, "Edges: {}", edges.len());

    let _ = writeln!(text, "\nNodes:");
    for node in nodes {
        match &node.command {
            Some(command) => {
                let _ = writeln!(text, "  {} [{}] (command: {})", node.id, node.name, command);
            }
            None => {
                let _ = writeln!(text, "  {} [{}]", node.id, node.name);
            }
        }
    }

    let _ = writeln!(text, "\nEdges:");
    for node in nodes {
        let outgoing: Vec<&GraphEdge> = edges.iter().filter(|e| e.from == node.id).collect();
        if outgoing.is_empty() {
            continue;
        }
        let _ = writeln!(text, "  {} ->", node.id);
        for edge in outgoing {
            let mut descriptors = vec![edge.condition.describe()];
            if edge.is_join {
                descriptors.push(format!(
                    "join on [{}]",
                    edge.join_predecessors
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            if let Some(group) = &edge.exclusive_group {
                descriptors.push(format!("group={group} priority={}", edge.priority));
            }
            let _ = writeln!(text, "    {} [{}]  {}", edge.to, edge.id, descriptors.join(", "));
        }
    }

    text
}

fn group_color(group: &str) -> &'static str {
    const PALETTE: [&str; 6] = ["blue", "red", "green", "purple", "orange", "brown"];
    let index = group.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize)) % PALETTE.len();
    PALETTE[index]
}
