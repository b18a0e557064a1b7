use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::core::TraceOutcome;
use crate::tags::TagRegistry;

/// Drops per XRP.
pub const DROPS_PER_XRP: f64 = 1_000_000.0;

/// Per-account annotations carried on each graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub account: String,
    pub level: u32,
    pub is_exchange: bool,
    pub is_mixer: bool,
    pub is_tagged: bool,
    pub tag_label: Option<String>,
}

pub type FlowGraph = DiGraph<FlowNode, f64>;

/// Fold the traced transaction list into a weighted directed graph.
///
/// Transfers between the same pair of accounts aggregate into one edge.
/// Mixer flags reflect the outcome's final mixer set, so tag overrides
/// applied during the trace are already accounted for.
pub fn build_graph(outcome: &TraceOutcome, registry: &TagRegistry) -> FlowGraph {
    let mut graph = FlowGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for txn in &outcome.transactions {
        let (destination, amount) = match (&txn.destination, txn.amount) {
            (Some(destination), Some(amount)) => (destination, amount),
            _ => continue,
        };
        let source_idx = ensure_node(&mut graph, &mut nodes, &txn.source, outcome, registry);
        let dest_idx = ensure_node(&mut graph, &mut nodes, destination, outcome, registry);
        let weight = amount as f64 / DROPS_PER_XRP;
        match graph.find_edge(source_idx, dest_idx) {
            Some(edge) => graph[edge] += weight,
            None => {
                graph.add_edge(source_idx, dest_idx, weight);
            }
        }
    }
    graph
}

fn ensure_node(
    graph: &mut FlowGraph,
    nodes: &mut HashMap<String, NodeIndex>,
    account: &str,
    outcome: &TraceOutcome,
    registry: &TagRegistry,
) -> NodeIndex {
    if let Some(&idx) = nodes.get(account) {
        return idx;
    }
    // A source that never got a level sits at the root level.
    let level = outcome.node_levels.get(account).copied().unwrap_or(0);
    let tag = registry.tag(account);
    let idx = graph.add_node(FlowNode {
        account: account.to_string(),
        level,
        is_exchange: registry.exchange(account).is_some(),
        is_mixer: outcome.suspected_mixers.contains(account),
        is_tagged: tag.is_some(),
        tag_label: tag.map(|t| t.label.clone()),
    });
    nodes.insert(account.to_string(), idx);
    idx
}

/// Render the graph in Graphviz DOT form.
///
/// Analyst color scheme: tagged purple, exchanges red, suspected mixers
/// orange, everything else gray.
pub fn render_dot(graph: &FlowGraph) -> String {
    let mut out = String::from("digraph flows {\n  rankdir=LR;\n  node [style=filled];\n");
    for idx in graph.node_indices() {
        let node = &graph[idx];
        let color = if node.is_tagged {
            "purple"
        } else if node.is_exchange {
            "red"
        } else if node.is_mixer {
            "orange"
        } else {
            "gray90"
        };
        let mut label = short_address(&node.account);
        if let Some(tag_label) = &node.tag_label {
            label.push(' ');
            label.push_str(tag_label);
        }
        out.push_str(&format!(
            "  n{} [label=\"{}\", fillcolor={}, xlabel=\"L{}\"];\n",
            idx.index(),
            label,
            color,
            node.level
        ));
    }
    for edge in graph.edge_references() {
        out.push_str(&format!(
            "  n{} -> n{} [label=\"{} XRP\"];\n",
            edge.source().index(),
            edge.target().index(),
            edge.weight()
        ));
    }
    out.push_str("}\n");
    out
}

/// Shorten an address for display: first and last four characters.
pub fn short_address(address: &str) -> String {
    if address.len() <= 8 {
        return address.to_string();
    }
    format!("{}...{}", &address[..4], &address[address.len() - 4..])
}
