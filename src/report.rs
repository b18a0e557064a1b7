use crate::core::{TimeWindow, TraceOutcome};
use crate::graph::FlowGraph;

/// Render the plain-text trace report handed to the operator.
pub fn render(origin: &str, window: TimeWindow, max_depth: u32, outcome: &TraceOutcome, graph: &FlowGraph) -> String {
    let mut out = String::from("XRP Transaction Trace Report\n");
    out.push_str("============================\n\n");
    out.push_str(&format!("Trace origin:  {origin}\n"));
    out.push_str(&format!("Max depth:     {max_depth}\n"));
    out.push_str(&format!("Window start:  {}\n", format_bound(window.start)));
    out.push_str(&format!("Window end:    {}\n", format_bound(window.end)));
    out.push('\n');
    out.push_str(&format!("Transfers traced:   {}\n", outcome.transactions.len()));
    out.push_str(&format!("Accounts on graph:  {}\n", graph.node_count()));
    out.push_str(&format!("Flow edges:         {}\n", graph.edge_count()));
    out.push_str(&format!("Suspected mixers:   {}\n", outcome.suspected_mixers.len()));
    out.push('\n');

    if outcome.alerts.is_empty() {
        out.push_str("No alerts detected.\n");
    } else {
        out.push_str(&format!("Alerts ({}):\n", outcome.alerts.len()));
        for alert in &outcome.alerts {
            out.push_str(&format!("  - {alert}\n"));
        }
    }
    out
}

fn format_bound(bound: Option<chrono::DateTime<chrono::Utc>>) -> String {
    match bound {
        Some(ts) => ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => "(unbounded)".to_string(),
    }
}
