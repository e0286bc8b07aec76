//! Graph analysis for one workflow scope.
//!
//! Builds two `petgraph` graphs over the scope's states: one with `next`
//! edges only (checked for cycles) and one with `next` plus catch edges
//! (walked from the start state for reachability). Parallel branches are
//! separate scopes and are analyzed by the caller.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use waypoint_types::workflow::WorkflowDefinition;

use super::definition::WorkflowError;

/// Result of analyzing one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphAnalysis {
    /// States reachable from the start state, in depth-first order.
    pub reachable: Vec<String>,
    /// States no path from the start state reaches (sorted).
    pub unreachable: Vec<String>,
}

/// Check that the start state and every `next`/catch target resolve, that
/// `next` edges are acyclic, and compute reachability.
pub fn analyze_graph(def: &WorkflowDefinition) -> Result<GraphAnalysis, WorkflowError> {
    if def.states.is_empty() {
        return Err(WorkflowError::ValidationError(
            "workflow must have at least one state".to_string(),
        ));
    }
    if !def.states.contains_key(&def.start_state) {
        return Err(WorkflowError::UnknownState(format!(
            "startState references unknown state '{}'",
            def.start_state
        )));
    }

    let mut next_graph = DiGraph::<&str, ()>::new();
    let mut flow_graph = DiGraph::<&str, ()>::new();
    let mut next_nodes: HashMap<&str, NodeIndex> = HashMap::new();
    let mut flow_nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for id in def.states.keys() {
        next_nodes.insert(id.as_str(), next_graph.add_node(id.as_str()));
        flow_nodes.insert(id.as_str(), flow_graph.add_node(id.as_str()));
    }

    for (id, state) in &def.states {
        if let Some(next) = state.next() {
            let target = next_nodes.get(next).ok_or_else(|| {
                WorkflowError::UnknownState(format!(
                    "state '{id}' has next '{next}' which does not exist"
                ))
            })?;
            next_graph.add_edge(next_nodes[id.as_str()], *target, ());
            flow_graph.add_edge(flow_nodes[id.as_str()], flow_nodes[next], ());
        }
        for catch in state.catches() {
            let target = flow_nodes.get(catch.next.as_str()).ok_or_else(|| {
                WorkflowError::UnknownState(format!(
                    "state '{id}' has catch target '{}' which does not exist",
                    catch.next
                ))
            })?;
            flow_graph.add_edge(flow_nodes[id.as_str()], *target, ());
        }
    }

    toposort(&next_graph, None).map_err(|cycle| {
        WorkflowError::CycleDetected(format!(
            "cycle detected involving state '{}'",
            next_graph[cycle.node_id()]
        ))
    })?;

    let mut reachable = Vec::new();
    let mut dfs = Dfs::new(&flow_graph, flow_nodes[def.start_state.as_str()]);
    while let Some(node) = dfs.next(&flow_graph) {
        reachable.push(flow_graph[node].to_string());
    }

    let unreachable = def
        .states
        .keys()
        .filter(|id| !reachable.iter().any(|r| r == *id))
        .cloned()
        .collect();

    Ok(GraphAnalysis {
        reachable,
        unreachable,
    })
}
