use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use semgraph_core::config::ExecutionOrder;
use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::types::Workflow;

/// Node ids in the order the engine should execute them.
pub fn resolve(workflow: &Workflow, order: ExecutionOrder) -> Result<Vec<String>> {
    match order {
        ExecutionOrder::Declaration => Ok(declaration_order(workflow)),
        ExecutionOrder::Topological => topological_order(workflow),
    }
}

/// The node array's order. Edges are not consulted.
///
/// A repeated node id is kept at its first position only; the engine
/// looks nodes up by id, so a second entry would run the same node again.
pub fn declaration_order(workflow: &Workflow) -> Vec<String> {
    let mut seen = HashSet::new();
    workflow
        .nodes
        .iter()
        .filter(|n| {
            let first = seen.insert(n.id.as_str());
            if !first {
                warn!(node_id = %n.id, "Duplicate node id skipped");
            }
            first
        })
        .map(|n| n.id.clone())
        .collect()
}

/// Kahn's algorithm over the edge set.
///
/// Ties are broken by declaration order so the result is deterministic.
/// Edges whose endpoints are not nodes of the workflow are ignored. If
/// nodes remain once no zero in-degree node is left, they form (or depend
/// on) a cycle and are reported in declaration order.
pub fn topological_order(workflow: &Workflow) -> Result<Vec<String>> {
    let declared = declaration_order(workflow);
    let ids: Vec<&str> = declared.iter().map(String::as_str).collect();
    let known: HashSet<&str> = ids.iter().copied().collect();

    let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut out_edges: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in &workflow.edges {
        let (from, to) = (edge.source.as_str(), edge.target.as_str());
        if !known.contains(from) || !known.contains(to) {
            debug!(edge_id = %edge.id, "Ignoring edge with unknown endpoint");
            continue;
        }
        out_edges.entry(from).or_default().push(to);
        if let Some(d) = in_degree.get_mut(to) {
            *d += 1;
        }
    }

    let mut queue: VecDeque<&str> = ids
        .iter()
        .copied()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(ids.len());
    let mut emitted: HashSet<&str> = HashSet::new();

    while let Some(u) = queue.pop_front() {
        if !emitted.insert(u) {
            continue;
        }
        order.push(u.to_string());
        for v in out_edges.remove(u).unwrap_or_default() {
            if let Some(d) = in_degree.get_mut(v) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(v);
                }
            }
        }
    }

    if order.len() == known.len() {
        Ok(order)
    } else {
        let remaining = ids
            .iter()
            .filter(|id| !emitted.contains(*id))
            .map(|id| id.to_string())
            .collect();
        Err(SemgraphError::CycleDetected { remaining })
    }
}
