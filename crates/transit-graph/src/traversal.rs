use crate::graph::TransitGraph;
use std::collections::{HashSet, VecDeque};

/// Breadth-first expansion over outgoing edges from `seeds`.
///
/// Returns node IDs in visit order, seeds first. Stops at `max_hops` from any seed
/// or once `max_nodes` IDs have been collected. Unknown seeds are kept as-is so
/// callers can still filter on them.
pub fn expand_k_hops(
    graph: &TransitGraph,
    seeds: &[String],
    max_hops: usize,
    max_nodes: usize,
) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    for seed in seeds {
        let seed = seed.trim();
        if seed.is_empty() || !visited.insert(seed.to_string()) {
            continue;
        }
        if order.len() >= max_nodes {
            return order;
        }
        order.push(seed.to_string());
        queue.push_back((seed.to_string(), 0));
    }

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for edge in graph.outgoing(&current) {
            if order.len() >= max_nodes {
                return order;
            }
            if visited.insert(edge.to.clone()) {
                order.push(edge.to.clone());
                queue.push_back((edge.to.clone(), depth + 1));
            }
        }
    }

    order
}
