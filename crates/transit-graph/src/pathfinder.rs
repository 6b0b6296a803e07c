use crate::edge::{Edge, EdgeType};
use crate::graph::{Node, TransitGraph};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use transit_core::{Result, TransitError};

/// Weight of an edge on a disabled line. Large but finite so sums never overflow to infinity.
pub const BLOCKED_COST: f64 = f64::MAX / 2.0;

const RAIN_TRANSFER_PENALTY: f64 = 300.0;
const SNOW_TRANSFER_PENALTY: f64 = 600.0;
const HEAT_WALK_PENALTY: f64 = 120.0;

const METERS_PER_DEGREE_LAT: f64 = 111_000.0;
const METERS_PER_DEGREE_LON: f64 = 91_000.0;
const AVERAGE_TRAIN_SPEED_MPS: f64 = 11.0;

/// Per-request factors that bias edge weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepContext {
    pub is_raining: bool,
    pub is_snowing: bool,
    pub is_hot: bool,
    pub disabled_lines: HashSet<String>,
    /// 0 (relaxed) to 10 (in a hurry)
    pub user_urgency: u8,
    pub user_budget: Option<u32>,
}

impl DeepContext {
    pub fn with_rain(mut self, is_raining: bool) -> Self {
        self.is_raining = is_raining;
        self
    }

    pub fn with_urgency(mut self, urgency: u8) -> Self {
        self.user_urgency = urgency.min(10);
        self
    }

    pub fn with_disabled_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_lines.extend(lines.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<Node>,
    pub total_time_seconds: f64,
}

impl PathResult {
    pub fn duration_minutes(&self) -> u32 {
        ((self.total_time_seconds / 60.0).floor() as u32).max(1)
    }
}

/// Heap entry. Lowest f-score pops first; equal scores pop the smaller node ID first.
#[derive(Debug, Clone)]
struct State {
    f_score: f64,
    g_score: f64,
    node: String,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Straight-line travel time estimate in seconds; zero when either end lacks coordinates.
pub fn heuristic(a: &Node, b: &Node) -> f64 {
    match (a.coords(), b.coords()) {
        (Some((lat_a, lon_a)), Some((lat_b, lon_b))) => {
            let dy = (lat_a - lat_b) * METERS_PER_DEGREE_LAT;
            let dx = (lon_a - lon_b) * METERS_PER_DEGREE_LON;
            (dx * dx + dy * dy).sqrt() / AVERAGE_TRAIN_SPEED_MPS
        }
        _ => 0.0,
    }
}

/// Weight of traversing `edge` under `ctx`.
pub fn edge_weight(edge: &Edge, ctx: &DeepContext) -> f64 {
    if let Some(line) = &edge.line_id {
        if ctx.disabled_lines.contains(line) {
            return BLOCKED_COST;
        }
    }

    let mut weight = edge.cost.time_seconds;
    match edge.edge_type {
        EdgeType::Transfer => {
            if ctx.is_raining {
                weight += RAIN_TRANSFER_PENALTY;
            }
            if ctx.is_snowing {
                weight += SNOW_TRANSFER_PENALTY;
            }
        }
        EdgeType::Walk => {
            if ctx.is_hot {
                weight += HEAT_WALK_PENALTY;
            }
        }
        EdgeType::Train => {}
    }
    weight
}

#[derive(Debug, Clone)]
pub struct Pathfinder {
    graph: Arc<TransitGraph>,
}

impl Pathfinder {
    pub fn new(graph: Arc<TransitGraph>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &TransitGraph {
        &self.graph
    }

    /// A* search from `start` to `goal`.
    ///
    /// An unreachable goal, or one reachable only across disabled lines, yields
    /// [`TransitError::NoPath`]; callers treat that as a routing miss.
    pub fn find_path(&self, start: &str, goal: &str, ctx: &DeepContext) -> Result<PathResult> {
        let start_node = self
            .graph
            .node(start)
            .ok_or_else(|| TransitError::NodeNotFound(start.to_string()))?;
        let goal_node = self
            .graph
            .node(goal)
            .ok_or_else(|| TransitError::NodeNotFound(goal.to_string()))?;

        if start == goal {
            return Ok(PathResult {
                path: vec![start_node.clone()],
                total_time_seconds: 0.0,
            });
        }

        // Missing entries read as +inf.
        let mut g_scores: HashMap<&str, f64> = HashMap::new();
        let mut came_from: HashMap<&str, &str> = HashMap::new();
        let mut heap = BinaryHeap::new();

        g_scores.insert(start_node.id.as_str(), 0.0);
        heap.push(State {
            f_score: heuristic(start_node, goal_node),
            g_score: 0.0,
            node: start_node.id.clone(),
        });

        let mut expanded = 0usize;
        while let Some(State { g_score, node, .. }) = heap.pop() {
            let current = match self.graph.node(&node) {
                Some(n) => n.id.as_str(),
                None => continue,
            };

            if current == goal {
                debug!(start, goal, expanded, cost = g_score, "A* reached goal");
                return Ok(PathResult {
                    path: self.reconstruct(&came_from, current),
                    total_time_seconds: g_score,
                });
            }

            // stale heap entry
            if g_score > g_scores.get(current).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            expanded += 1;

            for edge in self.graph.outgoing(current) {
                let neighbor = match self.graph.node(&edge.to) {
                    Some(n) => n,
                    None => continue,
                };
                let weight = edge_weight(edge, ctx);
                if weight >= BLOCKED_COST {
                    continue;
                }

                let tentative = g_score + weight;
                let known = g_scores
                    .get(neighbor.id.as_str())
                    .copied()
                    .unwrap_or(f64::INFINITY);
                if tentative < known {
                    g_scores.insert(neighbor.id.as_str(), tentative);
                    came_from.insert(neighbor.id.as_str(), current);
                    heap.push(State {
                        f_score: tentative + heuristic(neighbor, goal_node),
                        g_score: tentative,
                        node: neighbor.id.clone(),
                    });
                }
            }
        }

        debug!(start, goal, expanded, "A* exhausted the frontier");
        Err(TransitError::NoPath {
            from: start.to_string(),
            to: goal.to_string(),
        })
    }

    fn reconstruct(&self, came_from: &HashMap<&str, &str>, goal: &str) -> Vec<Node> {
        let mut ids = vec![goal];
        let mut cursor = goal;
        while let Some(&prev) = came_from.get(cursor) {
            ids.push(prev);
            cursor = prev;
        }
        ids.reverse();
        ids.into_iter()
            .filter_map(|id| self.graph.node(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A -(train 120)-> B -(transfer 300)-> C -(train 120)-> D
    fn chain() -> Pathfinder {
        let mut g = TransitGraph::new();
        for id in ["A", "B", "C", "D"] {
            g.add_node(Node::new(id));
        }
        g.add_edge(Edge::train("A", "B", "L1", 120.0));
        g.add_edge(Edge::transfer("B", "C", 300.0));
        g.add_edge(Edge::train("C", "D", "L2", 120.0));
        Pathfinder::new(Arc::new(g))
    }

    #[test]
    fn test_dry_path() {
        let result = chain().find_path("A", "D", &DeepContext::default()).unwrap();
        assert_relative_eq!(result.total_time_seconds, 540.0);
        let ids: Vec<&str> = result.path.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_rain_penalizes_transfer_once() {
        let ctx = DeepContext::default().with_rain(true);
        let result = chain().find_path("A", "D", &ctx).unwrap();
        assert_relative_eq!(result.total_time_seconds, 840.0);
        assert_eq!(result.path.len(), 4);
    }

    #[test]
    fn test_snow_penalty() {
        let ctx = DeepContext {
            is_snowing: true,
            ..Default::default()
        };
        let result = chain().find_path("A", "D", &ctx).unwrap();
        assert_relative_eq!(result.total_time_seconds, 1140.0);
    }

    #[test]
    fn test_disabled_line_blocks_path() {
        let ctx = DeepContext::default().with_disabled_lines(["L2"]);
        let err = chain().find_path("A", "D", &ctx).unwrap_err();
        assert!(matches!(err, TransitError::NoPath { .. }));
        assert!(err.is_expected_miss());
    }

    #[test]
    fn test_disabled_line_prefers_detour() {
        let mut g = TransitGraph::new();
        for id in ["A", "B", "C"] {
            g.add_node(Node::new(id));
        }
        g.add_edge(Edge::train("A", "C", "Fast", 60.0));
        g.add_edge(Edge::train("A", "B", "Slow", 120.0));
        g.add_edge(Edge::train("B", "C", "Slow", 120.0));
        let pf = Pathfinder::new(Arc::new(g));

        let normal = pf.find_path("A", "C", &DeepContext::default()).unwrap();
        assert_relative_eq!(normal.total_time_seconds, 60.0);

        let ctx = DeepContext::default().with_disabled_lines(["Fast"]);
        let detour = pf.find_path("A", "C", &ctx).unwrap();
        assert_relative_eq!(detour.total_time_seconds, 240.0);
    }

    #[test]
    fn test_heat_penalizes_walks() {
        let mut g = TransitGraph::new();
        g.add_node(Node::new("A"));
        g.add_node(Node::new("B"));
        g.add_edge(Edge::walk("A", "B", 200.0));
        let pf = Pathfinder::new(Arc::new(g));
        let ctx = DeepContext {
            is_hot: true,
            ..Default::default()
        };
        assert_relative_eq!(pf.find_path("A", "B", &ctx).unwrap().total_time_seconds, 320.0);
    }

    #[test]
    fn test_unknown_and_disconnected_nodes() {
        let pf = chain();
        assert!(matches!(
            pf.find_path("A", "Z", &DeepContext::default()),
            Err(TransitError::NodeNotFound(_))
        ));
        assert!(matches!(
            pf.find_path("D", "A", &DeepContext::default()),
            Err(TransitError::NoPath { .. })
        ));
    }

    #[test]
    fn test_same_start_and_goal() {
        let result = chain().find_path("B", "B", &DeepContext::default()).unwrap();
        assert_eq!(result.path.len(), 1);
        assert_relative_eq!(result.total_time_seconds, 0.0);
    }

    #[test]
    fn test_equal_cost_tie_breaks_by_node_id() {
        let mut g = TransitGraph::new();
        for id in ["S", "M1", "M2", "T"] {
            g.add_node(Node::new(id));
        }
        g.add_edge(Edge::train("S", "M2", "L", 100.0));
        g.add_edge(Edge::train("S", "M1", "L", 100.0));
        g.add_edge(Edge::train("M1", "T", "L", 100.0));
        g.add_edge(Edge::train("M2", "T", "L", 100.0));
        let pf = Pathfinder::new(Arc::new(g));

        for _ in 0..10 {
            let result = pf.find_path("S", "T", &DeepContext::default()).unwrap();
            assert_eq!(result.path[1].id, "M1");
        }
    }

    #[test]
    fn test_heuristic_without_coords_is_zero() {
        let a = Node::new("a").with_coords(35.68, 139.76);
        let b = Node::new("b");
        assert_relative_eq!(heuristic(&a, &b), 0.0);
    }

    #[test]
    fn test_heuristic_units_are_seconds() {
        let a = Node::new("a").with_coords(35.0, 139.0);
        let b = Node::new("b").with_coords(35.01, 139.0);
        assert_relative_eq!(heuristic(&a, &b), 1110.0 / 11.0, epsilon = 1e-6);
    }

    #[test]
    fn test_duration_minutes_floor_one() {
        let r = PathResult {
            path: vec![],
            total_time_seconds: 30.0,
        };
        assert_eq!(r.duration_minutes(), 1);
        let r = PathResult {
            path: vec![],
            total_time_seconds: 539.0,
        };
        assert_eq!(r.duration_minutes(), 8);
    }
}
