use crate::edge::Edge;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A station platform on one railway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name_ja: String,
    pub name_en: String,
    pub railway_id: String,
    pub operator: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name_ja: id.clone(),
            name_en: id.clone(),
            id,
            ..Default::default()
        }
    }

    pub fn with_names(mut self, name_ja: impl Into<String>, name_en: impl Into<String>) -> Self {
        self.name_ja = name_ja.into();
        self.name_en = name_en.into();
        self
    }

    pub fn with_railway(mut self, railway_id: impl Into<String>) -> Self {
        self.railway_id = railway_id.into();
        self
    }

    pub fn with_coords(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// Coordinates when both are present and not the zero placeholder.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat != 0.0 || lon != 0.0 => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        if !self.name_ja.trim().is_empty() {
            &self.name_ja
        } else if !self.name_en.trim().is_empty() {
            &self.name_en
        } else {
            &self.id
        }
    }
}

/// In-memory station graph. Built once by the loader and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct TransitGraph {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Vec<Edge>>,
}

impl TransitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.entry(edge.from.clone()).or_default().push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn outgoing(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Station IDs whose short ID, English or Japanese name equals `term`.
    /// Results are sorted for stable output.
    pub fn find_station_ids(&self, term: &str) -> Vec<String> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        let lower = term.to_lowercase();
        let mut ids: Vec<String> = self
            .nodes
            .values()
            .filter(|n| {
                let suffix = n.id.rsplit('.').next().unwrap_or(&n.id).to_lowercase();
                suffix == lower || n.name_en.to_lowercase() == lower || n.name_ja == term
            })
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Number of railway changes along a path; unnamed railways are ignored.
pub fn count_transfers(path: &[Node]) -> usize {
    let mut transfers = 0;
    let mut prev_line = match path.first() {
        Some(n) => n.railway_id.as_str(),
        None => return 0,
    };
    for node in &path[1..] {
        let line = node.railway_id.as_str();
        if !line.is_empty() && !prev_line.is_empty() && line != prev_line {
            transfers += 1;
        }
        if !line.is_empty() {
            prev_line = line;
        }
    }
    transfers
}

/// Short Japanese name for well-known railway IDs, else the ID itself.
pub fn line_display_name(line_id: &str) -> &str {
    const NAMES: &[(&str, &str)] = &[
        ("UenoTokyo", "上野東京線"),
        ("Yamanote", "山手線"),
        ("Chuo", "中央線"),
        ("KeihinTohoku", "京浜東北線"),
        ("Ginza", "銀座線"),
        ("Marunouchi", "丸ノ内線"),
    ];
    NAMES
        .iter()
        .find(|(needle, _)| line_id.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or(line_id)
}
