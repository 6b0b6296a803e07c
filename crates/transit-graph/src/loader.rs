use crate::edge::Edge;
use crate::graph::{Node, TransitGraph};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use transit_core::{GraphSource, Result, TransitError};

pub const TRAIN_HOP_SECONDS: f64 = 120.0;
pub const VIRTUAL_TRANSFER_SECONDS: f64 = 300.0;

#[derive(Debug, Deserialize)]
struct RailwayRecord {
    id: String,
    #[serde(default)]
    station_order: serde_json::Value,
    #[serde(default)]
    operator: String,
}

#[derive(Debug, Deserialize)]
struct StationOrderEntry {
    #[serde(rename = "odpt:station")]
    station: String,
    #[serde(rename = "odpt:index", default)]
    index: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct StationRecord {
    id: String,
    #[serde(default)]
    title_en: String,
    #[serde(default)]
    title_ja: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    long: Option<f64>,
}

/// Builds a [`TransitGraph`] from the static railway and station tables.
pub struct GraphLoader {
    source: Arc<dyn GraphSource>,
}

impl GraphLoader {
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        Self { source }
    }

    /// Station metadata is optional; a failure there only costs names and coordinates.
    /// Railway topology is required.
    #[instrument(skip(self))]
    pub async fn build_graph(&self) -> Result<TransitGraph> {
        info!("Starting graph build");
        let started = Instant::now();

        let station_meta = match self.fetch_stations().await {
            Ok(meta) => {
                info!(count = meta.len(), "Loaded station metadata");
                meta
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch station metadata, continuing without it");
                HashMap::new()
            }
        };

        let railways = self.fetch_railways().await?;
        info!(count = railways.len(), "Loaded railways");

        let mut graph = TransitGraph::new();
        // name_ja -> node IDs, in first-seen order
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for railway in &railways {
            let mut order: Vec<StationOrderEntry> =
                match serde_json::from_value(railway.station_order.clone()) {
                    Ok(order) => order,
                    Err(e) => {
                        debug!(railway = %railway.id, error = %e, "Skipping railway with unreadable station order");
                        continue;
                    }
                };
            order.sort_by_key(|entry| entry.index);

            let mut prev: Option<&str> = None;
            for entry in &order {
                let sid = entry.station.as_str();
                if !graph.contains(sid) {
                    let mut node = Node::new(sid);
                    node.railway_id = railway.id.clone();
                    node.operator = railway.operator.clone();
                    if let Some(meta) = station_meta.get(sid) {
                        node.name_en = meta.title_en.clone();
                        node.name_ja = meta.title_ja.clone();
                        node.lat = meta.lat;
                        node.lon = meta.long;
                    }
                    if !node.name_ja.is_empty() {
                        let slot = *group_index.entry(node.name_ja.clone()).or_insert_with(|| {
                            groups.push((node.name_ja.clone(), Vec::new()));
                            groups.len() - 1
                        });
                        groups[slot].1.push(sid.to_string());
                    }
                    graph.add_node(node);
                }

                if let Some(prev_id) = prev {
                    graph.add_edge(Edge::train(prev_id, sid, &railway.id, TRAIN_HOP_SECONDS));
                    graph.add_edge(Edge::train(sid, prev_id, &railway.id, TRAIN_HOP_SECONDS));
                }
                prev = Some(sid);
            }
        }

        let transfers = add_virtual_transfers(&mut graph, &groups);

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            transfers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Graph built successfully"
        );
        Ok(graph)
    }

    async fn fetch_railways(&self) -> Result<Vec<RailwayRecord>> {
        let filters = select("id,station_order,operator");
        let rows = self
            .source
            .query("static_railways", &filters)
            .await
            .map_err(|e| TransitError::DataSource(format!("failed to query static_railways: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    TransitError::DataSource(format!("failed to decode railway row: {}", e))
                })
            })
            .collect()
    }

    async fn fetch_stations(&self) -> Result<HashMap<String, StationRecord>> {
        let filters = select("id,title_en,title_ja,lat,long");
        let rows = self.source.query("static_stations", &filters).await?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let record: StationRecord = serde_json::from_value(row)?;
            out.insert(record.id.clone(), record);
        }
        Ok(out)
    }
}

fn select(columns: &str) -> HashMap<String, String> {
    HashMap::from([("select".to_string(), columns.to_string())])
}

/// Full N×N transfer clique inside every same-name group.
fn add_virtual_transfers(graph: &mut TransitGraph, groups: &[(String, Vec<String>)]) -> usize {
    let mut count = 0;
    for (name, ids) in groups {
        if ids.len() < 2 {
            continue;
        }
        for (i, from) in ids.iter().enumerate() {
            for (j, to) in ids.iter().enumerate() {
                if i == j {
                    continue;
                }
                graph.add_edge(Edge::transfer(from, to, VIRTUAL_TRANSFER_SECONDS));
                count += 1;
            }
        }
        debug!(station = %name, platforms = ids.len(), "Generated virtual transfers");
    }
    count
}
