use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row-oriented access to the station and railway tables used to build the graph.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn query(
        &self,
        table: &str,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>>;
}

/// Operational status of a single railway line as reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStatus {
    /// Railway identifier, e.g. `odpt.Railway:TokyoMetro.Ginza`
    pub line: String,
    /// Normalized status: `normal`, `delay` or `suspended`
    pub status: String,
    #[serde(default)]
    pub text: String,
}

#[async_trait]
pub trait StatusFeed: Send + Sync {
    async fn fetch_train_status(&self) -> Result<Vec<LineStatus>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub is_raining: bool,
    #[serde(default)]
    pub condition: String,
}

#[async_trait]
pub trait WeatherFeed: Send + Sync {
    async fn get_current_weather(&self) -> Result<CurrentWeather>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f64,
    pub node_ids: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: String,
    pub content: String,
    pub similarity: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(&self, embedding: &[f32], opts: &SearchOptions) -> Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn load_weights(&self) -> Result<HashMap<String, f64>>;
    async fn save_weights(&self, weights: &HashMap<String, f64>) -> Result<()>;
}

/// Long-lived preference memory for a user or guest session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub frequent_stations: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
}

impl MemoryProfile {
    /// Renders the profile as a system context block, or `None` when there is nothing worth sending.
    pub fn context_block(&self) -> Option<String> {
        let summary = self.summary.trim();
        if summary.is_empty() && self.preferences.is_empty() && self.goals.is_empty() {
            return None;
        }

        let mut out = String::from("[Memory Context]\n");
        if !summary.is_empty() {
            out.push_str(&format!("Summary: {}\n", summary));
        }
        if !self.preferences.is_empty() {
            out.push_str(&format!("Preferences: {}\n", self.preferences.join("; ")));
        }
        if !self.constraints.is_empty() {
            out.push_str(&format!("Constraints: {}\n", self.constraints.join("; ")));
        }
        if !self.goals.is_empty() {
            out.push_str(&format!("Goals: {}\n", self.goals.join("; ")));
        }
        if !self.frequent_stations.is_empty() {
            out.push_str(&format!(
                "Frequent Stations: {}\n",
                self.frequent_stations.join(", ")
            ));
        }
        out.push_str("Use this only as preference context, prioritize current request.");
        Some(out)
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load_profile(&self, user_id: &str, session_id: &str)
        -> Result<Option<MemoryProfile>>;
    async fn save_profile(&self, profile: &MemoryProfile) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_has_no_context_block() {
        let profile = MemoryProfile {
            constraints: vec!["stroller".to_string()],
            ..Default::default()
        };
        assert!(profile.context_block().is_none());
    }

    #[test]
    fn profile_context_block_lists_sections() {
        let profile = MemoryProfile {
            summary: "Visiting for a week".to_string(),
            preferences: vec!["fewer transfers".to_string(), "no taxis".to_string()],
            frequent_stations: vec!["上野".to_string(), "Ginza".to_string()],
            ..Default::default()
        };
        let block = profile.context_block().unwrap();
        assert!(block.starts_with("[Memory Context]\n"));
        assert!(block.contains("Preferences: fewer transfers; no taxis"));
        assert!(block.contains("Frequent Stations: 上野, Ginza"));
        assert!(!block.contains("Goals:"));
    }
}
