use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Train,
    Transfer,
    Walk,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeType::Train => "train",
            EdgeType::Transfer => "transfer",
            EdgeType::Walk => "walk",
        };
        f.write_str(s)
    }
}

/// Cost attributes of a single hop. Only `time_seconds` feeds the search weight;
/// the rest is carried for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepCost {
    pub time_seconds: f64,
    pub fare_ic: Option<u32>,
    pub fare_ticket: Option<u32>,
    pub comfort_penalty: f64,
    pub weather_penalty: f64,
}

impl DeepCost {
    pub fn seconds(time_seconds: f64) -> Self {
        Self {
            time_seconds,
            ..Default::default()
        }
    }
}

/// Directed connection between two stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    /// Railway the hop runs on; set for train edges
    pub line_id: Option<String>,
    pub cost: DeepCost,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type,
            line_id: None,
            cost: DeepCost::default(),
        }
    }

    pub fn train(
        from: impl Into<String>,
        to: impl Into<String>,
        line_id: impl Into<String>,
        time_seconds: f64,
    ) -> Self {
        Self::new(from, to, EdgeType::Train)
            .with_line(line_id)
            .with_time(time_seconds)
    }

    pub fn transfer(from: impl Into<String>, to: impl Into<String>, time_seconds: f64) -> Self {
        Self::new(from, to, EdgeType::Transfer).with_time(time_seconds)
    }

    pub fn walk(from: impl Into<String>, to: impl Into<String>, time_seconds: f64) -> Self {
        Self::new(from, to, EdgeType::Walk).with_time(time_seconds)
    }

    pub fn with_line(mut self, line_id: impl Into<String>) -> Self {
        self.line_id = Some(line_id.into());
        self
    }

    pub fn with_time(mut self, time_seconds: f64) -> Self {
        self.cost.time_seconds = time_seconds;
        self
    }
}
