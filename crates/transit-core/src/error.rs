use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No path found from {from} to {to}")]
    NoPath { from: String, to: String },

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Status feed error: {0}")]
    StatusFeed(String),

    #[error("Weather feed error: {0}")]
    Weather(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Vector search error: {0}")]
    Vector(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl TransitError {
    /// True for outcomes the cascade treats as a normal miss rather than a fault.
    pub fn is_expected_miss(&self) -> bool {
        matches!(self, TransitError::NoPath { .. } | TransitError::NodeNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, TransitError>;
