use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const TOOL_TRACE_PREFIX: &str = "[[TOOL_TRACE]]";
pub const DECISION_TRACE_PREFIX: &str = "[[DECISION_TRACE]]";
pub const STRUCTURED_DATA_PREFIX: &str = "[[STRUCTURED_DATA]]";

/// Events pushed to the client for one request. The stream always ends with `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Meta {
        query_id: Uuid,
        trace_id: String,
    },
    /// A chunk of answer text
    Content {
        text: String,
    },
    ToolTrace {
        payload: Value,
    },
    DecisionTrace {
        payload: Value,
    },
    StructuredData {
        payload: Value,
    },
    Done {
        /// Tier that produced the answer, or `fallback`
        tier: String,
        latency_ms: u64,
    },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content { text: text.into() }
    }

    /// Server-sent event name for the transport layer.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Meta { .. } => "meta",
            StreamEvent::Content { .. } => "telem",
            StreamEvent::ToolTrace { .. } => "tool_trace",
            StreamEvent::DecisionTrace { .. } => "decision_trace",
            StreamEvent::StructuredData { .. } => "structured_data",
            StreamEvent::Done { .. } => "done",
        }
    }

    /// Splits prefixed agent chunks into typed events; anything else is answer text.
    pub fn from_agent_chunk(chunk: &str) -> Self {
        let parse = |rest: &str| {
            serde_json::from_str::<Value>(rest.trim()).unwrap_or_else(|_| Value::String(rest.to_string()))
        };
        if let Some(rest) = chunk.strip_prefix(TOOL_TRACE_PREFIX) {
            StreamEvent::ToolTrace { payload: parse(rest) }
        } else if let Some(rest) = chunk.strip_prefix(DECISION_TRACE_PREFIX) {
            StreamEvent::DecisionTrace { payload: parse(rest) }
        } else if let Some(rest) = chunk.strip_prefix(STRUCTURED_DATA_PREFIX) {
            StreamEvent::StructuredData { payload: parse(rest) }
        } else {
            StreamEvent::content(chunk)
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Content { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }
}

/// Meta returned together with the receiver for stream consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResponseMeta {
    pub query_id: Uuid,
    pub trace_id: String,
}

/// Adapts the event receiver into a `futures::Stream`.
pub fn into_stream(rx: mpsc::Receiver<StreamEvent>) -> impl Stream<Item = StreamEvent> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|ev| (ev, rx)) })
}

/// Concatenated answer text from a list of events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events.iter().filter_map(StreamEvent::text).collect()
}
