use crate::stream::StreamEvent;
use serde_json::Value;
use tokio::sync::mpsc;

/// Outbound side of a request stream. Once the consumer is gone every send is a no-op.
#[derive(Debug)]
pub(crate) struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
    closed: bool,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx, closed: false }
    }

    pub(crate) fn sender(&self) -> &mpsc::Sender<StreamEvent> {
        &self.tx
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed || self.tx.is_closed()
    }

    pub(crate) async fn send(&mut self, event: StreamEvent) {
        if self.closed {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.closed = true;
        }
    }

    pub(crate) async fn text(&mut self, text: impl Into<String>) {
        self.send(StreamEvent::content(text)).await;
    }

    pub(crate) async fn structured(&mut self, payload: Value) {
        self.send(StreamEvent::StructuredData { payload }).await;
    }

    pub(crate) async fn tool_trace(&mut self, payload: Value) {
        self.send(StreamEvent::ToolTrace { payload }).await;
    }

    pub(crate) async fn decision_trace(&mut self, payload: Value) {
        self.send(StreamEvent::DecisionTrace { payload }).await;
    }
}
