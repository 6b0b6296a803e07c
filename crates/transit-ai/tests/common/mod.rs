#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use transit_ai::{Clock, CompletionAgent, Message, RequestContext, StreamEvent};
use transit_core::{
    CurrentWeather, FeedbackStore, LineStatus, MemoryProfile, MemoryStore, Result, StatusFeed, TransitError,
    WeatherFeed,
};
use transit_graph::{Edge, Node, Pathfinder, TransitGraph};

pub const GINZA: &str = "odpt.Railway:TokyoMetro.Ginza";

pub fn fixed_clock(hour: u32) -> Clock {
    Arc::new(move || -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
            .unwrap()
    })
}

/// Ueno to Asakusa on the Ginza line, two minutes per hop.
pub fn ginza_pathfinder() -> Arc<Pathfinder> {
    let mut g = TransitGraph::new();
    let stations = [
        ("Ueno", "上野"),
        ("Inaricho", "稲荷町"),
        ("Tawaramachi", "田原町"),
        ("Asakusa", "浅草"),
    ];
    for (en, ja) in stations {
        g.add_node(
            Node::new(format!("odpt.Station:TokyoMetro.Ginza.{}", en))
                .with_names(ja, en)
                .with_railway(GINZA),
        );
    }
    for pair in stations.windows(2) {
        let a = format!("odpt.Station:TokyoMetro.Ginza.{}", pair[0].0);
        let b = format!("odpt.Station:TokyoMetro.Ginza.{}", pair[1].0);
        g.add_edge(Edge::train(a.clone(), b.clone(), GINZA, 120.0));
        g.add_edge(Edge::train(b, a, GINZA, 120.0));
    }
    Arc::new(Pathfinder::new(Arc::new(g)))
}

/// Drains the stream until the engine closes it.
pub async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

pub fn done_tier(events: &[StreamEvent]) -> &str {
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1, "expected exactly one Done event");
    match events.last() {
        Some(StreamEvent::Done { tier, .. }) => tier,
        other => panic!("stream did not end with Done: {:?}", other),
    }
}

pub fn structured(events: &[StreamEvent]) -> Vec<&serde_json::Value> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::StructuredData { payload } => Some(payload),
            _ => None,
        })
        .collect()
}

pub fn decision_traces<'a>(events: &'a [StreamEvent], kind: &str) -> Vec<&'a serde_json::Value> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::DecisionTrace { payload } if payload["type"] == kind => Some(payload),
            _ => None,
        })
        .collect()
}

pub fn tool_traces<'a>(events: &'a [StreamEvent], tool: &str) -> Vec<&'a serde_json::Value> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolTrace { payload } if payload["tool"] == tool => Some(payload),
            _ => None,
        })
        .collect()
}

/// Agent that streams fixed chunks and remembers what it was sent.
pub struct ScriptedAgent {
    name: &'static str,
    chunks: Vec<String>,
    pub calls: AtomicUsize,
    pub last_messages: Mutex<Vec<Message>>,
}

impl ScriptedAgent {
    pub fn new(name: &'static str, chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionAgent for ScriptedAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn provider(&self) -> &str {
        "scripted"
    }

    async fn process(&self, messages: Vec<Message>, _ctx: RequestContext) -> Result<mpsc::Receiver<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock() = messages;
        let (tx, rx) = mpsc::channel(16);
        let chunks = self.chunks.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Agent that sends one chunk and then never finishes.
pub struct StallingAgent;

#[async_trait]
impl CompletionAgent for StallingAgent {
    fn name(&self) -> &str {
        "general"
    }

    async fn process(&self, _messages: Vec<Message>, _ctx: RequestContext) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send("Thinking about your trip".to_string()).await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(tx);
        });
        Ok(rx)
    }
}

/// Status feed that succeeds `successes` times and fails afterwards.
pub struct FlakyStatusFeed {
    statuses: Vec<LineStatus>,
    successes: usize,
    pub calls: AtomicUsize,
}

impl FlakyStatusFeed {
    pub fn ginza_suspended(successes: usize) -> Arc<Self> {
        Arc::new(Self {
            statuses: vec![LineStatus {
                line: GINZA.to_string(),
                status: "suspended".to_string(),
                text: "Signal failure".to_string(),
            }],
            successes,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StatusFeed for FlakyStatusFeed {
    async fn fetch_train_status(&self) -> Result<Vec<LineStatus>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.successes {
            Ok(self.statuses.clone())
        } else {
            Err(TransitError::StatusFeed("upstream unavailable".to_string()))
        }
    }
}

pub struct FixedWeather(pub CurrentWeather);

#[async_trait]
impl WeatherFeed for FixedWeather {
    async fn get_current_weather(&self) -> Result<CurrentWeather> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    pub weights: Mutex<HashMap<String, f64>>,
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn load_weights(&self) -> Result<HashMap<String, f64>> {
        Ok(self.weights.lock().clone())
    }

    async fn save_weights(&self, weights: &HashMap<String, f64>) -> Result<()> {
        *self.weights.lock() = weights.clone();
        Ok(())
    }
}

pub struct SingleProfileMemory(pub MemoryProfile);

#[async_trait]
impl MemoryStore for SingleProfileMemory {
    async fn load_profile(&self, user_id: &str, _session_id: &str) -> Result<Option<MemoryProfile>> {
        Ok((user_id == self.0.user_id).then(|| self.0.clone()))
    }

    async fn save_profile(&self, _profile: &MemoryProfile) -> Result<()> {
        Ok(())
    }
}
