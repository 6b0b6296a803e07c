// ABOUTME: Per-tier attempt/success counters and latency percentiles for the resolution cascade
// ABOUTME: Shared across request workers behind a single mutex; readers get a deep copy

use parking_lot::Mutex;
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::{Result, TransitError};

const MAX_LATENCY_SAMPLES: usize = 1000;

/// One tier of the resolution cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::L1, Tier::L2, Tier::L3, Tier::L4, Tier::L5];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::L1 => "L1",
            Tier::L2 => "L2",
            Tier::L3 => "L3",
            Tier::L4 => "L4",
            Tier::L5 => "L5",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct TierState {
    attempts: u64,
    successes: u64,
    latencies_ms: Vec<f64>,
}

impl TierState {
    fn push_latency(&mut self, ms: f64) {
        self.latencies_ms.push(ms);
        if self.latencies_ms.len() > MAX_LATENCY_SAMPLES {
            let half = self.latencies_ms.len() / 2;
            self.latencies_ms.drain(..half);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub attempts: u64,
    pub successes: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tiers: BTreeMap<String, TierStats>,
    pub counters: BTreeMap<String, i64>,
}

impl MetricsSnapshot {
    pub fn tier(&self, tier: Tier) -> TierStats {
        self.tiers.get(tier.as_str()).cloned().unwrap_or_default()
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    tiers: HashMap<Tier, TierState>,
    counters: HashMap<String, i64>,
}

/// Collector injected into the orchestrator; cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_layer_attempt(&self, tier: Tier) {
        let mut inner = self.inner.lock();
        inner.tiers.entry(tier).or_default().attempts += 1;
    }

    pub fn record_layer_success(&self, tier: Tier, elapsed: Duration) {
        let mut inner = self.inner.lock();
        let state = inner.tiers.entry(tier).or_default();
        state.successes += 1;
        state.push_latency(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn inc_counter(&self, name: &str, delta: i64) {
        let mut inner = self.inner.lock();
        *inner.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn record_intent_ladder(&self, faq_hit: bool, require_deep: bool) {
        let mut inner = self.inner.lock();
        *inner
            .counters
            .entry("intent_ladder_total".to_string())
            .or_insert(0) += 1;
        if faq_hit {
            *inner
                .counters
                .entry("intent_ladder_faq_hit".to_string())
                .or_insert(0) += 1;
        }
        if require_deep {
            *inner
                .counters
                .entry("intent_ladder_deep".to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let mut tiers = BTreeMap::new();
        for tier in Tier::ALL {
            let stats = match inner.tiers.get(&tier) {
                Some(state) => TierStats {
                    attempts: state.attempts,
                    successes: state.successes,
                    avg_latency_ms: mean(&state.latencies_ms),
                    p95_latency_ms: p95(&state.latencies_ms),
                    samples: state.latencies_ms.len(),
                },
                None => TierStats::default(),
            };
            tiers.insert(tier.as_str().to_string(), stats);
        }
        let counters = inner
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        MetricsSnapshot { tiers, counters }
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn p95(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() as f64) * 0.95) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn prom_err(e: prometheus::Error) -> TransitError {
    TransitError::InvalidOperation(format!("prometheus: {}", e))
}

/// Renders a snapshot in the Prometheus text exposition format.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> Result<String> {
    let registry = Registry::new();

    let attempts = IntGaugeVec::new(
        Opts::new("transit_layer_attempts", "Resolution attempts per tier"),
        &["tier"],
    )
    .map_err(prom_err)?;
    let successes = IntGaugeVec::new(
        Opts::new("transit_layer_successes", "Terminating resolutions per tier"),
        &["tier"],
    )
    .map_err(prom_err)?;
    let latency = GaugeVec::new(
        Opts::new("transit_layer_latency_ms", "Tier latency over recent samples"),
        &["tier", "stat"],
    )
    .map_err(prom_err)?;
    let counters = IntGaugeVec::new(
        Opts::new("transit_counter", "Cross-cutting request counters"),
        &["name"],
    )
    .map_err(prom_err)?;

    registry
        .register(Box::new(attempts.clone()))
        .map_err(prom_err)?;
    registry
        .register(Box::new(successes.clone()))
        .map_err(prom_err)?;
    registry
        .register(Box::new(latency.clone()))
        .map_err(prom_err)?;
    registry
        .register(Box::new(counters.clone()))
        .map_err(prom_err)?;

    for (tier, stats) in &snapshot.tiers {
        attempts
            .with_label_values(&[tier.as_str()])
            .set(stats.attempts as i64);
        successes
            .with_label_values(&[tier.as_str()])
            .set(stats.successes as i64);
        latency
            .with_label_values(&[tier.as_str(), "avg"])
            .set(stats.avg_latency_ms);
        latency
            .with_label_values(&[tier.as_str(), "p95"])
            .set(stats.p95_latency_ms);
    }
    for (name, value) in &snapshot.counters {
        counters.with_label_values(&[name.as_str()]).set(*value);
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(prom_err)?;
    String::from_utf8(buffer).map_err(|e| TransitError::InvalidOperation(e.to_string()))
}
