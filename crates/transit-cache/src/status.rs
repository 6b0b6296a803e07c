// ABOUTME: L2 operational-status cache over an external status feed.
// ABOUTME: Serves the last good snapshot when the feed fails, and errors only before the first success.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use transit_core::{LineStatus, Result, StatusFeed, TransitError};

pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionKind {
    Delay,
    Suspended,
}

impl DisruptionKind {
    pub fn severity(&self) -> u8 {
        match self {
            DisruptionKind::Delay => 2,
            DisruptionKind::Suspended => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptedLine {
    pub railway: String,
    pub railway_id: String,
    pub kind: DisruptionKind,
    pub text: String,
    pub severity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusContext {
    pub has_disruption: bool,
    pub disrupted_lines: Vec<DisruptedLine>,
    pub normal_lines: usize,
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    /// Set when the feed failed and an older snapshot was served.
    pub stale: bool,
}

impl StatusContext {
    pub fn from_statuses(statuses: &[LineStatus], last_updated: DateTime<Utc>) -> Self {
        let mut disrupted = Vec::new();
        let mut normal_lines = 0;
        for s in statuses {
            let kind = match s.status.as_str() {
                "suspended" => DisruptionKind::Suspended,
                "delay" => DisruptionKind::Delay,
                "normal" => {
                    normal_lines += 1;
                    continue;
                }
                _ => continue,
            };
            disrupted.push(DisruptedLine {
                railway: extract_railway_name(&s.line).to_string(),
                railway_id: s.line.clone(),
                kind,
                text: s.text.clone(),
                severity: kind.severity(),
            });
        }
        let summary = summarize(&disrupted);
        Self {
            has_disruption: !disrupted.is_empty(),
            disrupted_lines: disrupted,
            normal_lines,
            summary,
            last_updated,
            stale: false,
        }
    }

    /// Disruption block for the LLM system prompt; empty when all lines run normally.
    pub fn for_system_prompt(&self) -> String {
        if !self.has_disruption {
            return String::new();
        }
        let mut out = String::from("\n⚠️ CURRENT TRAIN DISRUPTIONS:\n");
        for d in &self.disrupted_lines {
            match d.kind {
                DisruptionKind::Suspended => {
                    out.push_str(&format!("- ⛔ {}: SERVICE SUSPENDED - {}\n", d.railway, d.text))
                }
                DisruptionKind::Delay => {
                    out.push_str(&format!("- ⚠️ {}: DELAYS - {}\n", d.railway, d.text))
                }
            }
        }
        out.push_str(
            "\nIMPORTANT: Avoid suggesting routes using suspended lines. Mention delays if recommending affected lines.\n",
        );
        out
    }

    /// Suspended railway IDs, suitable as pathfinder disabled lines.
    pub fn disrupted_railway_ids(&self) -> Vec<String> {
        self.disrupted_lines
            .iter()
            .filter(|d| d.kind == DisruptionKind::Suspended)
            .map(|d| d.railway_id.clone())
            .collect()
    }
}

fn summarize(disrupted: &[DisruptedLine]) -> String {
    if disrupted.is_empty() {
        return "All lines are operating normally.".to_string();
    }
    let names = |kind: DisruptionKind| -> Vec<&str> {
        disrupted
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.railway.as_str())
            .collect()
    };
    let mut parts = Vec::new();
    let suspended = names(DisruptionKind::Suspended);
    if !suspended.is_empty() {
        parts.push(format!("⛔ SUSPENDED: {}", suspended.join(", ")));
    }
    let delayed = names(DisruptionKind::Delay);
    if !delayed.is_empty() {
        parts.push(format!("⚠️ DELAYED: {}", delayed.join(", ")));
    }
    parts.join(" | ")
}

/// `odpt.Railway:TokyoMetro.Ginza` becomes `Ginza`.
pub fn extract_railway_name(railway_id: &str) -> &str {
    match railway_id.rsplit_once('.') {
        Some((_, last)) => last,
        None => railway_id,
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    statuses: Vec<LineStatus>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

pub struct StatusCache {
    feed: Arc<dyn StatusFeed>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: Mutex<()>,
}

impl StatusCache {
    pub fn new(feed: Arc<dyn StatusFeed>) -> Self {
        Self::with_ttl(feed, DEFAULT_STATUS_TTL)
    }

    pub fn with_ttl(feed: Arc<dyn StatusFeed>, ttl: Duration) -> Self {
        Self {
            feed,
            ttl,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    fn fresh(&self) -> Option<StatusContext> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| StatusContext::from_statuses(&s.statuses, s.fetched_at_utc))
    }

    /// Returns the current status, refreshing from the feed once the TTL has passed.
    ///
    /// Concurrent callers share a single refresh. A feed error falls back to the
    /// previous snapshot (marked stale) and is only returned when no snapshot exists.
    pub async fn fetch(&self) -> Result<StatusContext> {
        if let Some(ctx) = self.fresh() {
            return Ok(ctx);
        }

        let _guard = self.refresh.lock().await;
        if let Some(ctx) = self.fresh() {
            return Ok(ctx);
        }

        match self.feed.fetch_train_status().await {
            Ok(statuses) => {
                let now = Utc::now();
                let ctx = StatusContext::from_statuses(&statuses, now);
                debug!(
                    lines = statuses.len(),
                    disrupted = ctx.disrupted_lines.len(),
                    "Refreshed line status"
                );
                *self.snapshot.write() = Some(Snapshot {
                    statuses,
                    fetched_at: Instant::now(),
                    fetched_at_utc: now,
                });
                Ok(ctx)
            }
            Err(e) => {
                let previous = self.snapshot.read().clone();
                match previous {
                    Some(s) => {
                        warn!(error = %e, "Status feed failed, serving last snapshot");
                        let mut ctx = StatusContext::from_statuses(&s.statuses, s.fetched_at_utc);
                        ctx.stale = true;
                        Ok(ctx)
                    }
                    None => Err(TransitError::StatusFeed(format!(
                        "failed to fetch line status: {}",
                        e
                    ))),
                }
            }
        }
    }
}
