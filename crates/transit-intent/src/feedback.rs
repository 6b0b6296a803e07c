use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use transit_core::{FeedbackStore, Result};

pub const HELPFUL_DELTA: f64 = 0.12;
pub const UNHELPFUL_DELTA: f64 = -0.08;
pub const WEIGHT_BOUND: f64 = 2.0;

/// Per-tag weights nudged by user helpfulness signals, used to re-rank intent tags.
///
/// Every update runs under one write lock, so concurrent read-modify-write on a
/// key never loses an increment.
#[derive(Debug, Default)]
pub struct FeedbackModel {
    weights: RwLock<HashMap<String, f64>>,
}

fn clamp(weight: f64) -> f64 {
    weight.clamp(-WEIGHT_BOUND, WEIGHT_BOUND)
}

impl FeedbackModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<S: AsRef<str>>(&self, tags: &[S], helpful: bool) {
        let delta = if helpful { HELPFUL_DELTA } else { UNHELPFUL_DELTA };
        let mut weights = self.weights.write();
        for tag in tags {
            let tag = tag.as_ref();
            if tag.is_empty() {
                continue;
            }
            let entry = weights.entry(tag.to_string()).or_insert(0.0);
            *entry = clamp(*entry + delta);
        }
        debug!(tags = tags.len(), helpful, "Applied intent feedback");
    }

    pub fn score(&self, tag: &str) -> f64 {
        self.weights.read().get(tag).copied().unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.weights.read().clone()
    }

    /// Replaces the whole map. Blank keys are dropped and values clamped.
    pub fn restore(&self, weights: HashMap<String, f64>) {
        let restored: HashMap<String, f64> = weights
            .into_iter()
            .filter(|(k, v)| !k.trim().is_empty() && !v.is_nan())
            .map(|(k, v)| (k, clamp(v)))
            .collect();
        *self.weights.write() = restored;
    }

    pub async fn restore_from(&self, store: &dyn FeedbackStore) -> Result<usize> {
        let weights = store.load_weights().await?;
        self.restore(weights);
        let count = self.weights.read().len();
        info!(count, "Restored intent feedback weights");
        Ok(count)
    }

    pub async fn persist_to(&self, store: &dyn FeedbackStore) -> Result<()> {
        let snapshot = self.snapshot();
        store.save_weights(&snapshot).await
    }
}
