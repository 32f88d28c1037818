//! Registry of monotonic counters keyed by metric name.
//!
//! Metric values are truncated toward zero before they are added; the record emitted for the
//! metric keeps the exact value. Counters survive re-initialization of the bridge and are never
//! reset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Convert a metric value into a counter delta.
///
/// Truncates toward zero. Returns `None` for non-finite values and for anything that truncates
/// to zero or below, since counters only go up.
pub fn truncate_delta(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    // `as` saturates at u64::MAX for huge values.
    Some(value.trunc() as u64)
}

/// In-memory counter registry backed by an RwLock and per-name atomics.
#[derive(Default, Clone, Debug)]
pub struct CounterRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<AtomicU64>>>>,
}

impl CounterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the counter `name`, creating it on first use. Returns the new total.
    ///
    /// Saturates at `u64::MAX`.
    pub fn add(&self, name: &str, delta: u64) -> u64 {
        let counter = self.counter(name);
        let previous = counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_add(delta)))
            .unwrap_or_else(|current| current);
        previous.saturating_add(delta)
    }

    /// Current total for `name` (0 if never incremented).
    pub fn get(&self, name: &str) -> u64 {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(name).map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Totals sorted by name.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, u64)> =
            map.iter().map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed))).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn counter(&self, name: &str) -> Arc<AtomicU64> {
        if let Some(existing) =
            self.inner.read().unwrap_or_else(PoisonError::into_inner).get(name)
        {
            return existing.clone();
        }
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string()).or_insert_with(|| Arc::new(AtomicU64::new(0))).clone()
    }
}
