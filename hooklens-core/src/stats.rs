//! Bounded rolling statistics
//!
//! Per-key histories with FIFO eviction, the median baseline built on them,
//! and the shared window of recent events. All of it is owned by a single
//! [`crate::engine::PatternEngine`]; nothing here is global.

use crate::types::Event;
use std::collections::{HashMap, VecDeque};

/// Median of a sample, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Outcome of a baseline query.
///
/// Too few samples is a normal state, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Baseline {
    /// Median of the recent samples
    Ready(f64),
    /// Not enough samples to decide yet
    Insufficient { samples: usize },
}

impl Baseline {
    /// Build a baseline from `samples`, requiring at least `required` of them.
    pub fn from_samples(samples: &[f64], required: usize) -> Self {
        match median(samples) {
            Some(m) if samples.len() >= required => Baseline::Ready(m),
            _ => Baseline::Insufficient {
                samples: samples.len(),
            },
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Baseline::Ready(m) => Some(*m),
            Baseline::Insufficient { .. } => None,
        }
    }
}

/// Ordered, bounded sequence of values. Oldest values are evicted first.
#[derive(Debug, Clone)]
pub struct RollingHistory<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T: Clone> RollingHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, evicting the oldest beyond capacity.
    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.values.iter()
    }

    /// The most recent `window` values, in arrival order.
    pub fn recent(&self, window: usize) -> Vec<T> {
        let skip = self.values.len().saturating_sub(window);
        self.values.iter().skip(skip).cloned().collect()
    }
}

/// Per-key rolling histories of numeric samples.
#[derive(Debug, Clone)]
pub struct RollingStore {
    capacity: usize,
    min_samples: usize,
    histories: HashMap<String, RollingHistory<f64>>,
}

impl RollingStore {
    /// `capacity` values are kept per key; baselines need `min_samples`.
    pub fn new(capacity: usize, min_samples: usize) -> Self {
        Self {
            capacity,
            min_samples,
            histories: HashMap::new(),
        }
    }

    pub fn record(&mut self, key: &str, value: f64) {
        let capacity = self.capacity;
        self.histories
            .entry(key.to_string())
            .or_insert_with(|| RollingHistory::new(capacity))
            .push(value);
    }

    /// Most recent `window` values for `key`, in arrival order.
    pub fn history(&self, key: &str, window: usize) -> Vec<f64> {
        self.histories
            .get(key)
            .map(|h| h.recent(window))
            .unwrap_or_default()
    }

    /// Median of the retained values, insufficient below `min_samples`.
    pub fn baseline(&self, key: &str) -> Baseline {
        self.baseline_with(key, self.capacity, self.min_samples)
    }

    /// Median of the last `window` values, requiring `required` of them.
    pub fn baseline_with(&self, key: &str, window: usize, required: usize) -> Baseline {
        Baseline::from_samples(&self.history(key, window), required)
    }

    pub fn len(&self, key: &str) -> usize {
        self.histories.get(key).map_or(0, RollingHistory::len)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(String::as_str)
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }
}

/// Ring buffer of the most recent events across all keys.
#[derive(Debug, Clone)]
pub struct RecentEvents {
    events: RollingHistory<Event>,
}

impl RecentEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RollingHistory::new(capacity),
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> + ExactSizeIterator {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let mut h = RollingHistory::new(3);
        for v in 1..=5 {
            h.push(v);
            assert!(h.len() <= 3);
        }
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(h.recent(2), vec![4, 5]);
        assert_eq!(h.recent(10), vec![3, 4, 5]);
    }

    #[test]
    fn test_store_baseline_needs_min_samples() {
        let mut store = RollingStore::new(20, 5);
        for _ in 0..4 {
            store.record("Bash", 1.0);
        }
        assert_eq!(
            store.baseline("Bash"),
            Baseline::Insufficient { samples: 4 }
        );
        store.record("Bash", 3.0);
        assert_eq!(store.baseline("Bash"), Baseline::Ready(1.0));
        assert_eq!(
            store.baseline("Read"),
            Baseline::Insufficient { samples: 0 }
        );
    }

    #[test]
    fn test_store_history_window() {
        let mut store = RollingStore::new(20, 5);
        for v in 0..25 {
            store.record("k", v as f64);
        }
        assert_eq!(store.len("k"), 20);
        assert_eq!(store.history("k", 3), vec![22.0, 23.0, 24.0]);
        assert_eq!(
            store.baseline_with("k", 4, 5),
            Baseline::Insufficient { samples: 4 }
        );
    }

    #[test]
    fn test_recent_events_capacity() {
        let mut recent = RecentEvents::new(2);
        for i in 0..3 {
            recent.push(Event::new("tool_use", format!("s{i}"), "t"));
        }
        let ids: Vec<_> = recent.iter().map(|e| e.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }
}
