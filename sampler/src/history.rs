//! Rolling per-metric history used to render trend sparklines

use std::collections::{BTreeMap, VecDeque};

/// Default number of samples kept per metric: two minutes at a two second interval
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// A fixed-capacity FIFO of the most recent samples, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct RollingHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a sample, evicting the oldest one when at capacity
    pub fn append(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Copy of the samples in chronological order, newest last
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Largest sample currently held
    pub fn peak(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// One [`RollingHistory`] per history key, created on first sample
#[derive(Debug, Clone, Default)]
pub struct MetricHistories {
    histories: BTreeMap<String, RollingHistory>,
    capacity: usize,
}

impl MetricHistories {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: BTreeMap::new(),
            capacity,
        }
    }

    pub fn record(&mut self, key: &str, value: f64) {
        let capacity = self.capacity;
        self.histories
            .entry(key.to_string())
            .or_insert_with(|| RollingHistory::new(capacity))
            .append(value);
    }

    pub fn get(&self, key: &str) -> Option<&RollingHistory> {
        self.histories.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(String::as_str)
    }

    /// Read-only copy of every history, suitable for publishing to subscribers
    pub fn to_values(&self) -> BTreeMap<String, Vec<f64>> {
        self.histories
            .iter()
            .map(|(key, history)| (key.clone(), history.values()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
