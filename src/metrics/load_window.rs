use std::collections::VecDeque;
use std::time::Duration;

/// Fixed-size window of the most recent load times.
#[derive(Debug, Clone)]
pub struct LoadTimeWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl LoadTimeWindow {
    /// Keep at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, dropping the oldest when full.
    pub fn record(&mut self, load_time: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(load_time);
    }

    /// Mean of the retained samples in milliseconds, 0.0 when empty.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self.samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        total / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
