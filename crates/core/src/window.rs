//! Fixed-capacity ring buffer with an incrementally maintained average.

/// Bounded history of recent samples.
///
/// Pushing into a full window evicts the oldest sample. The running sum is
/// updated incrementally so `average` is O(1) and the buffer never reallocates
/// after construction.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: Vec<f64>,
    capacity: usize,
    head: usize,
    sum: f64,
}

impl SlidingWindow {
    /// Create an empty window. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            sum: 0.0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append a sample, evicting the oldest when full. Non-finite samples are ignored.
    pub fn push(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            self.sum += sample;
            return;
        }
        let evicted = std::mem::replace(&mut self.samples[self.head], sample);
        self.sum += sample - evicted;
        self.head = (self.head + 1) % self.capacity;
        // Re-sum once per wrap so floating point drift cannot accumulate.
        if self.head == 0 {
            self.sum = self.samples.iter().sum();
        }
    }

    /// Mean of the retained samples, `None` when empty.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as f64)
        }
    }

    /// Mean of the retained samples, or `fallback` when empty.
    pub fn average_or(&self, fallback: f64) -> f64 {
        self.average().unwrap_or(fallback)
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else if self.samples.len() < self.capacity {
            self.samples.last().copied()
        } else {
            let idx = (self.head + self.capacity - 1) % self.capacity;
            Some(self.samples[idx])
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.head = 0;
        self.sum = 0.0;
    }
}
