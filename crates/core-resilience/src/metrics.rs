//! Bounded sample windows and percentile helpers
//!
//! Samples are kept only for reporting. Nothing in here feeds back into
//! admission decisions.

use std::collections::VecDeque;
use std::time::Duration;

/// Fixed-capacity FIFO of samples. Pushing into a full window evicts the oldest.
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> SampleWindow<T> {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest one when full
    pub fn push(&mut self, sample: T) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
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

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}

/// Nearest-rank percentile over an ascending slice.
///
/// `p` is a fraction in `0.0..=1.0`. The rank is `ceil(p * N) - 1`, clamped
/// to the slice bounds. Returns `None` for an empty slice.
pub fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}

/// Arithmetic mean of a set of durations
pub fn mean<'a>(samples: impl IntoIterator<Item = &'a Duration>) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut count: u32 = 0;
    for sample in samples {
        total += *sample;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count)
    }
}

/// p50/p95/p99 of a set of response times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Percentiles {
    pub p50: Option<Duration>,
    pub p95: Option<Duration>,
    pub p99: Option<Duration>,
}

impl Percentiles {
    /// Sort a copy of the samples and pick the three ranks
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Duration>) -> Self {
        let mut sorted: Vec<Duration> = samples.into_iter().copied().collect();
        sorted.sort_unstable();
        Self {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}
