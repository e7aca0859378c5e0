//! Per-item timing and a rolling estimate of the time left.

use std::time::Duration;

/// Elapsed-time samples for the items processed so far.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    samples: Vec<Duration>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            samples: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed);
    }

    pub fn completed(&self) -> usize {
        self.samples.len()
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.samples.len())
    }

    /// Mean of the recorded samples, `None` before the first one.
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.samples.iter().sum::<Duration>() / n)
    }

    /// `average × remaining`, reported only once two samples exist.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.samples.len() < 2 {
            return None;
        }
        let remaining = u32::try_from(self.remaining()).ok()?;
        self.average().map(|avg| avg * remaining)
    }
}
