//! Throughput metering for the transfer loop
//! Rates are in KiB/s and are `None` whenever the measured interval is zero.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Source of "now" for the transfer loop.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Throughput sample for the instantaneous rate window
#[derive(Clone, Debug)]
struct ThroughputSample {
    bytes: u64,
    duration: Duration,
}

/// Number of recent chunks the instantaneous rate is averaged over
pub const DEFAULT_WINDOW: usize = 4;

pub struct ThroughputMeter {
    window: usize,
    samples: VecDeque<ThroughputSample>,
    last_tick: Instant,
}

impl ThroughputMeter {
    pub fn new(start: Instant, window: usize) -> Self {
        let window = window.max(1);
        ThroughputMeter {
            window,
            samples: VecDeque::with_capacity(window),
            last_tick: start,
        }
    }

    /// Record a chunk of `bytes` that completed at `now`
    pub fn record(&mut self, bytes: u64, now: Instant) {
        // Keep only recent samples
        if self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(ThroughputSample {
            bytes,
            duration: now.saturating_duration_since(self.last_tick),
        });
        self.last_tick = now;
    }

    /// Rate over the recent sample window
    pub fn instantaneous_kbps(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        let duration: Duration = self.samples.iter().map(|s| s.duration).sum();
        kbps(bytes, duration)
    }
}

/// `(bytes / 1024) / seconds`, or `None` for a zero interval
pub fn kbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(bytes as f64 / 1024.0 / secs)
    } else {
        None
    }
}
