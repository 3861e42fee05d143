//! Rolling reception quality histogram
//!
//! Counts successful acquisitions per hour over the last 48 hours. Aging is
//! driven by the number of `hourly_tick` calls, not by wall time, so an unset
//! clock never stalls the histogram.

use serde::{Deserialize, Serialize};

use super::clock::{MonotonicTimeBase, TimeBase};

/// Number of hourly slots kept
pub const HISTORY_HOURS: usize = 48;

/// Ticks per slot
pub const SECONDS_PER_HOUR: u32 = 3600;

/// Snapshot of the tracker for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Oldest first, the last entry is the current hour
    pub hourly: Vec<u8>,
    pub max_value: u8,
    pub success_rate: u8,
    pub recent_successes: u32,
    pub total_successes: u32,
    pub total_attempts: u32,
    pub last_success_ms: Option<u64>,
    pub last_attempt_ms: Option<u64>,
}

/// 48-hour histogram of successful acquisitions plus lifetime counters
#[derive(Debug, Clone)]
pub struct ReceptionQualityTracker<T: TimeBase = MonotonicTimeBase> {
    buckets: [u8; HISTORY_HOURS],
    /// Ring index of the oldest slot
    oldest: usize,
    seconds_in_hour: u32,
    total_successes: u32,
    total_attempts: u32,
    last_success_ms: Option<u64>,
    last_attempt_ms: Option<u64>,
    time_base: T,
}

impl ReceptionQualityTracker<MonotonicTimeBase> {
    /// Creates an empty tracker on the system monotonic clock
    pub fn new() -> Self {
        Self::with_time_base(MonotonicTimeBase::new())
    }
}

impl Default for ReceptionQualityTracker<MonotonicTimeBase> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeBase> ReceptionQualityTracker<T> {
    /// Creates an empty tracker on the given time base
    pub fn with_time_base(time_base: T) -> Self {
        ReceptionQualityTracker {
            buckets: [0; HISTORY_HOURS],
            oldest: 0,
            seconds_in_hour: 0,
            total_successes: 0,
            total_attempts: 0,
            last_success_ms: None,
            last_attempt_ms: None,
            time_base,
        }
    }

    /// Clears all slots, counters and timestamps
    pub fn reset(&mut self) {
        self.buckets = [0; HISTORY_HOURS];
        self.oldest = 0;
        self.seconds_in_hour = 0;
        self.total_successes = 0;
        self.total_attempts = 0;
        self.last_success_ms = None;
        self.last_attempt_ms = None;
    }

    /// Records the outcome of one acquisition attempt
    pub fn record_attempt(&mut self, success: bool) {
        let now = self.time_base.now_ms();
        self.total_attempts = self.total_attempts.saturating_add(1);
        self.last_attempt_ms = Some(now);

        if success {
            self.total_successes = self.total_successes.saturating_add(1);
            self.last_success_ms = Some(now);
            let current = self.current_index();
            self.buckets[current] = self.buckets[current].saturating_add(1);
        }
    }

    /// Called once per second; ages the histogram every hour
    pub fn hourly_tick(&mut self) {
        self.seconds_in_hour += 1;
        if self.seconds_in_hour < SECONDS_PER_HOUR {
            return;
        }
        self.seconds_in_hour = 0;

        // The oldest slot becomes the new current hour
        self.buckets[self.oldest] = 0;
        self.oldest = (self.oldest + 1) % HISTORY_HOURS;
    }

    /// Hourly success counts, oldest first
    pub fn history_data(&self) -> [u8; HISTORY_HOURS] {
        let mut out = [0u8; HISTORY_HOURS];
        for (slot, value) in out.iter_mut().zip(self.iter()) {
            *slot = value;
        }
        out
    }

    /// Iterates the hourly counts, oldest first
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..HISTORY_HOURS).map(move |i| self.buckets[(self.oldest + i) % HISTORY_HOURS])
    }

    /// Largest hourly count, at least 1 so it can scale a chart
    pub fn max_value(&self) -> u8 {
        self.buckets.iter().copied().max().unwrap_or(0).max(1)
    }

    /// Lifetime success percentage, 0 before any attempt
    pub fn success_rate(&self) -> u8 {
        if self.total_attempts == 0 {
            return 0;
        }
        (self.total_successes as u64 * 100 / self.total_attempts as u64) as u8
    }

    /// Successes inside the 48-hour window
    pub fn recent_success_count(&self) -> u32 {
        self.buckets.iter().map(|&b| b as u32).sum()
    }

    pub fn total_success_count(&self) -> u32 {
        self.total_successes
    }

    pub fn total_attempt_count(&self) -> u32 {
        self.total_attempts
    }

    /// Time base reading of the last success
    pub fn last_success_ms(&self) -> Option<u64> {
        self.last_success_ms
    }

    /// Time base reading of the last attempt
    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }

    /// Serializable snapshot
    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            hourly: self.iter().collect(),
            max_value: self.max_value(),
            success_rate: self.success_rate(),
            recent_successes: self.recent_success_count(),
            total_successes: self.total_successes,
            total_attempts: self.total_attempts,
            last_success_ms: self.last_success_ms,
            last_attempt_ms: self.last_attempt_ms,
        }
    }

    fn current_index(&self) -> usize {
        (self.oldest + HISTORY_HOURS - 1) % HISTORY_HOURS
    }
}
