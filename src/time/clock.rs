//! Software clock advanced by monotonic elapsed time
//!
//! The clock holds broken-down UTC fields and a millisecond accumulator. It is
//! set from a decoded time frame and then carried forward by `tick`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::calendar::ClockInstant;

/// Source of monotonic milliseconds
///
/// The software clock never reads wall time; it only measures how much time
/// has passed since it was set or last ticked.
pub trait TimeBase {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// Monotonic time base backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeBase {
    origin: Instant,
}

impl MonotonicTimeBase {
    /// Creates a time base with its origin at the current instant
    pub fn new() -> Self {
        MonotonicTimeBase {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeBase for MonotonicTimeBase {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced time base for simulations and tests
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeBase {
    now: Arc<AtomicU64>,
}

impl ManualTimeBase {
    /// Creates a time base reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Sets the current reading
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl TimeBase for ManualTimeBase {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Read-only view of a clock used by the time server
pub trait TimeReading {
    /// Whether the clock has ever been set
    fn is_set(&self) -> bool;
    /// Seconds since 1970
    fn epoch_seconds(&self) -> u32;
    /// Milliseconds within the current second
    fn subsecond_ms(&self) -> u16;
}

/// Free-running software clock holding UTC between radio acquisitions
#[derive(Debug, Clone)]
pub struct ClockModel<T: TimeBase = MonotonicTimeBase> {
    /// Current UTC instant
    instant: ClockInstant,
    /// Has the time been set?
    is_set: bool,
    /// Time base reading when the clock was set
    set_at_ms: u64,
    /// Time base reading at the last tick
    last_tick_ms: u64,
    /// Milliseconds accumulated toward the next second (0-999)
    accum_ms: u64,
    /// Monotonic time source
    time_base: T,
}

impl ClockModel<MonotonicTimeBase> {
    /// Creates an unset clock on the system monotonic clock
    pub fn new() -> Self {
        Self::with_time_base(MonotonicTimeBase::new())
    }
}

impl Default for ClockModel<MonotonicTimeBase> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeBase> ClockModel<T> {
    /// Creates an unset clock on the given time base
    pub fn with_time_base(time_base: T) -> Self {
        ClockModel {
            instant: ClockInstant::EPOCH,
            is_set: false,
            set_at_ms: 0,
            last_tick_ms: 0,
            accum_ms: 0,
            time_base,
        }
    }

    /// Sets the current UTC time, storing the fields as given
    pub fn set_instant(&mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) {
        self.instant = ClockInstant::new(year, month, day, hour, minute, second);

        let now = self.time_base.now_ms();
        self.last_tick_ms = now;
        self.set_at_ms = now;
        self.accum_ms = 0;
        self.is_set = true;

        info!(utc = %self.instant, "Clock set");
    }

    /// Sets the current UTC time from seconds since 1970
    pub fn set_from_epoch_seconds(&mut self, epoch_seconds: u32) {
        let i = ClockInstant::from_epoch_seconds(epoch_seconds);
        self.set_instant(i.year, i.month, i.day, i.hour, i.minute, i.second);
    }

    /// Advances the clock by elapsed milliseconds
    ///
    /// Does nothing until the clock has been set.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if !self.is_set {
            return;
        }

        self.accum_ms += elapsed_ms;
        self.last_tick_ms = self.time_base.now_ms();

        while self.accum_ms >= 1000 {
            self.accum_ms -= 1000;
            self.instant.increment_second();
        }
    }

    /// Current UTC instant
    pub fn get_utc(&self) -> ClockInstant {
        self.instant
    }

    /// Current local time for a UTC offset, plus one hour when DST is active
    pub fn get_local(&self, offset_hours: i8, dst_active: bool) -> ClockInstant {
        let offset = offset_hours as i32 + if dst_active { 1 } else { 0 };
        self.instant.add_hours(offset)
    }

    /// Seconds since 1970 (wraps in 2106)
    pub fn get_epoch_seconds(&self) -> u32 {
        self.instant.epoch_seconds()
    }

    /// Milliseconds within the current second, without advancing the clock
    pub fn get_subsecond_ms(&self) -> u16 {
        if !self.is_set {
            return 0;
        }
        let since_tick = self.time_base.now_ms().saturating_sub(self.last_tick_ms);
        ((self.accum_ms + since_tick) % 1000) as u16
    }

    /// Whole seconds since the clock was last set
    pub fn get_seconds_since_set(&self) -> u32 {
        if !self.is_set {
            return 0;
        }
        (self.time_base.now_ms().saturating_sub(self.set_at_ms) / 1000) as u32
    }

    /// Whether the clock has been set at least once
    pub fn is_set(&self) -> bool {
        self.is_set
    }

    /// The time base driving this clock
    pub fn time_base(&self) -> &T {
        &self.time_base
    }
}

impl<T: TimeBase> TimeReading for ClockModel<T> {
    fn is_set(&self) -> bool {
        self.is_set
    }

    fn epoch_seconds(&self) -> u32 {
        self.get_epoch_seconds()
    }

    fn subsecond_ms(&self) -> u16 {
        self.get_subsecond_ms()
    }
}
