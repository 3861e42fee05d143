use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::{Config, ReceptionMode, Result};
use crate::network::TimeDistributionServer;
use crate::time::{
    ClockInstant, ClockModel, DstStatus, MonotonicTimeBase, ReceivedTime,
    ReceptionQualityTracker, TimeBase, TimeReceiver,
};
use super::acquisition::{AcquisitionAttempt, AcquisitionPoll};

/// What a scheduler sees when deciding whether to start an attempt
#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext {
    /// Monotonic milliseconds
    pub now_ms: u64,
    /// Local time, `None` until the clock has been set
    pub local_time: Option<ClockInstant>,
    /// Seconds since the last successful acquisition
    pub seconds_since_set: u32,
}

/// Decides when to listen for the time code
///
/// Policies (night-only reception, retry backoff) live outside the crate.
pub trait AcquisitionScheduler {
    /// Returns an antenna mode when an attempt should start now
    fn next_attempt(&mut self, context: &ScheduleContext) -> Option<ReceptionMode>;

    /// Reports the outcome of the attempt started last
    fn attempt_finished(&mut self, success: bool, now_ms: u64);
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceReport {
    /// Whole seconds processed
    pub seconds: u32,
    /// Outcome of an attempt that finished in this iteration
    pub acquisition: Option<bool>,
    /// Replies sent to network clients
    pub replies: usize,
}

/// The time station: software clock, reception history and NTP server
/// driven by one cooperative loop
pub struct Station<T: TimeBase + Clone = MonotonicTimeBase> {
    config: Config,
    clock: ClockModel<T>,
    history: ReceptionQualityTracker<T>,
    server: TimeDistributionServer,
    attempt: Option<AcquisitionAttempt>,
    last_dst: Option<DstStatus>,
    last_service_ms: u64,
    last_second_ms: u64,
    time_base: T,
}

impl Station<MonotonicTimeBase> {
    /// Creates a new station on the system monotonic clock
    pub fn new(config: Config) -> Result<Self> {
        Self::with_time_base(config, MonotonicTimeBase::new())
    }
}

impl<T: TimeBase + Clone> Station<T> {
    /// Creates a new station on the given time base
    pub fn with_time_base(config: Config, time_base: T) -> Result<Self> {
        config.validate()?;

        let now = time_base.now_ms();
        Ok(Station {
            clock: ClockModel::with_time_base(time_base.clone()),
            history: ReceptionQualityTracker::with_time_base(time_base.clone()),
            server: TimeDistributionServer::new(config.server.clone()),
            config,
            attempt: None,
            last_dst: None,
            last_service_ms: now,
            last_second_ms: now,
            time_base,
        })
    }

    /// Runs one loop iteration
    ///
    /// Ticks the clock first, then progresses acquisition, then answers
    /// network requests from the updated clock.
    pub fn service<R, S>(&mut self, receiver: &mut R, scheduler: &mut S) -> ServiceReport
    where
        R: TimeReceiver,
        S: AcquisitionScheduler,
    {
        let now = self.time_base.now_ms();
        let mut report = ServiceReport::default();

        self.clock.tick(now.saturating_sub(self.last_service_ms));
        self.last_service_ms = now;

        while now.saturating_sub(self.last_second_ms) >= 1000 {
            self.last_second_ms += 1000;
            self.history.hourly_tick();
            report.seconds += 1;
        }

        report.acquisition = self.progress_acquisition(receiver, scheduler, now);

        report.replies = match self.server.handle_requests(&self.clock) {
            Ok(replies) => replies,
            Err(e) => {
                warn!(error = %e, "Failed to handle NTP requests");
                0
            }
        };

        report
    }

    fn progress_acquisition<R, S>(&mut self, receiver: &mut R, scheduler: &mut S, now: u64) -> Option<bool>
    where
        R: TimeReceiver,
        S: AcquisitionScheduler,
    {
        let result = match self.attempt.as_mut() {
            Some(attempt) => match attempt.poll(receiver, now) {
                AcquisitionPoll::Pending => return None,
                AcquisitionPoll::Complete(result) => {
                    self.attempt = None;
                    result
                }
            },
            None => {
                let context = self.schedule_context(now);
                let mode = scheduler.next_attempt(&context)?;
                match AcquisitionAttempt::start(receiver, mode, now, &self.config.acquisition) {
                    Ok(attempt) => {
                        self.attempt = Some(attempt);
                        return None;
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let success = self.record_acquisition(&result);
        scheduler.attempt_finished(success, now);
        Some(success)
    }

    /// Applies the outcome of an acquisition
    ///
    /// A decoded frame sets the clock and the DST state; any outcome is
    /// recorded in the reception history. Returns whether it succeeded.
    pub fn record_acquisition(&mut self, result: &Result<ReceivedTime>) -> bool {
        match result {
            Ok(time) => {
                let utc = time.utc;
                self.clock
                    .set_instant(utc.year, utc.month, utc.day, utc.hour, utc.minute, utc.second);
                self.last_dst = Some(time.dst);
                self.history.record_attempt(true);
                info!(
                    utc = %utc,
                    successes = self.history.total_success_count(),
                    attempts = self.history.total_attempt_count(),
                    "Acquisition succeeded"
                );
                true
            }
            Err(e) => {
                self.history.record_attempt(false);
                warn!(error = %e, attempts = self.history.total_attempt_count(), "Acquisition failed");
                false
            }
        }
    }

    /// Current UTC
    pub fn utc(&self) -> ClockInstant {
        self.clock.get_utc()
    }

    /// Current local time from the configured offset and broadcast DST
    pub fn local_time(&self) -> ClockInstant {
        let dst_active = self.config.clock.auto_dst
            && self.last_dst.map_or(false, |dst| dst.is_active());
        self.clock.get_local(self.config.clock.utc_offset_hours, dst_active)
    }

    /// Runs the loop until `shutdown` turns true or its sender is dropped
    ///
    /// Binds the NTP server on entry. On exit an active attempt is abandoned
    /// and the server released.
    pub async fn run<R, S>(
        &mut self,
        receiver: &mut R,
        scheduler: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        R: TimeReceiver,
        S: AcquisitionScheduler,
    {
        self.server.begin()?;

        let mut interval = time::interval(self.config.loop_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.config.loop_interval, "Station running");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.service(receiver, scheduler);
                    if report.replies > 0 {
                        debug!(replies = report.replies, "Served time");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(attempt) = self.attempt.take() {
            attempt.abandon(receiver);
        }
        self.server.stop();
        info!("Station stopped");
        Ok(())
    }

    fn schedule_context(&self, now_ms: u64) -> ScheduleContext {
        ScheduleContext {
            now_ms,
            local_time: self.clock.is_set().then(|| self.local_time()),
            seconds_since_set: self.clock.get_seconds_since_set(),
        }
    }

    /// Whether a reception attempt is running
    pub fn is_acquiring(&self) -> bool {
        self.attempt.is_some()
    }

    /// DST state from the last decoded frame
    pub fn last_dst(&self) -> Option<DstStatus> {
        self.last_dst
    }

    pub fn clock(&self) -> &ClockModel<T> {
        &self.clock
    }

    pub fn history(&self) -> &ReceptionQualityTracker<T> {
        &self.history
    }

    pub fn server(&self) -> &TimeDistributionServer {
        &self.server
    }

    /// Server access, e.g. to change stratum after losing the reference
    pub fn server_mut(&mut self) -> &mut TimeDistributionServer {
        &mut self.server
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
