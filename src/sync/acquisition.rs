use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::{AcquisitionConfig, Error, ReceptionMode, Result};
use crate::time::{ReceivedTime, TimeReceiver};

/// Result of polling an attempt
#[derive(Debug)]
pub enum AcquisitionPoll {
    /// Still waiting for a frame
    Pending,
    /// Attempt finished and the receiver is powered off
    Complete(Result<ReceivedTime>),
}

/// A single reception attempt, advanced by repeated non-blocking polls
///
/// Every path out of the attempt (frame decoded, timeout, bus failure,
/// abandon) stops reception and powers the receiver down.
#[derive(Debug, Clone)]
pub struct AcquisitionAttempt {
    mode: ReceptionMode,
    started_ms: u64,
    last_poll_ms: Option<u64>,
    timeout_ms: u64,
    poll_interval_ms: u64,
}

impl AcquisitionAttempt {
    /// Starts reception and returns the running attempt
    pub fn start<R: TimeReceiver>(
        receiver: &mut R,
        mode: ReceptionMode,
        now_ms: u64,
        config: &AcquisitionConfig,
    ) -> Result<Self> {
        if let Err(e) = receiver.start_reception(mode) {
            warn!(error = %e, "Failed to start reception");
            stop(receiver);
            return Err(e);
        }

        info!(?mode, timeout = ?config.timeout, "Acquisition started");
        Ok(AcquisitionAttempt {
            mode,
            started_ms: now_ms,
            last_poll_ms: None,
            timeout_ms: config.timeout.as_millis() as u64,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
        })
    }

    /// Checks the receiver for a decoded frame
    ///
    /// The interrupt status is read at most once per poll interval.
    pub fn poll<R: TimeReceiver>(&mut self, receiver: &mut R, now_ms: u64) -> AcquisitionPoll {
        let due = self
            .last_poll_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.poll_interval_ms);

        if due {
            self.last_poll_ms = Some(now_ms);

            match receiver.read_irq_status() {
                Ok(irq) if irq.rx_complete() => {
                    let result = receiver.read_date_time();
                    stop(receiver);
                    if let Err(e) = &result {
                        warn!(error = %e, "Frame read failed");
                    }
                    return AcquisitionPoll::Complete(result);
                }
                Ok(irq) if irq.cycle_complete() => {
                    debug!(elapsed_ms = self.elapsed_ms(now_ms), "Reception cycle ended without a frame");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Interrupt status read failed");
                    stop(receiver);
                    return AcquisitionPoll::Complete(Err(e));
                }
            }
        }

        let elapsed_ms = self.elapsed_ms(now_ms);
        if elapsed_ms >= self.timeout_ms {
            stop(receiver);
            let elapsed = Duration::from_millis(elapsed_ms);
            warn!(?elapsed, mode = ?self.mode, "Acquisition timed out");
            return AcquisitionPoll::Complete(Err(Error::AcquisitionTimeout { elapsed }));
        }

        AcquisitionPoll::Pending
    }

    /// Gives up on the attempt
    pub fn abandon<R: TimeReceiver>(self, receiver: &mut R) {
        info!(mode = ?self.mode, "Acquisition abandoned");
        stop(receiver);
    }

    /// Antenna mode of this attempt
    pub fn mode(&self) -> ReceptionMode {
        self.mode
    }

    /// Milliseconds since the attempt started
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }
}

fn stop<R: TimeReceiver>(receiver: &mut R) {
    if let Err(e) = receiver.stop_reception() {
        warn!(error = %e, "Failed to stop reception");
    }
}
