//! Bus line control and stuck-bus recovery
//!
//! A peripheral that loses power or resets mid-transfer can leave the data
//! line asserted. Clocking the bus until the peripheral finishes its byte and
//! then issuing a stop condition returns every device to idle.

use std::fmt;
use std::time::Duration;

use embedded_hal::blocking::delay::DelayUs;
use tracing::{debug, info, warn};

use crate::core::{BusPins, Error, Result};

/// Maximum clock pulses issued while waiting for the data line to release
pub const MAX_RECOVERY_PULSES: u8 = 9;

/// Half period of the recovery clock (about 100 kHz)
const HALF_PERIOD_US: u32 = 5;

/// Direct access to the bus lines, bypassing the bus controller
///
/// Implementations drive the pins open-drain: "high" releases the line.
pub trait BusLines {
    /// Pin error type
    type Error: fmt::Debug;

    /// Samples the data line
    fn sda_is_high(&mut self) -> std::result::Result<bool, Self::Error>;

    /// Drives or releases the clock line
    fn set_scl(&mut self, high: bool) -> std::result::Result<(), Self::Error>;

    /// Drives or releases the data line
    fn set_sda(&mut self, high: bool) -> std::result::Result<(), Self::Error>;

    /// Hands the pins back to the bus controller and reinitializes it
    fn reinit(&mut self, pins: BusPins) -> std::result::Result<(), Self::Error>;
}

/// Bus controller that aborts a transaction after a deadline
///
/// The blocking I2C traits have no notion of a timeout, so the controller
/// enforces it. A clock-stretching or wedged peripheral then surfaces as an
/// error instead of stalling the caller.
pub trait TransactionTimeout {
    /// Controller error type, shared with its I2C implementation
    type Error: fmt::Debug;

    /// Sets the deadline applied to each following transaction
    fn set_transaction_timeout(&mut self, timeout: Duration) -> std::result::Result<(), Self::Error>;

    /// Whether the error is the controller aborting at its deadline
    fn is_timeout(error: &Self::Error) -> bool;
}

/// Outcome of a recovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRecovery {
    /// No pins configured, nothing checked
    Skipped,
    /// Data line was already released
    Healthy,
    /// Clock pulses were issued, then a stop condition and reinit
    Recovered {
        /// Clock pulses issued
        pulses: u8,
        /// Whether the data line released before the pulse budget ran out
        released: bool,
    },
}

impl BusRecovery {
    /// Number of clock pulses issued
    pub fn pulses(&self) -> u8 {
        match self {
            BusRecovery::Recovered { pulses, .. } => *pulses,
            _ => 0,
        }
    }
}

/// Frees a bus whose data line is held low by a peer
///
/// Idempotent: a healthy bus is left untouched.
pub fn recover_bus<L, D>(lines: &mut L, delay: &mut D, pins: Option<BusPins>) -> Result<BusRecovery>
where
    L: BusLines,
    D: DelayUs<u32>,
{
    let pins = match pins {
        Some(pins) => pins,
        None => return Ok(BusRecovery::Skipped),
    };

    if lines.sda_is_high().map_err(Error::bus)? {
        debug!("Bus idle, no recovery needed");
        return Ok(BusRecovery::Healthy);
    }

    warn!(sda = pins.sda, scl = pins.scl, "Data line stuck low, recovering bus");

    let mut pulses = 0;
    let mut released = false;
    while pulses < MAX_RECOVERY_PULSES {
        lines.set_scl(false).map_err(Error::bus)?;
        delay.delay_us(HALF_PERIOD_US);
        lines.set_scl(true).map_err(Error::bus)?;
        delay.delay_us(HALF_PERIOD_US);
        pulses += 1;

        if lines.sda_is_high().map_err(Error::bus)? {
            released = true;
            break;
        }
    }

    // Stop condition: data rises while clock is high
    lines.set_sda(false).map_err(Error::bus)?;
    delay.delay_us(HALF_PERIOD_US);
    lines.set_scl(true).map_err(Error::bus)?;
    delay.delay_us(HALF_PERIOD_US);
    lines.set_sda(true).map_err(Error::bus)?;
    delay.delay_us(HALF_PERIOD_US);

    lines.reinit(pins).map_err(Error::bus)?;

    if released {
        info!(pulses, "Bus recovered");
    } else {
        warn!(pulses, "Data line still low after recovery pulses");
    }

    Ok(BusRecovery::Recovered { pulses, released })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::mock::{MockDelay, MockLines, MockState};

    const PINS: BusPins = BusPins { sda: 15, scl: 16 };

    #[test]
    fn test_healthy_bus_untouched() {
        let state = MockState::shared();
        let mut lines = MockLines(state.clone());
        let mut delay = MockDelay(state.clone());

        let outcome = recover_bus(&mut lines, &mut delay, Some(PINS)).unwrap();
        assert_eq!(outcome, BusRecovery::Healthy);
        assert_eq!(outcome.pulses(), 0);

        let state = state.borrow();
        assert_eq!(state.scl_rising_edges, 0);
        assert_eq!(state.stop_conditions, 0);
        assert!(state.reinit_pins.is_empty());
    }

    #[test]
    fn test_stuck_bus_released_after_pulses() {
        let state = MockState::shared();
        state.borrow_mut().sda_stuck_for = Some(3);
        let mut lines = MockLines(state.clone());
        let mut delay = MockDelay(state.clone());

        let outcome = recover_bus(&mut lines, &mut delay, Some(PINS)).unwrap();
        assert_eq!(outcome, BusRecovery::Recovered { pulses: 3, released: true });

        let state = state.borrow();
        assert_eq!(state.stop_conditions, 1);
        assert_eq!(state.reinit_pins, vec![PINS]);
    }

    #[test]
    fn test_pulse_budget_exhausted() {
        let state = MockState::shared();
        state.borrow_mut().sda_stuck_for = Some(u32::MAX);
        let mut lines = MockLines(state.clone());
        let mut delay = MockDelay(state.clone());

        let outcome = recover_bus(&mut lines, &mut delay, Some(PINS)).unwrap();
        assert_eq!(
            outcome,
            BusRecovery::Recovered {
                pulses: MAX_RECOVERY_PULSES,
                released: false
            }
        );
        assert_eq!(state.borrow().stop_conditions, 1);
        assert_eq!(state.borrow().reinit_pins.len(), 1);
    }

    #[test]
    fn test_no_pins_skips_recovery() {
        let state = MockState::shared();
        state.borrow_mut().sda_stuck_for = Some(2);
        let mut lines = MockLines(state.clone());
        let mut delay = MockDelay(state.clone());

        let outcome = recover_bus(&mut lines, &mut delay, None).unwrap();
        assert_eq!(outcome, BusRecovery::Skipped);
        assert_eq!(state.borrow().scl_rising_edges, 0);
    }
}
