//! Time acquisition and keeping
//!
//! This module covers everything between the antenna and the software clock:
//!
//! - Gregorian calendar arithmetic on broken-down instants
//! - A free-running clock advanced by elapsed-time ticks
//! - The WWVB receiver driver and bus recovery
//! - A 48-hour reception quality histogram
//!
//! # Examples
//!
//! ```
//! use wwvb_ntp::time::{ClockModel, ManualTimeBase};
//!
//! let time_base = ManualTimeBase::new();
//! let mut clock = ClockModel::with_time_base(time_base.clone());
//! clock.set_instant(2025, 1, 1, 0, 0, 0);
//!
//! time_base.advance(1_500);
//! clock.tick(1_500);
//! assert_eq!(clock.get_utc().second, 1);
//! assert_eq!(clock.get_subsecond_ms(), 500);
//! ```

pub mod bus;
pub mod calendar;
pub mod clock;
pub mod history;
pub mod receiver;

#[cfg(test)]
pub(crate) mod mock;

pub use self::bus::{recover_bus, BusLines, BusRecovery, TransactionTimeout};
pub use self::calendar::{day_of_week, days_in_month, is_leap_year, ClockInstant};
pub use self::clock::{ClockModel, ManualTimeBase, MonotonicTimeBase, TimeBase, TimeReading};
pub use self::history::{HistorySummary, ReceptionQualityTracker, HISTORY_HOURS};
pub use self::receiver::{
    Antenna, DstStatus, IrqStatus, LeapSecondWarning, NextDst, ReceivedTime, ReceiverDriver,
    TimeReceiver,
};
