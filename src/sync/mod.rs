//! Acquisition and the station control loop
//!
//! This module ties the receiver, the software clock, the reception history
//! and the NTP server together. Everything runs on a single cooperative loop;
//! no component is shared across threads.

pub mod acquisition;
pub mod station;

pub use self::acquisition::{AcquisitionAttempt, AcquisitionPoll};
pub use self::station::{AcquisitionScheduler, ScheduleContext, ServiceReport, Station};
