//! WWVB NTP: a stratum-1 time server disciplined by the WWVB time code
//!
//! This library drives a WWVB receiver over I2C, keeps UTC in a software
//! clock between acquisitions, and serves that clock to NTP clients. A
//! rolling histogram records how reliably the 60 kHz signal is received.
//!
//! # Examples
//!
//! ```no_run
//! use wwvb_ntp::{Config, Station};
//!
//! let config = Config::default();
//! let station = Station::new(config).unwrap();
//! println!("{}", station.utc());
//! ```
pub mod core;

pub mod network;
pub mod protocol;
pub mod sync;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};
pub use crate::network::TimeDistributionServer;
pub use crate::sync::{AcquisitionScheduler, Station};
pub use crate::time::{ClockModel, ReceiverDriver, ReceptionQualityTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
