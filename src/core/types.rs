use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Stratum advertised to network time clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stratum(pub u8);

impl Stratum {
    /// Stratum 16, advertised when the reference has been lost
    pub const UNSYNCHRONIZED: Stratum = Stratum(16);

    /// Creates a stratum from the byte placed on the wire
    pub fn new(level: u8) -> Self {
        Stratum(level)
    }

    /// Returns the primary stratum (directly attached reference clock)
    pub fn primary() -> Self {
        Stratum(1)
    }

    /// Returns the stratum level
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Returns whether this stratum names a primary reference source
    pub fn is_primary(&self) -> bool {
        self.0 == 1
    }

    /// Returns whether clients may synchronize to this stratum
    pub fn is_synchronized(&self) -> bool {
        (1..=super::MAX_STRATUM).contains(&self.0)
    }
}

/// GPIO numbers of the receiver's bus lines, needed for bus recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusPins {
    /// Data line
    pub sda: u8,
    /// Clock line
    pub scl: u8,
}

/// Antenna strategy written to the receiver's control register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptionMode {
    /// Start on antenna 1, toggle between antennas
    Normal,
    /// Antenna 1 only
    Antenna1Only,
    /// Antenna 2 only
    Antenna2Only,
    /// Start on antenna 2, toggle between antennas
    NormalStartAntenna2,
}

impl ReceptionMode {
    /// Control register value selecting this mode
    pub fn control_byte(&self) -> u8 {
        match self {
            ReceptionMode::Normal => 0x01,
            ReceptionMode::Antenna2Only => 0x03,
            ReceptionMode::Antenna1Only => 0x05,
            ReceptionMode::NormalStartAntenna2 => 0x09,
        }
    }
}

impl Default for ReceptionMode {
    fn default() -> Self {
        ReceptionMode::Normal
    }
}

/// Local time presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Hours offset from UTC (e.g. -5 for EST)
    pub utc_offset_hours: i8,
    /// Apply DST from the receiver's broadcast DST status
    pub auto_dst: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            utc_offset_hours: -5,
            auto_dst: true,
        }
    }
}

/// Receiver hardware settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// 7-bit bus address of the receiver
    pub address: u8,
    /// Bus line pins, `None` disables bus recovery
    pub pins: Option<BusPins>,
    /// Time for the receiver to wake up after the enable line rises
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub wakeup_delay: Duration,
    /// Upper bound for a single register transaction
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub bus_timeout: Duration,
    /// Century added to the two-digit broadcast year
    pub century_base: u16,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            address: super::RECEIVER_I2C_ADDR,
            pins: Some(BusPins { sda: 15, scl: 16 }),
            wakeup_delay: Duration::from_millis(20),
            bus_timeout: Duration::from_millis(50),
            century_base: 2000,
        }
    }
}

/// Network time server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local address to bind to
    pub bind_addr: SocketAddr,
    /// Stratum advertised while serving time from the receiver
    pub stratum: Stratum,
    /// ASCII reference identifier for a primary source
    #[serde(serialize_with = "super::serde::serialize_tag")]
    #[serde(deserialize_with = "super::serde::deserialize_tag")]
    pub reference_tag: [u8; 4],
    /// Maximum datagrams handled per poll
    pub max_requests_per_poll: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], super::NTP_PORT)),
            stratum: Stratum::primary(),
            reference_tag: *b"WWVB",
            max_requests_per_poll: 16,
        }
    }
}

/// Reception attempt settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Give up on an attempt after this long
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub timeout: Duration,
    /// Interval between IRQ status polls during an attempt
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub poll_interval: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            // One-minute frame plus an antenna toggle retry
            timeout: Duration::from_secs(180),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Configuration for the time station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local time presentation
    pub clock: ClockConfig,
    /// Receiver hardware
    pub receiver: ReceiverConfig,
    /// Network time server
    pub server: ServerConfig,
    /// Reception attempts
    pub acquisition: AcquisitionConfig,
    /// Control loop period
    #[serde(default = "default_loop_interval")]
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub loop_interval: Duration,
}

fn default_loop_interval() -> Duration {
    Duration::from_millis(10)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clock: ClockConfig::default(),
            receiver: ReceiverConfig::default(),
            server: ServerConfig::default(),
            acquisition: AcquisitionConfig::default(),
            loop_interval: default_loop_interval(),
        }
    }
}

impl Config {
    /// Checks that the configuration is valid and consistent
    pub fn validate(&self) -> Result<()> {
        if !(-12..=14).contains(&self.clock.utc_offset_hours) {
            return Err(Error::config(format!(
                "UTC offset {} outside -12..=14",
                self.clock.utc_offset_hours
            )));
        }

        if self.receiver.address > 0x7F {
            return Err(Error::config("Receiver address must be a 7-bit address"));
        }
        if self.receiver.wakeup_delay.is_zero() || self.receiver.wakeup_delay > Duration::from_secs(1) {
            return Err(Error::config("Wakeup delay must be between 0 and 1s"));
        }
        if self.receiver.bus_timeout.is_zero() {
            return Err(Error::config("Bus timeout must be non-zero"));
        }
        if self.receiver.century_base % 100 != 0 || self.receiver.century_base < 2000 {
            return Err(Error::config("Century base must be a century from 2000 on"));
        }

        if self.server.stratum.level() == 0 || self.server.stratum.level() > super::MAX_STRATUM {
            return Err(Error::config("Stratum must be between 1 and 15"));
        }
        if self.server.max_requests_per_poll == 0 {
            return Err(Error::config("Server must handle at least one request per poll"));
        }

        if self.acquisition.poll_interval < Duration::from_millis(10) {
            return Err(Error::config("Acquisition poll interval too small"));
        }
        if self.acquisition.timeout < self.acquisition.poll_interval {
            return Err(Error::config("Acquisition timeout shorter than poll interval"));
        }

        // The loop must run at least once per second to tick the clock
        if self.loop_interval.is_zero() || self.loop_interval >= Duration::from_secs(1) {
            return Err(Error::config("Loop interval must be between 0 and 1s"));
        }

        Ok(())
    }
}
