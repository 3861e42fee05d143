//! Core types and constants for the WWVB time server
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    AcquisitionConfig,
    BusPins,
    ClockConfig,
    Config,
    ReceiverConfig,
    ReceptionMode,
    ServerConfig,
    Stratum,
};

/// Well-known NTP port
pub const NTP_PORT: u16 = 123;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01 (Unix epoch)
pub const NTP_EPOCH_OFFSET: u64 = 2_208_988_800;

/// 7-bit bus address of the receiver
pub const RECEIVER_I2C_ADDR: u8 = 0x32;

/// Highest stratum a synchronized server may advertise
pub const MAX_STRATUM: u8 = 15;
