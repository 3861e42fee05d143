//! NTP packet layout
//!
//! Requests are parsed only for the fields a reply echoes. Replies are
//! built field by field into the fixed 48-byte header.

use std::fmt;
use std::net::Ipv4Addr;

use crate::core::{Stratum, NTP_EPOCH_OFFSET};

/// Size of an NTP header without extension fields
pub const PACKET_SIZE: usize = 48;

/// Lowest protocol version echoed back to clients
pub const MIN_REPLY_VERSION: u8 = 3;

/// Association mode of a server reply
pub const MODE_SERVER: u8 = 4;

/// Precision exponent, 2^-10 s (about one millisecond)
pub const PRECISION: i8 = -10;

/// Root dispersion in 16.16 fixed point (about 15 ms)
pub const ROOT_DISPERSION: u32 = 0x0000_03E8;

/// 2020-01-01 in NTP seconds; earlier readings are implausible
pub const MIN_PLAUSIBLE_NTP_SECONDS: u64 = 3_786_825_600;

/// Milliseconds to 32-bit binary fraction, approximately 2^32 / 1000
pub const SUBSEC_FRACTION_SCALE: u32 = 4_294_967;

/// Converts Unix seconds to NTP seconds without wrapping
pub fn ntp_seconds(unix_seconds: u32) -> u64 {
    unix_seconds as u64 + NTP_EPOCH_OFFSET
}

/// Whether a clock reading is recent enough to be served
pub fn is_plausible(unix_seconds: u32) -> bool {
    ntp_seconds(unix_seconds) >= MIN_PLAUSIBLE_NTP_SECONDS
}

/// Reference identifier of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceId {
    /// Four-character source code of a primary server
    Ascii([u8; 4]),
    /// Address of the upstream server for secondary strata
    Ipv4(Ipv4Addr),
}

impl ReferenceId {
    /// Wire representation
    pub fn to_bytes(&self) -> [u8; 4] {
        match self {
            ReferenceId::Ascii(tag) => *tag,
            ReferenceId::Ipv4(addr) => addr.octets(),
        }
    }
}

impl From<&str> for ReferenceId {
    /// Truncates to four bytes and zero pads shorter tags
    fn from(tag: &str) -> Self {
        let mut bytes = [0u8; 4];
        for (slot, b) in bytes.iter_mut().zip(tag.bytes()) {
            *slot = b;
        }
        ReferenceId::Ascii(bytes)
    }
}

impl From<[u8; 4]> for ReferenceId {
    fn from(tag: [u8; 4]) -> Self {
        ReferenceId::Ascii(tag)
    }
}

impl From<Ipv4Addr> for ReferenceId {
    fn from(addr: Ipv4Addr) -> Self {
        ReferenceId::Ipv4(addr)
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceId::Ascii(tag) => {
                let end = tag.iter().position(|&b| b == 0).unwrap_or(4);
                write!(f, "{}", String::from_utf8_lossy(&tag[..end]))
            }
            ReferenceId::Ipv4(addr) => write!(f, "{}", addr),
        }
    }
}

/// 64-bit NTP timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTimestamp {
    /// Seconds since 1900, wrapped to the current era
    pub seconds: u32,
    /// Binary fraction of a second
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Builds a timestamp from a Unix reading with millisecond resolution
    pub fn from_unix(unix_seconds: u32, subsecond_ms: u16) -> Self {
        NtpTimestamp {
            // Era wrap on the wire
            seconds: ntp_seconds(unix_seconds) as u32,
            fraction: (subsecond_ms as u32).wrapping_mul(SUBSEC_FRACTION_SCALE),
        }
    }

    /// Big-endian wire representation
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.seconds.to_be_bytes());
        out[4..].copy_from_slice(&self.fraction.to_be_bytes());
        out
    }
}

/// The fields of a client request that a reply depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub version: u8,
    pub mode: u8,
    pub poll: u8,
    /// Client transmit timestamp, copied verbatim into the reply
    pub transmit: [u8; 8],
}

impl Request {
    /// Parses a request header, `None` if it is shorter than 48 bytes
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < PACKET_SIZE {
            return None;
        }
        let mut transmit = [0u8; 8];
        transmit.copy_from_slice(&bytes[40..48]);
        Some(Request {
            version: (bytes[0] >> 3) & 0x07,
            mode: bytes[0] & 0x07,
            poll: bytes[2],
            transmit,
        })
    }
}

/// Server reply, built fresh for each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPacket {
    pub version: u8,
    pub stratum: Stratum,
    pub poll: u8,
    pub reference_id: ReferenceId,
    /// Whole seconds of the reference timestamp
    pub reference_seconds: u32,
    pub origin: [u8; 8],
    pub receive: NtpTimestamp,
    pub transmit: NtpTimestamp,
}

impl ReplyPacket {
    /// Builds a reply to `request` received at `receive`
    ///
    /// The transmit timestamp starts equal to the receive timestamp; callers
    /// resample it just before sending.
    pub fn for_request(
        request: &Request,
        stratum: Stratum,
        reference_id: ReferenceId,
        receive: NtpTimestamp,
    ) -> Self {
        ReplyPacket {
            version: request.version.max(MIN_REPLY_VERSION),
            stratum,
            poll: request.poll,
            reference_id,
            reference_seconds: receive.seconds,
            origin: request.transmit,
            receive,
            transmit: receive,
        }
    }

    /// Replaces the transmit timestamp
    pub fn with_transmit(mut self, transmit: NtpTimestamp) -> Self {
        self.transmit = transmit;
        self
    }

    /// Serializes the reply header
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];

        // LI = 0
        out[0] = ((self.version & 0x07) << 3) | MODE_SERVER;
        out[1] = self.stratum.level();
        out[2] = self.poll;
        out[3] = PRECISION as u8;
        // Root delay stays zero for a primary reference
        out[8..12].copy_from_slice(&ROOT_DISPERSION.to_be_bytes());
        out[12..16].copy_from_slice(&self.reference_id.to_bytes());
        out[16..20].copy_from_slice(&self.reference_seconds.to_be_bytes());
        out[24..32].copy_from_slice(&self.origin);
        out[32..40].copy_from_slice(&self.receive.to_bytes());
        out[40..48].copy_from_slice(&self.transmit.to_bytes());

        out
    }
}
