//! NTP wire format
//!
//! This module defines the 48-byte NTP header as this server reads and
//! writes it, plus a codec over `bytes` buffers.

pub mod codec;
pub mod packet;

pub use self::codec::NtpCodec;
pub use self::packet::{
    is_plausible, ntp_seconds, NtpTimestamp, ReferenceId, ReplyPacket, Request,
    MIN_PLAUSIBLE_NTP_SECONDS, PACKET_SIZE, SUBSEC_FRACTION_SCALE,
};

/// Largest datagram read from a client, enough for extension fields
pub const MAX_MESSAGE_SIZE: usize = 1024;
