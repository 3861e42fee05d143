//! Frame codec for NTP datagrams

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::Error;
use super::packet::{ReplyPacket, Request, PACKET_SIZE};

/// Codec turning datagrams into requests and replies into datagrams
#[derive(Debug, Clone, Copy, Default)]
pub struct NtpCodec;

impl NtpCodec {
    /// Creates a new NTP codec
    pub fn new() -> Self {
        NtpCodec
    }
}

impl Decoder for NtpCodec {
    type Item = Request;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_SIZE {
            // Undersized, wait for (or drop) the rest
            return Ok(None);
        }

        let request = Request::parse(&src[..PACKET_SIZE]);

        // Extension fields and MACs are ignored
        src.advance(src.len());

        Ok(request)
    }
}

impl Encoder<ReplyPacket> for NtpCodec {
    type Error = Error;

    fn encode(&mut self, item: ReplyPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(PACKET_SIZE);
        dst.put_slice(&item.to_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stratum;
    use crate::protocol::packet::NtpTimestamp;

    #[test]
    fn test_decode_undersized() {
        let mut codec = NtpCodec::new();
        let mut bytes = BytesMut::from(&[0x23u8; 40][..]);

        assert!(codec.decode(&mut bytes).unwrap().is_none());
        assert_eq!(bytes.len(), 40);
    }

    #[test]
    fn test_decode_consumes_extensions() {
        let mut codec = NtpCodec::new();
        let mut raw = vec![0u8; 68];
        raw[0] = 0x23;
        raw[2] = 7;
        let mut bytes = BytesMut::from(&raw[..]);

        let request = codec.decode(&mut bytes).unwrap().unwrap();
        assert_eq!(request.version, 4);
        assert_eq!(request.poll, 7);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_encode_reply() {
        let mut codec = NtpCodec::new();
        let mut raw = [0u8; PACKET_SIZE];
        raw[0] = 0x1B;
        let request = Request::parse(&raw).unwrap();
        let reply = ReplyPacket::for_request(
            &request,
            Stratum::new(2),
            "LOCL".into(),
            NtpTimestamp::from_unix(1_700_000_000, 0),
        );

        let mut bytes = BytesMut::new();
        codec.encode(reply, &mut bytes).unwrap();
        assert_eq!(bytes.len(), PACKET_SIZE);
        assert_eq!(bytes[0], 0x1C);
        assert_eq!(bytes[1], 2);
        assert_eq!(&bytes[12..16], b"LOCL");
    }
}
