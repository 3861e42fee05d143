//! UDP time server
//!
//! A non-blocking socket drained a bounded number of datagrams per call, so
//! serving clients never stalls the control loop.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use bytes::BytesMut;
use socket2::{Domain, Protocol, Socket, Type};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, warn};

use crate::core::{Error, Result, ServerConfig, Stratum};
use crate::protocol::{
    is_plausible, NtpCodec, NtpTimestamp, ReferenceId, ReplyPacket, MAX_MESSAGE_SIZE, PACKET_SIZE,
};
use crate::time::TimeReading;
use crate::util::hex_words;

/// Stratum-1 NTP server answering from the local clock
///
/// The socket is non-blocking; `handle_requests` is polled from the control
/// loop and never waits for traffic.
pub struct TimeDistributionServer {
    config: ServerConfig,
    stratum: Stratum,
    reference_id: ReferenceId,
    socket: Option<UdpSocket>,
    request_count: u64,
}

impl TimeDistributionServer {
    /// Creates a new server; nothing is bound until `begin`
    pub fn new(config: ServerConfig) -> Self {
        TimeDistributionServer {
            stratum: config.stratum,
            reference_id: ReferenceId::Ascii(config.reference_tag),
            config,
            socket: None,
            request_count: 0,
        }
    }

    /// Binds the configured address
    pub fn begin(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let addr = self.config.bind_addr;
        let socket = bind_socket(addr)
            .map_err(|e| Error::network(format!("Failed to bind {}: {}", addr, e)))?;

        self.socket = Some(socket);
        self.request_count = 0;
        info!(addr = %self.local_addr().unwrap_or(addr), "NTP server started");
        Ok(())
    }

    /// Releases the port
    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("NTP server stopped");
        }
    }

    /// Answers pending requests, at most `max_requests_per_poll` per call
    ///
    /// Returns the number of replies sent. Requests are dropped silently when
    /// they are undersized or the clock is unset or implausible.
    pub fn handle_requests(&mut self, clock: &impl TimeReading) -> Result<usize> {
        let socket = match &self.socket {
            Some(socket) => socket,
            None => return Ok(0),
        };

        let mut codec = NtpCodec::new();
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let mut out = BytesMut::with_capacity(PACKET_SIZE);
        let mut replied = 0;

        for _ in 0..self.config.max_requests_per_poll {
            let (len, peer) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e)
                    if e.kind() == io::ErrorKind::Interrupted
                        || e.kind() == io::ErrorKind::ConnectionReset =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            };

            let mut frame = BytesMut::from(&buf[..len]);
            let request = match codec.decode(&mut frame)? {
                Some(request) => request,
                None => {
                    debug!(%peer, len, "Undersized request ignored");
                    continue;
                }
            };

            if !clock.is_set() {
                debug!(%peer, "Clock not set, request ignored");
                continue;
            }

            let unix = clock.epoch_seconds();
            if !is_plausible(unix) {
                debug!(%peer, unix, "Clock reading before 2020, request ignored");
                continue;
            }

            let receive = NtpTimestamp::from_unix(unix, clock.subsecond_ms());
            let reply = ReplyPacket::for_request(&request, self.stratum, self.reference_id, receive)
                .with_transmit(NtpTimestamp::from_unix(unix, clock.subsecond_ms()));

            out.clear();
            codec.encode(reply, &mut out)?;
            let sent = socket.send_to(&out, peer);
            self.request_count += 1;

            match sent {
                Ok(_) => {
                    replied += 1;
                    debug!(
                        count = self.request_count,
                        %peer,
                        version = request.version,
                        mode = request.mode,
                        stratum = self.stratum.level(),
                        "Request answered"
                    );
                }
                Err(e) => warn!(%peer, error = %e, "Failed to send reply"),
            }

            if self.request_count == 1 {
                debug!(reply = %hex_words(&out), "First reply");
            }
        }

        Ok(replied)
    }

    /// Sets the advertised stratum and reference identifier
    ///
    /// Takes an ASCII tag for a primary source or the upstream IPv4 address
    /// for a secondary one.
    pub fn set_stratum(&mut self, level: u8, reference: impl Into<ReferenceId>) {
        self.stratum = Stratum::new(level);
        self.reference_id = reference.into();
        info!(stratum = self.stratum.level(), reference = %self.reference_id, "Stratum changed");
    }

    /// Advertised stratum
    pub fn stratum(&self) -> Stratum {
        self.stratum
    }

    /// Advertised reference identifier
    pub fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }

    /// Lifetime count of answered requests
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    /// Bound address, useful when binding port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
