//! UDP and IPv4 framing for broadcast DHCP traffic.
//!
//! Client messages leave as UDP datagrams from port 68 to port 67 on the
//! IPv4 broadcast address. The UDP checksum is transmitted as zero, which
//! UDP over IPv4 permits. Inbound IP headers are parsed by the surrounding
//! network stack, not here; [`Ipv4Envelope`] only carries the
//! already-demultiplexed addresses alongside the UDP data.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use super::DecodeError;

/// UDP port the client sends from and listens on.
pub const DHCP_CLIENT_PORT: u16 = 68;

/// UDP port DHCP servers listen on.
pub const DHCP_SERVER_PORT: u16 = 67;

const UDP_HEADER_LEN: usize = 8;

/// One UDP datagram: port pair plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpEnvelope {
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: Bytes,
}

impl UdpEnvelope {
    pub fn new(source_port: u16, destination_port: u16, payload: Bytes) -> Self {
        UdpEnvelope {
            source_port,
            destination_port,
            payload,
        }
    }

    /// Wraps the payload in an 8-byte UDP header with a zero checksum.
    pub fn encode(&self) -> Bytes {
        let length = UDP_HEADER_LEN + self.payload.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u16(self.source_port);
        buf.put_u16(self.destination_port);
        buf.put_u16(length as u16);
        buf.put_u16(0); // checksum omitted
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    /// Parses one UDP datagram. The checksum field is not verified.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < UDP_HEADER_LEN {
            return Err(DecodeError::Truncated {
                offset: raw.len(),
                needed: UDP_HEADER_LEN - raw.len(),
            });
        }

        let mut buf = raw;
        let source_port = buf.get_u16();
        let destination_port = buf.get_u16();
        let length = buf.get_u16() as usize;
        let _checksum = buf.get_u16();

        if length < UDP_HEADER_LEN || length > raw.len() {
            return Err(DecodeError::UdpLength {
                length,
                actual: raw.len(),
            });
        }

        Ok(UdpEnvelope {
            source_port,
            destination_port,
            payload: Bytes::copy_from_slice(&raw[UDP_HEADER_LEN..length]),
        })
    }
}

/// IPv4 header data for one inbound datagram, demultiplexed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Envelope {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Envelope {
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Ipv4Envelope {
            source,
            destination,
        }
    }
}
