//! DHCP option list encoding and parsing.
//!
//! Options travel as a TLV stream appended to the fixed message header:
//! one code byte, one length byte, then the payload. The list is ordered
//! on the wire but all lookups go by tag, so callers never rely on
//! position. Codes this client does not know are skipped during parsing
//! rather than rejected, which keeps the parser forward-compatible with
//! servers that volunteer extra options.

use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

use super::DecodeError;

/// Option codes this client produces or consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionCode {
    SubnetMask,
    Router,
    DomainNameServer,
    HostName,
    BroadcastAddr,
    RequestedIpAddress,
    AddressLeaseTime,
    ServerIdentifier,
    ParameterRequestList,
    /// Anything outside the table above. Carried so a parameter request
    /// list survives a round trip even when it names codes we do not use.
    Unknown(u8),
}

impl From<u8> for OptionCode {
    fn from(code: u8) -> Self {
        match code {
            1 => OptionCode::SubnetMask,
            3 => OptionCode::Router,
            6 => OptionCode::DomainNameServer,
            12 => OptionCode::HostName,
            28 => OptionCode::BroadcastAddr,
            50 => OptionCode::RequestedIpAddress,
            51 => OptionCode::AddressLeaseTime,
            54 => OptionCode::ServerIdentifier,
            55 => OptionCode::ParameterRequestList,
            other => OptionCode::Unknown(other),
        }
    }
}

impl From<OptionCode> for u8 {
    fn from(code: OptionCode) -> Self {
        match code {
            OptionCode::SubnetMask => 1,
            OptionCode::Router => 3,
            OptionCode::DomainNameServer => 6,
            OptionCode::HostName => 12,
            OptionCode::BroadcastAddr => 28,
            OptionCode::RequestedIpAddress => 50,
            OptionCode::AddressLeaseTime => 51,
            OptionCode::ServerIdentifier => 54,
            OptionCode::ParameterRequestList => 55,
            OptionCode::Unknown(other) => other,
        }
    }
}

/// A single decoded DHCP option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    SubnetMask(Ipv4Addr),
    Router(Vec<Ipv4Addr>),
    DomainNameServer(Vec<Ipv4Addr>),
    HostName(String),
    RequestedIpAddress(Ipv4Addr),
    AddressLeaseTime(u32),
    ServerIdentifier(Ipv4Addr),
    ParameterRequestList(Vec<OptionCode>),
}

impl DhcpOption {
    pub fn code(&self) -> OptionCode {
        match self {
            DhcpOption::SubnetMask(_) => OptionCode::SubnetMask,
            DhcpOption::Router(_) => OptionCode::Router,
            DhcpOption::DomainNameServer(_) => OptionCode::DomainNameServer,
            DhcpOption::HostName(_) => OptionCode::HostName,
            DhcpOption::RequestedIpAddress(_) => OptionCode::RequestedIpAddress,
            DhcpOption::AddressLeaseTime(_) => OptionCode::AddressLeaseTime,
            DhcpOption::ServerIdentifier(_) => OptionCode::ServerIdentifier,
            DhcpOption::ParameterRequestList(_) => OptionCode::ParameterRequestList,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            DhcpOption::SubnetMask(addr)
            | DhcpOption::RequestedIpAddress(addr)
            | DhcpOption::ServerIdentifier(addr) => addr.octets().to_vec(),
            DhcpOption::Router(addrs) | DhcpOption::DomainNameServer(addrs) => {
                addrs.iter().flat_map(|a| a.octets()).collect()
            }
            DhcpOption::HostName(name) => name.as_bytes().to_vec(),
            DhcpOption::AddressLeaseTime(secs) => secs.to_be_bytes().to_vec(),
            DhcpOption::ParameterRequestList(codes) => {
                codes.iter().map(|c| u8::from(*c)).collect()
            }
        }
    }
}

/// An ordered option list with tag-based lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options(Vec<DhcpOption>);

impl Options {
    pub fn new(list: Vec<DhcpOption>) -> Self {
        Options(list)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DhcpOption> {
        self.0.iter()
    }

    /// Serializes each option as (code, length, payload) in list order.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        for option in &self.0 {
            let payload = option.payload();
            debug_assert!(payload.len() <= u8::MAX as usize);
            buf.put_u8(option.code().into());
            buf.put_u8(payload.len() as u8);
            buf.put_slice(&payload);
        }
    }

    /// Parses a TLV stream.
    ///
    /// A truncated record or a known option with an impossible payload
    /// fails the whole list; unknown codes are skipped.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut list = Vec::new();
        let mut at = 0;

        while at < raw.len() {
            let code = raw[at];
            let Some(&len) = raw.get(at + 1) else {
                return Err(DecodeError::Truncated {
                    offset: at + 1,
                    needed: 1,
                });
            };
            let len = len as usize;
            let start = at + 2;
            let end = start + len;
            if end > raw.len() {
                return Err(DecodeError::Truncated {
                    offset: raw.len(),
                    needed: end - raw.len(),
                });
            }
            let payload = &raw[start..end];

            match OptionCode::from(code) {
                OptionCode::SubnetMask => {
                    list.push(DhcpOption::SubnetMask(single_addr(code, payload)?));
                }
                OptionCode::Router => {
                    list.push(DhcpOption::Router(addr_list(code, payload)?));
                }
                OptionCode::DomainNameServer => {
                    list.push(DhcpOption::DomainNameServer(addr_list(code, payload)?));
                }
                OptionCode::HostName => {
                    let name = String::from_utf8(payload.to_vec()).map_err(|_| {
                        DecodeError::OptionPayload { code, len }
                    })?;
                    list.push(DhcpOption::HostName(name));
                }
                OptionCode::RequestedIpAddress => {
                    list.push(DhcpOption::RequestedIpAddress(single_addr(code, payload)?));
                }
                OptionCode::AddressLeaseTime => {
                    let secs: [u8; 4] = payload
                        .try_into()
                        .map_err(|_| DecodeError::OptionPayload { code, len })?;
                    list.push(DhcpOption::AddressLeaseTime(u32::from_be_bytes(secs)));
                }
                OptionCode::ServerIdentifier => {
                    list.push(DhcpOption::ServerIdentifier(single_addr(code, payload)?));
                }
                OptionCode::ParameterRequestList => {
                    list.push(DhcpOption::ParameterRequestList(
                        payload.iter().map(|&c| OptionCode::from(c)).collect(),
                    ));
                }
                OptionCode::BroadcastAddr | OptionCode::Unknown(_) => {
                    tracing::trace!(code, len, "skipping unhandled DHCP option");
                }
            }

            at = end;
        }

        Ok(Options(list))
    }

    /// Returns the first projection that matches, searching in list order.
    ///
    /// Absence is a normal outcome, not an error.
    pub fn find<T>(&self, mut select: impl FnMut(&DhcpOption) -> Option<T>) -> Option<T> {
        self.0.iter().find_map(|option| select(option))
    }

    /// Like [`find`](Self::find) for multi-valued options; absence yields
    /// an empty list.
    pub fn find_list<T>(&self, select: impl FnMut(&DhcpOption) -> Option<Vec<T>>) -> Vec<T> {
        self.find(select).unwrap_or_default()
    }
}

fn single_addr(code: u8, payload: &[u8]) -> Result<Ipv4Addr, DecodeError> {
    let octets: [u8; 4] = payload.try_into().map_err(|_| DecodeError::OptionPayload {
        code,
        len: payload.len(),
    })?;
    Ok(Ipv4Addr::from(octets))
}

fn addr_list(code: u8, payload: &[u8]) -> Result<Vec<Ipv4Addr>, DecodeError> {
    if payload.len() % 4 != 0 {
        return Err(DecodeError::OptionPayload {
            code,
            len: payload.len(),
        });
    }
    Ok(payload
        .chunks_exact(4)
        .map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
        .collect())
}
