//! DHCPv4 protocol implementation
//!
//! This module contains the DHCPv4-specific implementation including:
//! - Option list encoding and parsing
//! - Message construction and parsing
//! - UDP broadcast framing
//! - State machine handling

pub mod envelope;
pub mod handler;
pub mod options;
pub mod packet;

pub use envelope::{Ipv4Envelope, UdpEnvelope};
pub use handler::{ClientState, DhcpV4Handler, Offer};
pub use options::{DhcpOption, OptionCode, Options};
pub use packet::{Message, Opcode};

use thiserror::Error;

/// Errors raised while parsing inbound wire data.
///
/// A decode failure condemns the single packet it occurred in, never the
/// client: callers drop the packet and keep their state.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet truncated at byte {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown BOOTP opcode {0:#04x}")]
    Opcode(u8),

    #[error("option {code} has a malformed payload of {len} bytes")]
    OptionPayload { code: u8, len: usize },

    #[error("UDP length field {length} disagrees with datagram size {actual}")]
    UdpLength { length: usize, actual: usize },
}
