//! DHCP message encoding and parsing.
//!
//! A message is a fixed 233-byte header followed by the variable-length
//! option list. All integers are big-endian.
//!
//! ```text
//! offset  size  field
//!      0     1  op      (1 = BOOTREQUEST, 2 = BOOTREPLY)
//!      1     4  xid     transaction id, client-chosen
//!      5     2  secs    elapsed seconds, advertised as a constant
//!      7     2  flags   broadcast bit, always 0 here
//!      9     4  ciaddr  client address
//!     13     4  yiaddr  "your" address, assigned by the server
//!     17     4  siaddr  server address
//!     21     4  giaddr  relay gateway address
//!     25    16  chaddr  client hardware address, zero-padded
//!     41    64  sname   unused, blank
//!    105   128  file    unused, blank
//!    233     -  options TLV list
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use super::options::Options;
use super::DecodeError;

/// Fixed header size up to the start of the option list.
pub const HEADER_LEN: usize = 233;

const CHADDR_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;

/// Value written into `secs` on every outbound message. No timer backs
/// this field and servers do not match on it.
const FIXED_SECS: u16 = 10;

/// BOOTP operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    BootRequest = 1,
    BootReply = 2,
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::BootRequest),
            2 => Ok(Opcode::BootReply),
            other => Err(DecodeError::Opcode(other)),
        }
    }
}

/// A DHCP message, either direction.
///
/// `sname` and `file` are always blank in this client and are not stored;
/// encoding zero-fills them and decoding skips over them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub op: Opcode,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; CHADDR_LEN],
    pub options: Options,
}

impl Message {
    /// Builds a client-originated message.
    ///
    /// `ciaddr` and `giaddr` are zeroed, `secs` is the fixed constant, the
    /// broadcast flag stays clear and `chaddr` is the MAC padded to 16
    /// bytes. Discover passes zero for `yiaddr`/`siaddr`; Request echoes
    /// the offered and server addresses.
    pub fn outbound(
        op: Opcode,
        xid: u32,
        yiaddr: Ipv4Addr,
        siaddr: Ipv4Addr,
        client_mac: &[u8],
        options: Options,
    ) -> Self {
        let mut chaddr = [0u8; CHADDR_LEN];
        let hlen = client_mac.len().min(CHADDR_LEN);
        chaddr[..hlen].copy_from_slice(&client_mac[..hlen]);

        Message {
            op,
            xid,
            secs: FIXED_SECS,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr,
            siaddr,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            options,
        }
    }

    /// Serializes the fixed header and appends the encoded option list.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 64);

        buf.put_u8(self.op as u8);
        buf.put_u32(self.xid);
        buf.put_u16(self.secs);
        buf.put_u16(self.flags);
        buf.put_slice(&self.ciaddr.octets());
        buf.put_slice(&self.yiaddr.octets());
        buf.put_slice(&self.siaddr.octets());
        buf.put_slice(&self.giaddr.octets());
        buf.put_slice(&self.chaddr);
        buf.put_bytes(0, SNAME_LEN);
        buf.put_bytes(0, FILE_LEN);
        self.options.encode_into(&mut buf);

        buf.freeze()
    }

    /// Parses an inbound UDP payload.
    ///
    /// The caller supplies already-demultiplexed envelope data; this only
    /// sees the DHCP message itself.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                offset: raw.len(),
                needed: HEADER_LEN - raw.len(),
            });
        }

        let mut buf = raw;
        let op = Opcode::try_from(buf.get_u8())?;
        let xid = buf.get_u32();
        let secs = buf.get_u16();
        let flags = buf.get_u16();
        let ciaddr = Ipv4Addr::from(buf.get_u32());
        let yiaddr = Ipv4Addr::from(buf.get_u32());
        let siaddr = Ipv4Addr::from(buf.get_u32());
        let giaddr = Ipv4Addr::from(buf.get_u32());
        let mut chaddr = [0u8; CHADDR_LEN];
        buf.copy_to_slice(&mut chaddr);
        buf.advance(SNAME_LEN + FILE_LEN);

        let options = Options::decode(buf)?;

        Ok(Message {
            op,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            options,
        })
    }
}
