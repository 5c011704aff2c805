use bytes::{BufMut, Bytes, BytesMut};
use clap::Parser;
use std::net::Ipv4Addr;

use crate::error::LeaseholdError;
use crate::v4::envelope::{DHCP_CLIENT_PORT, DHCP_SERVER_PORT};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The network interface to lease an address for (e.g., 'eth0')
    #[arg(short, long)]
    pub interface: String,

    /// Client name carried in the discovery's host name option
    #[arg(short = 'n', long, default_value = "leasehold")]
    pub client_name: String,
}

pub struct ClientConfig {
    pub interface: String,
    pub mac_address: Bytes,
    pub client_name: String,
    pub client_port: u16,
    pub server_port: u16,
    pub broadcast_address: Ipv4Addr,
}

impl ClientConfig {
    pub fn new(interface: String, mac_address: Bytes) -> Self {
        Self {
            interface,
            mac_address,
            client_name: "leasehold".to_string(),
            client_port: DHCP_CLIENT_PORT,
            server_port: DHCP_SERVER_PORT,
            broadcast_address: Ipv4Addr::BROADCAST,
        }
    }

    pub fn with_client_name(mut self, client_name: String) -> Self {
        self.client_name = client_name;
        self
    }
}

/// Parses a MAC address string (e.g., "0a:1b:2c:3d:4e:5f") into `Bytes`.
pub fn parse_mac_address(mac_str: &str) -> Result<Bytes, LeaseholdError> {
    let mut bytes = BytesMut::new();
    for byte_str in mac_str.split(':') {
        if byte_str.is_empty() {
            continue;
        }
        let byte = u8::from_str_radix(byte_str, 16)
            .map_err(|_| LeaseholdError::MacParse(mac_str.to_string()))?;
        bytes.put_u8(byte);
    }
    if bytes.len() != 6 {
        return Err(LeaseholdError::MacParse(mac_str.to_string()));
    }
    Ok(bytes.freeze())
}
