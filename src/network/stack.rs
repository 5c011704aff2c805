//! The transport facilities the client core borrows from the host.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use super::configurator::NetworkConfigurator;
use crate::error::LeaseholdError;
use crate::v4::envelope::UdpEnvelope;

/// What the DHCP state machine needs from the surrounding network stack.
///
/// The core assumes nothing else: no timers, no persistent lease storage.
/// Implementations back this with a kernel socket (as
/// [`LinuxNetworkStack`] does) or with a recording double in tests.
#[async_trait]
pub trait NetworkStack: Send + Sync {
    /// Transmits one UDP datagram to the IPv4 broadcast address.
    ///
    /// Failure propagates to the caller; there is no internal retry.
    async fn send_broadcast(&self, datagram: UdpEnvelope) -> Result<(), LeaseholdError>;

    /// The local hardware address, used to populate `chaddr`.
    fn hardware_addr(&self) -> Bytes;

    /// Configures the local interface with the leased address.
    async fn apply_address(
        &self,
        addr: Ipv4Addr,
        netmask: Option<Ipv4Addr>,
    ) -> Result<(), LeaseholdError>;
}

/// Production stack over a broadcast-capable kernel UDP socket.
pub struct LinuxNetworkStack {
    socket: Arc<UdpSocket>,
    mac_address: Bytes,
    broadcast_address: Ipv4Addr,
    configurator: NetworkConfigurator,
}

impl LinuxNetworkStack {
    pub fn new(
        socket: Arc<UdpSocket>,
        mac_address: Bytes,
        broadcast_address: Ipv4Addr,
        interface: String,
    ) -> Self {
        Self {
            socket,
            mac_address,
            broadcast_address,
            configurator: NetworkConfigurator::new(interface),
        }
    }
}

#[async_trait]
impl NetworkStack for LinuxNetworkStack {
    async fn send_broadcast(&self, datagram: UdpEnvelope) -> Result<(), LeaseholdError> {
        // The socket is already bound to the source port; the kernel
        // frames the payload, so only the destination comes from the
        // envelope here. `UdpEnvelope::encode` is for transports that
        // build the header themselves.
        let target = (self.broadcast_address, datagram.destination_port);
        self.socket
            .send_to(&datagram.payload, target)
            .await
            .map_err(LeaseholdError::Send)?;
        Ok(())
    }

    fn hardware_addr(&self) -> Bytes {
        self.mac_address.clone()
    }

    async fn apply_address(
        &self,
        addr: Ipv4Addr,
        netmask: Option<Ipv4Addr>,
    ) -> Result<(), LeaseholdError> {
        self.configurator.apply(addr, netmask).await
    }
}
