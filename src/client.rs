//! DHCP client driver.
//!
//! The driver owns the socket and plays the event loop the state machine
//! expects: it starts the discovery, then feeds every received datagram
//! into [`DhcpV4Handler::input`] until the machine holds a lease. Calls
//! into the machine are strictly sequential, which is the serialization
//! the core requires.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::config::ClientConfig;
use crate::error::LeaseholdError;
use crate::network::{self, LinuxNetworkStack};
use crate::v4::envelope::{Ipv4Envelope, UdpEnvelope};
use crate::v4::handler::{DhcpV4Handler, Offer};

pub struct DhcpClient {
    config: ClientConfig,
    socket: Arc<UdpSocket>,
}

impl DhcpClient {
    pub async fn new(config: ClientConfig) -> Result<Self, LeaseholdError> {
        let socket = network::broadcast_socket(&config.interface, config.client_port)?;

        Ok(Self {
            config,
            socket: Arc::new(socket),
        })
    }

    /// Runs the exchange to completion and returns the confirmed lease.
    ///
    /// There is no timeout or retry in the exchange: with a silent server
    /// this never returns. Callers wanting resilience race this future
    /// against their own deadline and call it again.
    pub async fn run(&mut self) -> Result<Offer, LeaseholdError> {
        let stack = LinuxNetworkStack::new(
            Arc::clone(&self.socket),
            self.config.mac_address.clone(),
            self.config.broadcast_address,
            self.config.interface.clone(),
        );
        let mut rng = StdRng::from_os_rng();
        let mut machine =
            DhcpV4Handler::start_discovery(stack, &mut rng, &self.config.client_name).await?;

        let mut buf = [0u8; 1500];
        loop {
            let (len, addr) = self.socket.recv_from(&mut buf).await?;
            tracing::debug!("Received {} bytes from {}", len, addr);

            let source = match addr.ip() {
                IpAddr::V4(ip) => ip,
                IpAddr::V6(_) => {
                    tracing::debug!("Ignoring non-IPv4 datagram from {}", addr);
                    continue;
                }
            };
            // The kernel already demultiplexed the IP and UDP headers;
            // reassemble the envelope data the machine dispatches on.
            let ip_envelope = Ipv4Envelope::new(source, self.config.broadcast_address);
            let udp_envelope = UdpEnvelope::new(
                addr.port(),
                self.config.client_port,
                Bytes::copy_from_slice(&buf[..len]),
            );

            machine.input(&ip_envelope, &udp_envelope).await?;

            if let Some(offer) = machine.lease() {
                return Ok(offer.clone());
            }
        }
    }
}
