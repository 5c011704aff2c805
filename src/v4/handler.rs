//! DHCPv4 client state machine.
//!
//! The machine owns the negotiation state for one client instance and
//! drives the Discover → Offer → Request → Ack exchange. It is
//! constructed only through [`DhcpV4Handler::start_discovery`], which
//! broadcasts the Discover; there is no idle state. All inbound traffic
//! funnels through [`DhcpV4Handler::input`], which dispatches on
//! (current state, opcode, transaction id) and absorbs everything it is
//! not waiting for.
//!
//! The caller must serialize `input` calls for one instance. There is no
//! timeout: a client whose server never answers stays parked in its
//! current state, and no NAK handling exists. Callers wanting retries
//! wrap `start_discovery` themselves.

use rand::Rng;
use std::net::Ipv4Addr;

use crate::error::LeaseholdError;
use crate::network::NetworkStack;

use super::envelope::{Ipv4Envelope, UdpEnvelope, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use super::options::{DhcpOption, OptionCode, Options};
use super::packet::{Message, Opcode};

/// Lease duration substituted when the server's Ack carries no
/// AddressLeaseTime option. A lenient fallback, not a protocol violation.
const DEFAULT_LEASE_SECS: u32 = 300;

/// What the server put on the table, as tracked by the client.
///
/// Built from the Offer message with a zero lease placeholder; the lease
/// is patched in once when the Ack arrives and the record is immutable
/// after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub ip_addr: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub gateways: Vec<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub lease: u32,
    pub xid: u32,
}

/// Negotiation state for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Discover broadcast sent, awaiting an Offer.
    RequestSent { xid: u32 },
    /// Request broadcast sent, awaiting the Ack.
    OfferAccepted(Offer),
    /// Address applied. Terminal: all further input is ignored.
    LeaseHeld(Offer),
}

impl ClientState {
    pub fn name(&self) -> &'static str {
        match self {
            ClientState::RequestSent { .. } => "RequestSent",
            ClientState::OfferAccepted(_) => "OfferAccepted",
            ClientState::LeaseHeld(_) => "LeaseHeld",
        }
    }
}

pub struct DhcpV4Handler<S> {
    stack: S,
    state: ClientState,
}

impl<S: NetworkStack> DhcpV4Handler<S> {
    /// Broadcasts a Discover and returns the machine awaiting an Offer.
    ///
    /// The transaction id comes from the injected random source so tests
    /// can run deterministic sequences. Send failure propagates; there is
    /// no internal retry.
    pub async fn start_discovery<R: Rng>(
        stack: S,
        rng: &mut R,
        client_name: &str,
    ) -> Result<Self, LeaseholdError> {
        let xid: u32 = rng.random();

        let options = Options::new(vec![
            DhcpOption::ParameterRequestList(vec![
                OptionCode::SubnetMask,
                OptionCode::Router,
                OptionCode::DomainNameServer,
                OptionCode::BroadcastAddr,
            ]),
            DhcpOption::HostName(client_name.to_string()),
        ]);
        let mac = stack.hardware_addr();
        let discover = Message::outbound(
            Opcode::BootRequest,
            xid,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            &mac,
            options,
        );

        tracing::info!("Broadcasting DHCP discovery, xid={:#010x}", xid);
        broadcast(&stack, discover).await?;

        Ok(Self {
            stack,
            state: ClientState::RequestSent { xid },
        })
    }

    /// Dispatch point for all inbound DHCP traffic.
    ///
    /// Malformed packets and messages the current state is not waiting
    /// for are logged and dropped without touching state. The only hard
    /// failure is a broken broadcast send.
    pub async fn input(
        &mut self,
        ip: &Ipv4Envelope,
        udp: &UdpEnvelope,
    ) -> Result<(), LeaseholdError> {
        let message = match Message::decode(&udp.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping malformed packet from {}: {}", ip.source, e);
                return Ok(());
            }
        };

        tracing::debug!(
            "Handling {:?} xid={:#010x} from {} in state {}",
            message.op,
            message.xid,
            ip.source,
            self.state.name()
        );

        match self.state.clone() {
            ClientState::RequestSent { xid } => self.handle_offer(ip, message, xid).await,
            ClientState::OfferAccepted(offer) => self.handle_ack(ip, message, offer).await,
            ClientState::LeaseHeld(_) => {
                tracing::debug!("Unknown state for inbound packet, ignoring");
                Ok(())
            }
        }
    }

    /// Current negotiation state.
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// The confirmed lease, once the machine reaches `LeaseHeld`.
    pub fn lease(&self) -> Option<&Offer> {
        match &self.state {
            ClientState::LeaseHeld(offer) => Some(offer),
            _ => None,
        }
    }

    async fn handle_offer(
        &mut self,
        ip: &Ipv4Envelope,
        message: Message,
        xid: u32,
    ) -> Result<(), LeaseholdError> {
        if message.op != Opcode::BootReply || message.xid != xid {
            tracing::debug!("Not the awaited offer, ignoring packet from {}", ip.source);
            return Ok(());
        }

        let netmask = message.options.find(|o| match o {
            DhcpOption::SubnetMask(mask) => Some(*mask),
            _ => None,
        });
        let gateways = message.options.find_list(|o| match o {
            DhcpOption::Router(routers) => Some(routers.clone()),
            _ => None,
        });
        let dns = message.options.find_list(|o| match o {
            DhcpOption::DomainNameServer(servers) => Some(servers.clone()),
            _ => None,
        });

        let offer = Offer {
            ip_addr: message.yiaddr,
            netmask,
            gateways,
            dns,
            lease: 0,
            xid,
        };
        tracing::info!(
            "Received DHCP offer of {} from server {}, requesting it",
            offer.ip_addr,
            message.siaddr
        );

        let options = Options::new(vec![
            DhcpOption::RequestedIpAddress(offer.ip_addr),
            DhcpOption::ServerIdentifier(message.siaddr),
        ]);
        let mac = self.stack.hardware_addr();
        let request = Message::outbound(
            Opcode::BootRequest,
            xid,
            message.yiaddr,
            message.siaddr,
            &mac,
            options,
        );
        broadcast(&self.stack, request).await?;

        self.state = ClientState::OfferAccepted(offer);
        Ok(())
    }

    async fn handle_ack(
        &mut self,
        ip: &Ipv4Envelope,
        message: Message,
        mut offer: Offer,
    ) -> Result<(), LeaseholdError> {
        if message.op != Opcode::BootReply || message.xid != offer.xid {
            tracing::debug!(
                "Not the awaited acknowledgement, ignoring packet from {}",
                ip.source
            );
            return Ok(());
        }

        offer.lease = message
            .options
            .find(|o| match o {
                DhcpOption::AddressLeaseTime(secs) => Some(*secs),
                _ => None,
            })
            .unwrap_or(DEFAULT_LEASE_SECS);

        tracing::info!(
            "DHCP bind successful: {} leased for {} seconds",
            offer.ip_addr,
            offer.lease
        );

        if let Err(e) = self.stack.apply_address(offer.ip_addr, offer.netmask).await {
            tracing::error!("Failed to apply network configuration: {}", e);
            tracing::warn!("Lease obtained but network configuration failed");
        }

        self.state = ClientState::LeaseHeld(offer);
        Ok(())
    }
}

async fn broadcast<S: NetworkStack>(stack: &S, message: Message) -> Result<(), LeaseholdError> {
    let datagram = UdpEnvelope::new(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, message.encode());
    stack.send_broadcast(datagram).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    const CLIENT_MAC: [u8; 6] = [0x00, 0x0c, 0x29, 0xa8, 0x92, 0xf4];
    const SERVER_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
    const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    #[derive(Clone, Default)]
    struct MockStack {
        inner: std::sync::Arc<MockInner>,
    }

    #[derive(Default)]
    struct MockInner {
        sent: Mutex<Vec<UdpEnvelope>>,
        applied: Mutex<Vec<(Ipv4Addr, Option<Ipv4Addr>)>>,
    }

    #[async_trait]
    impl NetworkStack for MockStack {
        async fn send_broadcast(&self, datagram: UdpEnvelope) -> Result<(), LeaseholdError> {
            self.inner.sent.lock().unwrap().push(datagram);
            Ok(())
        }

        fn hardware_addr(&self) -> Bytes {
            Bytes::from_static(&CLIENT_MAC)
        }

        async fn apply_address(
            &self,
            addr: Ipv4Addr,
            netmask: Option<Ipv4Addr>,
        ) -> Result<(), LeaseholdError> {
            self.inner.applied.lock().unwrap().push((addr, netmask));
            Ok(())
        }
    }

    async fn discovering(stack: &MockStack) -> (DhcpV4Handler<MockStack>, u32) {
        let mut rng = StdRng::seed_from_u64(7);
        let machine = DhcpV4Handler::start_discovery(stack.clone(), &mut rng, "testhost")
            .await
            .unwrap();
        let xid = match machine.state() {
            ClientState::RequestSent { xid } => *xid,
            other => panic!("expected RequestSent, got {:?}", other),
        };
        (machine, xid)
    }

    fn reply(xid: u32, yiaddr: Ipv4Addr, options: Vec<DhcpOption>) -> UdpEnvelope {
        let message = Message::outbound(
            Opcode::BootReply,
            xid,
            yiaddr,
            SERVER_IP,
            &SERVER_MAC,
            Options::new(options),
        );
        UdpEnvelope::new(DHCP_SERVER_PORT, DHCP_CLIENT_PORT, message.encode())
    }

    fn from_server() -> Ipv4Envelope {
        Ipv4Envelope::new(SERVER_IP, Ipv4Addr::BROADCAST)
    }

    fn sent_messages(stack: &MockStack) -> Vec<Message> {
        stack
            .inner
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|d| Message::decode(&d.payload).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_start_discovery_broadcasts_discover() {
        let stack = MockStack::default();
        let (_machine, xid) = discovering(&stack).await;

        let sent = stack.inner.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].source_port, DHCP_CLIENT_PORT);
        assert_eq!(sent[0].destination_port, DHCP_SERVER_PORT);

        let discover = Message::decode(&sent[0].payload).unwrap();
        assert_eq!(discover.op, Opcode::BootRequest);
        assert_eq!(discover.xid, xid);
        assert_eq!(&discover.chaddr[..6], &CLIENT_MAC);

        let requested = discover.options.find(|o| match o {
            DhcpOption::ParameterRequestList(codes) => Some(codes.clone()),
            _ => None,
        });
        assert_eq!(
            requested,
            Some(vec![
                OptionCode::SubnetMask,
                OptionCode::Router,
                OptionCode::DomainNameServer,
                OptionCode::BroadcastAddr,
            ])
        );
        let hostname = discover.options.find(|o| match o {
            DhcpOption::HostName(name) => Some(name.clone()),
            _ => None,
        });
        assert_eq!(hostname, Some("testhost".to_string()));
    }

    #[tokio::test]
    async fn test_full_exchange() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        let offered = Ipv4Addr::new(10, 0, 0, 5);
        let netmask = Ipv4Addr::new(255, 255, 255, 0);
        machine
            .input(
                &from_server(),
                &reply(
                    xid,
                    offered,
                    vec![
                        DhcpOption::SubnetMask(netmask),
                        DhcpOption::Router(vec![Ipv4Addr::new(10, 0, 0, 1)]),
                        DhcpOption::DomainNameServer(vec![Ipv4Addr::new(8, 8, 8, 8)]),
                    ],
                ),
            )
            .await
            .unwrap();

        // The Offer triggers a broadcast Request naming the offered address.
        let sent = sent_messages(&stack);
        assert_eq!(sent.len(), 2);
        let request = &sent[1];
        assert_eq!(request.op, Opcode::BootRequest);
        assert_eq!(request.xid, xid);
        assert_eq!(
            request.options.find(|o| match o {
                DhcpOption::RequestedIpAddress(ip) => Some(*ip),
                _ => None,
            }),
            Some(offered)
        );
        assert_eq!(
            request.options.find(|o| match o {
                DhcpOption::ServerIdentifier(ip) => Some(*ip),
                _ => None,
            }),
            Some(SERVER_IP)
        );

        let expected = Offer {
            ip_addr: offered,
            netmask: Some(netmask),
            gateways: vec![Ipv4Addr::new(10, 0, 0, 1)],
            dns: vec![Ipv4Addr::new(8, 8, 8, 8)],
            lease: 0,
            xid,
        };
        assert_eq!(machine.state(), &ClientState::OfferAccepted(expected.clone()));

        machine
            .input(
                &from_server(),
                &reply(xid, offered, vec![DhcpOption::AddressLeaseTime(600)]),
            )
            .await
            .unwrap();

        assert_eq!(
            stack.inner.applied.lock().unwrap().as_slice(),
            &[(offered, Some(netmask))]
        );
        let held = Offer {
            lease: 600,
            ..expected
        };
        assert_eq!(machine.state(), &ClientState::LeaseHeld(held.clone()));
        assert_eq!(machine.lease(), Some(&held));
    }

    #[tokio::test]
    async fn test_xid_mismatch_leaves_request_sent() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        machine
            .input(
                &from_server(),
                &reply(xid.wrapping_add(1), Ipv4Addr::new(10, 0, 0, 9), vec![]),
            )
            .await
            .unwrap();

        assert_eq!(machine.state(), &ClientState::RequestSent { xid });
        assert_eq!(stack.inner.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_xid_mismatch_leaves_offer_accepted() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        let offered = Ipv4Addr::new(10, 0, 0, 5);
        machine
            .input(&from_server(), &reply(xid, offered, vec![]))
            .await
            .unwrap();
        let accepted = machine.state().clone();
        assert!(matches!(accepted, ClientState::OfferAccepted(_)));

        machine
            .input(
                &from_server(),
                &reply(
                    xid.wrapping_add(1),
                    offered,
                    vec![DhcpOption::AddressLeaseTime(600)],
                ),
            )
            .await
            .unwrap();

        assert_eq!(machine.state(), &accepted);
        assert!(stack.inner.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lease_defaults_without_lease_time() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        let offered = Ipv4Addr::new(192, 168, 1, 50);
        machine
            .input(&from_server(), &reply(xid, offered, vec![]))
            .await
            .unwrap();
        machine
            .input(&from_server(), &reply(xid, offered, vec![]))
            .await
            .unwrap();

        assert_eq!(machine.lease().map(|o| o.lease), Some(300));
    }

    #[tokio::test]
    async fn test_lease_held_is_terminal() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        let offered = Ipv4Addr::new(10, 0, 0, 5);
        machine
            .input(&from_server(), &reply(xid, offered, vec![]))
            .await
            .unwrap();
        machine
            .input(
                &from_server(),
                &reply(xid, offered, vec![DhcpOption::AddressLeaseTime(600)]),
            )
            .await
            .unwrap();
        let held = machine.state().clone();

        // Duplicates, replays, and fresh offers all bounce off.
        for lease in [60, 600, 6000] {
            machine
                .input(
                    &from_server(),
                    &reply(xid, offered, vec![DhcpOption::AddressLeaseTime(lease)]),
                )
                .await
                .unwrap();
        }
        machine
            .input(
                &from_server(),
                &reply(xid, Ipv4Addr::new(10, 0, 0, 77), vec![]),
            )
            .await
            .unwrap();

        assert_eq!(machine.state(), &held);
        assert_eq!(stack.inner.applied.lock().unwrap().len(), 1);
        assert_eq!(stack.inner.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_packet_is_dropped() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        let garbage = UdpEnvelope::new(
            DHCP_SERVER_PORT,
            DHCP_CLIENT_PORT,
            Bytes::from_static(&[0x02, 0x00, 0x01]),
        );
        machine.input(&from_server(), &garbage).await.unwrap();

        assert_eq!(machine.state(), &ClientState::RequestSent { xid });
    }

    #[tokio::test]
    async fn test_boot_request_op_is_ignored() {
        let stack = MockStack::default();
        let (mut machine, xid) = discovering(&stack).await;

        // Another client's request, right xid by coincidence.
        let message = Message::outbound(
            Opcode::BootRequest,
            xid,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            &SERVER_MAC,
            Options::default(),
        );
        let datagram = UdpEnvelope::new(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, message.encode());
        machine.input(&from_server(), &datagram).await.unwrap();

        assert_eq!(machine.state(), &ClientState::RequestSent { xid });
    }
}
