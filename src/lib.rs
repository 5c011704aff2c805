//! # Leasehold - An Asynchronous DHCPv4 Client
//!
//! Leasehold negotiates an IPv4 address lease over broadcast UDP using
//! the standard DORA (Discover, Offer, Request, Acknowledge) exchange and
//! applies the granted address to the local interface. The wire format -
//! fixed message header, TLV option list, UDP framing - is implemented
//! in-crate, under a transaction-keyed state machine.
//!
//! ## Features
//!
//! - Complete Discover → Offer → Request → Ack negotiation
//! - Hand-rolled, round-trippable wire codec
//! - Transaction-id gating against stray and replayed packets
//! - Asynchronous operation using Tokio, one suspension point per step
//! - Network interface configuration on acknowledgement (Linux focus)
//!
//! ## Example
//!
//! ```rust,no_run
//! use leasehold::{ClientConfig, DhcpClient};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mac_addr = Bytes::from_static(&[0x00, 0x0c, 0x29, 0xa8, 0x92, 0xf4]);
//!     let config = ClientConfig::new("eth0".to_string(), mac_addr);
//!     let mut client = DhcpClient::new(config).await?;
//!     let lease = client.run().await?;
//!     println!("Obtained lease: {:?}", lease);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod network;
pub mod v4;

pub use client::DhcpClient;
pub use config::{Args, ClientConfig};
pub use error::LeaseholdError;
pub use network::NetworkStack;
pub use v4::{ClientState, DhcpV4Handler, Offer};
