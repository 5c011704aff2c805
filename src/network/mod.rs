//! Socket plumbing for broadcast DHCP traffic.

pub mod configurator;
pub mod stack;

pub use configurator::NetworkConfigurator;
pub use stack::{LinuxNetworkStack, NetworkStack};

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket},
};
use thiserror::Error;
use tokio::net::UdpSocket as TokioUdpSocket;

/// Defines all possible errors for socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Failed to create a new socket")]
    CreateSocket(#[source] io::Error),

    #[error("Failed to set SO_REUSEADDR on socket")]
    SetReuseAddress(#[source] io::Error),

    #[error("Failed to enable broadcast on socket")]
    SetBroadcast(#[source] io::Error),

    #[error("Failed to set SO_BINDTODEVICE on interface '{interface}'")]
    BindToDevice {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind socket to address")]
    BindSocket(#[source] io::Error),

    #[error("Failed to set socket to non-blocking mode")]
    SetNonBlocking(#[source] io::Error),

    #[error("Failed to convert socket to TokioUdpSocket")]
    ConvertToTokio(#[source] io::Error),

    #[allow(dead_code)]
    #[error("Binding to a specific device is not implemented on this platform")]
    NotImplemented,
}

/// Creates a `tokio::net::UdpSocket` able to broadcast from one device.
///
/// DHCP needs a socket that is bound to the client port on a specific
/// interface and may send to 255.255.255.255, so the options have to go
/// on before binding; `socket2` exposes that window.
///
/// # Arguments
/// * `interface` - The name of the network interface (e.g., "eth0").
/// * `port` - The port number to bind the socket to, 68 for a client.
#[cfg(target_os = "linux")]
pub fn broadcast_socket(interface: &str, port: u16) -> Result<TokioUdpSocket, SocketError> {
    use socket2::{Domain, Protocol, Socket, Type};
    use std::os::fd::AsRawFd;

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::CreateSocket)?;

    // Another DHCP client (or a previous run) may still hold the port.
    socket
        .set_reuse_address(true)
        .map_err(SocketError::SetReuseAddress)?;

    // Required for sending to the broadcast address.
    socket
        .set_broadcast(true)
        .map_err(SocketError::SetBroadcast)?;

    // SO_BINDTODEVICE has no socket2 wrapper; raw setsockopt with a valid
    // fd and the interface name.
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            interface.as_ptr() as *const libc::c_void,
            interface.len() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(SocketError::BindToDevice {
            interface: interface.to_string(),
            source: io::Error::last_os_error(),
        });
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(SocketError::BindSocket)?;

    let std_socket: StdUdpSocket = socket.into();
    std_socket
        .set_nonblocking(true)
        .map_err(SocketError::SetNonBlocking)?;
    TokioUdpSocket::from_std(std_socket).map_err(SocketError::ConvertToTokio)
}

/// Fallback for non-Linux systems where `SO_BINDTODEVICE` is not available.
#[cfg(not(target_os = "linux"))]
pub fn broadcast_socket(_interface: &str, _port: u16) -> Result<TokioUdpSocket, SocketError> {
    Err(SocketError::NotImplemented)
}
