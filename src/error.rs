use crate::network::SocketError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeaseholdError {
    #[error("Socket operation failed")]
    Socket(#[from] SocketError),

    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("Broadcast send failed")]
    Send(#[source] io::Error),

    #[error("Failed to parse MAC address: {0}")]
    MacParse(String),

    #[error("Interface '{0}' not found or has no MAC address")]
    InterfaceInvalid(String),

    #[error("Failed to configure interface: {0}")]
    Configure(String),
}
