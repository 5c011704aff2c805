use clap::Parser;
use tokio::fs;
use tracing_subscriber::EnvFilter;

use leasehold::{config, Args, ClientConfig, DhcpClient, LeaseholdError};

#[tokio::main]
async fn main() -> Result<(), LeaseholdError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Read the hardware (MAC) address from the system.
    let mac_path = format!("/sys/class/net/{}/address", args.interface);
    let mac_str = fs::read_to_string(&mac_path)
        .await
        .map_err(|_| LeaseholdError::InterfaceInvalid(args.interface.clone()))?;
    let mac_address = config::parse_mac_address(mac_str.trim())?;

    tracing::info!(
        "Starting discovery on interface {} ({})",
        args.interface,
        mac_str.trim()
    );

    let config = ClientConfig::new(args.interface, mac_address).with_client_name(args.client_name);
    let mut client = DhcpClient::new(config).await?;
    let lease = client.run().await?;

    tracing::info!(
        "Lease acquired: {}{} for {} seconds",
        lease.ip_addr,
        lease
            .netmask
            .map(|m| format!(" netmask {}", m))
            .unwrap_or_default(),
        lease.lease
    );
    Ok(())
}
