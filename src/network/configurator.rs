//! Applies a granted lease to the local interface.

use std::net::Ipv4Addr;
use tokio::process::Command;

use crate::error::LeaseholdError;

/// Configures addresses on one named interface via the system `ip` tool.
pub struct NetworkConfigurator {
    interface: String,
}

impl NetworkConfigurator {
    pub fn new(interface: String) -> Self {
        Self { interface }
    }

    /// Installs `addr` on the interface.
    ///
    /// `ip addr replace` is idempotent, so re-running after a duplicate
    /// Ack does not fail. Needs CAP_NET_ADMIN.
    pub async fn apply(
        &self,
        addr: Ipv4Addr,
        netmask: Option<Ipv4Addr>,
    ) -> Result<(), LeaseholdError> {
        let target = format!("{}/{}", addr, prefix_len(netmask));
        tracing::debug!("Configuring {} on {}", target, self.interface);

        let status = Command::new("ip")
            .args(["addr", "replace", &target, "dev", &self.interface])
            .status()
            .await?;
        if !status.success() {
            return Err(LeaseholdError::Configure(format!(
                "ip addr replace {} dev {} exited with {}",
                target, self.interface, status
            )));
        }

        tracing::info!("Configured {} on {}", target, self.interface);
        Ok(())
    }
}

/// Prefix length for the given netmask; no netmask means a host address.
fn prefix_len(netmask: Option<Ipv4Addr>) -> u32 {
    netmask.map_or(32, |mask| u32::from(mask).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len(Some(Ipv4Addr::new(255, 255, 255, 0))), 24);
        assert_eq!(prefix_len(Some(Ipv4Addr::new(255, 255, 0, 0))), 16);
        assert_eq!(prefix_len(Some(Ipv4Addr::new(255, 255, 255, 255))), 32);
        assert_eq!(prefix_len(None), 32);
    }
}
