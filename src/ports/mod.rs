//! Port allocation for this instance's service URL and additional ports.

use std::net::{IpAddr, SocketAddr, TcpListener};
use tracing::warn;

/// Hands out a currently free port on `address`; `None` means exhaustion.
pub trait PortAllocator: Send + Sync {
    fn allocate(&self, address: IpAddr) -> Option<u16>;
}

/// Asks the OS for an ephemeral port by binding port 0 and releasing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralPorts;

impl PortAllocator for EphemeralPorts {
    fn allocate(&self, address: IpAddr) -> Option<u16> {
        let listener = match TcpListener::bind(SocketAddr::new(address, 0)) {
            Ok(listener) => listener,
            Err(e) => {
                warn!(component = "ports", event = "allocate_failed", address = %address, error = %e, "no free port");
                return None;
            }
        };
        listener
            .local_addr()
            .ok()
            .map(|addr| addr.port())
            .filter(|port| *port != 0)
    }
}
