use crate::error::Error::InvalidSourceAddr;
use crate::error::Result;
use crate::net::platform::Platform;
use crate::net::socket::Socket;
use crate::types::Port;
use std::net::{IpAddr, SocketAddr};

/// Discover or validate a source address.
pub struct SourceAddr;

impl SourceAddr {
    /// Discover the local `IpAddr` used to reach `target_addr`.
    pub fn discover<P: Platform>(target_addr: IpAddr, dest_port: Port) -> Result<IpAddr> {
        P::discover_local_addr(target_addr, dest_port.0)
    }

    /// Validate that we can bind to the source `IpAddr`.
    pub fn validate<S: Socket>(source_addr: IpAddr) -> Result<IpAddr> {
        let mut socket = match source_addr {
            IpAddr::V4(_) => S::new_udp_dgram_socket_ipv4(),
            IpAddr::V6(_) => S::new_udp_dgram_socket_ipv6(),
        }?;
        let sock_addr = SocketAddr::new(source_addr, 0);
        match socket.bind(sock_addr) {
            Ok(()) => Ok(source_addr),
            Err(_) => Err(InvalidSourceAddr(sock_addr.ip())),
        }
    }
}
