use crate::error::IoResult as Result;
use std::net::SocketAddr;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create an `IPv4` raw socket for sending probes with their IP header included.
    fn new_send_socket_ipv4() -> Result<Self>;
    /// Create an `IPv6` raw socket for sending probes with their IP header included.
    fn new_send_socket_ipv6() -> Result<Self>;
    /// Create an `IPv4` raw socket for receiving `ICMP` packets.
    fn new_recv_socket_ipv4() -> Result<Self>;
    /// Create an `IPv6` raw socket for receiving `ICMPv6` packets.
    fn new_recv_socket_ipv6() -> Result<Self>;
    /// Create (non-raw) IPv4/UDP socket for local address validation.
    fn new_udp_dgram_socket_ipv4() -> Result<Self>;
    /// Create (non-raw) IPv6/UDP socket for local address validation.
    fn new_udp_dgram_socket_ipv6() -> Result<Self>;
    fn bind(&mut self, address: SocketAddr) -> Result<()>;
    fn connect(&mut self, address: SocketAddr) -> Result<()>;
    fn local_addr(&mut self) -> Result<Option<SocketAddr>>;
    fn set_recv_buffer_size(&mut self, size: usize) -> Result<()>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
    /// Returns true if the socket becomes readable before the timeout, false otherwise.
    fn is_readable(&mut self, timeout: Duration) -> Result<bool>;
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;
}

#[cfg(test)]
pub mod tests {
    #[macro_export]
    macro_rules! mocket_recv_from {
        ($packet: expr, $addr: expr) => {
            move |buf: &mut [u8]| -> IoResult<(usize, Option<SocketAddr>)> {
                buf[..$packet.len()].copy_from_slice(&$packet);
                Ok(($packet.len(), Some($addr)))
            }
        };
    }
}
