use crate::error::Result;
use std::net::IpAddr;
use std::time::Duration;

/// Platform specific network code.
pub mod platform;

/// A network socket.
pub mod socket;

/// Channels for sending probes and receiving replies.
pub mod channel;

/// Determine the source address.
pub mod source;

/// The platform specific socket type.
#[cfg(unix)]
pub use platform::{PlatformImpl, SocketImpl};

/// Sends encoded probes.
///
/// The probe bytes carry their own network header.
#[cfg_attr(test, mockall::automock)]
pub trait ProbeSender: Send {
    /// Send one encoded probe towards `target`.
    fn send_probe(&mut self, packet: &[u8], target: IpAddr) -> Result<()>;
}

/// Receives raw `ICMP` packets.
#[cfg_attr(test, mockall::automock)]
pub trait ReplyReceiver: Send {
    /// Wait up to `timeout` for the next `ICMP` packet and copy it into `buf`.
    ///
    /// Returns the number of bytes read and the address which sent the packet, or `None` if the
    /// wait timed out.  `IPv4` packets include their IP header, `IPv6` packets do not.
    fn recv_packet(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, IpAddr)>>;
}
