pub mod byte_order;

pub use byte_order::Ipv4ByteOrder;
use std::net::IpAddr;

#[cfg(unix)]
mod unix;

use crate::error::Result;
#[cfg(unix)]
pub use unix::*;

/// Platform specific operations.
///
/// Abstracts over the differences between operating systems in how raw `IPv4` headers must be
/// encoded and how a local source address is found.
///
/// # Examples
///
/// Implementing the `Platform` trait for a custom platform:
///
/// ```no_run
/// use yarrp_core::net::platform::{Platform, Ipv4ByteOrder};
/// use yarrp_core::Result;
/// use std::net::IpAddr;
///
/// struct MyPlatform;
///
/// impl Platform for MyPlatform {
///     fn byte_order_for_address(addr: IpAddr) -> Result<Ipv4ByteOrder> {
///         // Implementation specific to the platform
/// #       unimplemented!()
///     }
///
///     fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr> {
///         // Implementation specific to the platform
/// #       unimplemented!()
///     }
/// }
/// ```
///
/// # Errors
///
/// Implementations should return an error if any of the operations fail due to platform-specific
/// limitations or configurations.
#[cfg_attr(test, mockall::automock)]
pub trait Platform {
    /// Determine the required byte ordering for IPv4 header fields.
    ///
    /// This method is used to determine the byte ordering for the `total_length`, `flags`, and
    /// `fragment_offset` fields of the IPv4 header, which may vary between different operating
    /// systems.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte ordering cannot be determined for the specified address.
    fn byte_order_for_address(addr: IpAddr) -> Result<Ipv4ByteOrder>;

    /// Discover a local `IpAddr` which can route to the target address.
    ///
    /// No packets are sent; a datagram socket is connected and its local address read back.
    ///
    /// # Errors
    ///
    /// Returns an error if a routing local IP address cannot be found for the specified target
    /// address.
    fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr>;
}
