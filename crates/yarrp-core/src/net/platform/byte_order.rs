use crate::error::Result;
use crate::net::platform::{Platform, PlatformImpl};
use std::net::IpAddr;

/// The byte order to encode the `total_length`, `flags` and `fragment_offset` fields of the IPv4
/// header.
///
/// The required byte order of the length field of a raw `IPv4` header is inconsistent between
/// operating systems and operating system versions.  Linux accepts either byte order, FreeBSD 11
/// requires network byte order while `macOS` and some older BSDs require host byte order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Ipv4ByteOrder {
    #[cfg(all(unix, not(target_os = "linux")))]
    Host,
    Network,
}

impl Ipv4ByteOrder {
    /// Discover the required byte ordering for the IPv4 header fields `total_length`, `flags` and
    /// `fragment_offset`.
    ///
    /// This is achieved by creating a raw socket and attempting to send an `IPv4` packet to
    /// localhost with the `total_length` set in either host byte order or network byte order.
    /// The OS will return an `InvalidInput` error if the buffer provided is smaller than the
    /// `total_length` indicated, which will be the case when the byte order is set incorrectly.
    pub fn for_address(addr: IpAddr) -> Result<Self> {
        PlatformImpl::byte_order_for_address(addr)
    }

    /// Adjust an IPv4 `total_length` or `flags` header value.
    #[must_use]
    pub const fn adjust_length(self, ipv4_total_length: u16) -> u16 {
        match self {
            #[cfg(all(unix, not(target_os = "linux")))]
            Self::Host => ipv4_total_length.swap_bytes(),
            Self::Network => ipv4_total_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_order_is_unchanged() {
        assert_eq!(0x1234, Ipv4ByteOrder::Network.adjust_length(0x1234));
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    #[test]
    fn test_host_order_is_swapped() {
        assert_eq!(0x3412, Ipv4ByteOrder::Host.adjust_length(0x1234));
    }
}
