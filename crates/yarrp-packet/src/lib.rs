//! Packet wire format parsing and building for stateless traceroute probes.
//!
//! The following packet are supported:
//! - `IPv4` and `IPv6`
//! - `ICMPv4` and `ICMPv6` (echo, time exceeded and destination unreachable)
//! - `UDP` and `TCP`
//! - `ICMP` extensions and `MPLS` label stacks
//! - Ethernet II frame headers
//! - the `IPv6` probe state trailer
//!
//! # Endianness
//!
//! The internal representation is held in network byte order (big-endian) and
//! all accessor methods take and return data in host byte order, converting as
//! necessary for the given architecture.
//!
//! # Example
//!
//! The following example builds a `UDP` header whose checksum is forced to a
//! chosen value by crafting two payload bytes:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use std::net::Ipv4Addr;
//! use yarrp_packet::checksum::{compute_data, udp_ipv4_checksum};
//! use yarrp_packet::udp::UdpPacket;
//!
//! let src = Ipv4Addr::new(10, 0, 0, 1);
//! let dst = Ipv4Addr::new(10, 0, 0, 2);
//! let mut buf = [0; 10];
//! let mut udp = UdpPacket::new(&mut buf)?;
//! udp.set_source(1234);
//! udp.set_destination(53);
//! udp.set_length(10);
//! let start = udp_ipv4_checksum(udp.packet(), src, dst);
//! udp.set_payload(&compute_data(start, 0x1234).to_be_bytes());
//! assert_eq!(0x1234, udp_ipv4_checksum(udp.packet(), src, dst));
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod buffer;

/// Packet errors.
pub mod error;

/// Functions for calculating network checksums.
pub mod checksum;

/// Ethernet frames.
pub mod ethernet;

/// `ICMPv4` packets.
pub mod icmpv4;

/// `ICMPv6` packets.
pub mod icmpv6;

/// `ICMP` extensions.
pub mod icmp_extension;

/// `IPv4` packets.
pub mod ipv4;

/// `IPv6` packets.
pub mod ipv6;

/// The `IPv6` probe state trailer.
pub mod trailer;

/// `UDP` packets.
pub mod udp;

/// `TCP` packets.
pub mod tcp;

/// The IP packet next layer protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IpProtocol {
    Icmp,
    IcmpV6,
    Udp,
    Tcp,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::IcmpV6 => 58,
            Self::Udp => 17,
            Self::Tcp => 6,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Icmp,
            58 => Self::IcmpV6,
            17 => Self::Udp,
            6 => Self::Tcp,
            p => Self::Other(p),
        }
    }
}

/// Format a payload as a hexadecimal string.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}
