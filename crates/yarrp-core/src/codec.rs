//! Stateless probe encoding and reply decoding.
//!
//! A probe carries everything needed to match its reply: the TTL and instance in the `IPv4`
//! identification field (or the `IPv6` trailer), the send time in a transport field, and a
//! checksum of the destination in the source port (or `ICMP` checksum) so that the quoted
//! destination of a reply can be verified.

use crate::config::ProbeType;
use crate::constants::MAX_MPLS_LABELS;
use crate::error::{Error, Result};
use crate::net::platform::Ipv4ByteOrder;
use crate::types::{Anomaly, InstanceId, Port, Target};
use arrayvec::ArrayVec;
use std::net::IpAddr;
use tracing::instrument;
use yarrp_packet::ethernet::MacAddr;
use yarrp_packet::icmp_extension::{ExtensionObject, ExtensionsPacket, MplsLabelStackMember};

/// `IPv4` probe encoding and `ICMPv4` reply decoding.
mod ipv4;

/// `IPv6` probe encoding and `ICMPv6` reply decoding.
mod ipv6;

/// The largest packet sent or received, including an optional link layer header.
pub const MAX_PACKET_SIZE: usize = 1514;

/// The largest IP packet sent.
pub const MAX_PROBE_SIZE: usize = 1500;

/// The link layer addresses of a probe sent with an Ethernet header.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ethernet {
    pub source: MacAddr,
    pub destination: MacAddr,
}

/// Builds probe packets.
///
/// The same buffer is reused for every probe; each call to [`Encoder::encode`] returns a view
/// of the bytes to send.
pub struct Encoder {
    probe_type: ProbeType,
    src_addr: IpAddr,
    dest_port: Port,
    instance: InstanceId,
    byte_order: Ipv4ByteOrder,
    ethernet: Option<Ethernet>,
    sequence: u16,
    buf: [u8; MAX_PACKET_SIZE],
}

impl Encoder {
    #[must_use]
    pub const fn new(
        probe_type: ProbeType,
        src_addr: IpAddr,
        dest_port: Port,
        instance: InstanceId,
    ) -> Self {
        Self {
            probe_type,
            src_addr,
            dest_port,
            instance,
            byte_order: Ipv4ByteOrder::Network,
            ethernet: None,
            sequence: 0,
            buf: [0; MAX_PACKET_SIZE],
        }
    }

    #[must_use]
    pub const fn with_byte_order(self, byte_order: Ipv4ByteOrder) -> Self {
        Self { byte_order, ..self }
    }

    /// Prepend an Ethernet header to every `IPv6` probe.
    #[must_use]
    pub const fn with_ethernet(self, ethernet: Ethernet) -> Self {
        Self {
            ethernet: Some(ethernet),
            ..self
        }
    }

    #[must_use]
    pub const fn probe_type(&self) -> ProbeType {
        self.probe_type
    }

    #[must_use]
    pub const fn src_addr(&self) -> IpAddr {
        self.src_addr
    }

    /// Encode a probe to `target` sent `elapsed` time units into the scan.
    #[instrument(skip(self), level = "trace")]
    pub fn encode(&mut self, target: Target, elapsed: u32) -> Result<&[u8]> {
        let len = match (self.src_addr, target.addr) {
            (IpAddr::V4(src), IpAddr::V4(dst)) if !self.probe_type.is_ipv6() => {
                ipv4::encode(
                    &mut self.buf,
                    &ipv4::Probe {
                        probe_type: self.probe_type,
                        src,
                        dst,
                        ttl: target.ttl.0,
                        instance: self.instance,
                        dest_port: self.dest_port,
                        elapsed,
                        byte_order: self.byte_order,
                    },
                )?
            }
            (IpAddr::V6(src), IpAddr::V6(dst)) if self.probe_type.is_ipv6() => {
                self.sequence = self.sequence.wrapping_add(1);
                ipv6::encode(
                    &mut self.buf,
                    &ipv6::Probe {
                        probe_type: self.probe_type,
                        src,
                        dst,
                        ttl: target.ttl.0,
                        instance: self.instance,
                        dest_port: self.dest_port,
                        elapsed,
                        sequence: self.sequence,
                        ethernet: self.ethernet,
                    },
                )?
            }
            _ => return Err(Error::AddressFamily(target.addr.to_string())),
        };
        Ok(&self.buf[..len])
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("probe_type", &self.probe_type)
            .field("src_addr", &self.src_addr)
            .field("dest_port", &self.dest_port)
            .field("instance", &self.instance)
            .field("ethernet", &self.ethernet)
            .finish_non_exhaustive()
    }
}

/// A decoded reply to one of our probes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reply {
    /// The address which sent the reply.
    pub hop: IpAddr,
    /// The destination of the probe which triggered the reply.
    pub target: IpAddr,
    pub icmp_type: u8,
    pub icmp_code: u8,
    /// The protocol of the quoted probe, zero if the reply carried no quote.
    pub protocol: u8,
    /// The TTL the probe was sent with.
    pub ttl: u8,
    pub instance: InstanceId,
    pub rtt: u32,
    pub sport: u16,
    pub dport: u16,
    pub ipid: u16,
    pub probe_size: u16,
    pub reply_size: u16,
    pub reply_ttl: u8,
    pub reply_tos: u8,
    pub mpls: ArrayVec<MplsLabelStackMember, MAX_MPLS_LABELS>,
    pub anomalies: Anomaly,
}

impl Reply {
    fn new(hop: IpAddr, icmp_type: u8, icmp_code: u8) -> Self {
        Self {
            hop,
            target: hop,
            icmp_type,
            icmp_code,
            protocol: 0,
            ttl: 0,
            instance: InstanceId(0),
            rtt: 0,
            sport: 0,
            dport: 0,
            ipid: 0,
            probe_size: 0,
            reply_size: 0,
            reply_ttl: 0,
            reply_tos: 0,
            mpls: ArrayVec::new(),
            anomalies: Anomaly::empty(),
        }
    }

    /// True if the reply carries recoverable probe state and no anomaly.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.anomalies.is_empty() && (self.sport != 0 || self.dport != 0)
    }

    /// Raise `anomaly`.
    ///
    /// The recovered ports are kept so the reply is still recorded.
    fn flag(&mut self, anomaly: Anomaly) {
        self.anomalies |= anomaly;
    }

    /// Set the round trip time from the send time recovered from the probe.
    fn set_rtt(&mut self, elapsed: u32, sent: u32) {
        if let Some(rtt) = elapsed.checked_sub(sent) {
            self.rtt = rtt;
        } else {
            tracing::debug!(elapsed, sent, hop = %self.hop, "rtt decode underflow");
            self.rtt = 0;
            self.flag(Anomaly::RTT_UNDERFLOW);
        }
    }

    /// Check the source port recovered from the quote against the quoted destination.
    fn verify_destination(&mut self, quoted_dst: IpAddr) {
        let expected = yarrp_packet::checksum::address_checksum(quoted_dst);
        if self.sport != expected {
            tracing::debug!(
                sport = self.sport,
                expected,
                %quoted_dst,
                hop = %self.hop,
                "quoted destination fails checksum"
            );
            self.flag(Anomaly::BAD_DESTINATION);
        }
    }

    /// Collect any `MPLS` label stack from an rfc4884 extension structure.
    fn parse_extension(&mut self, extension: Option<&[u8]>) {
        let Some(extensions) = extension.and_then(|bytes| ExtensionsPacket::new_view(bytes).ok())
        else {
            return;
        };
        for object in extensions
            .objects()
            .filter(ExtensionObject::is_mpls_label_stack)
        {
            for member in object.mpls_members() {
                if self.mpls.try_push(member).is_err() {
                    return;
                }
            }
        }
    }
}

/// Decode a raw `ICMPv4` packet, including its IP header.
///
/// Returns `None` for packets which are not `ICMP`.
pub fn decode_v4(packet: &[u8], elapsed: u32) -> Result<Option<Reply>> {
    ipv4::decode(packet, elapsed)
}

/// Decode a raw `ICMPv6` packet received from `hop`.
///
/// Returns `None` for packets which do not carry our trailer.
pub fn decode_v6(packet: &[u8], hop: IpAddr, elapsed: u32) -> Result<Option<Reply>> {
    match hop {
        IpAddr::V6(hop) => ipv6::decode(packet, hop, elapsed),
        IpAddr::V4(_) => Err(Error::AddressFamily(hop.to_string())),
    }
}

fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_family_mismatch() {
        let mut encoder = Encoder::new(
            ProbeType::TcpSyn,
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
            Port(80),
            InstanceId(0),
        );
        let target = Target::new(Ipv6Addr::LOCALHOST, 3);
        assert!(matches!(
            encoder.encode(target, 0),
            Err(Error::AddressFamily(_))
        ));
    }

    #[test]
    fn test_reply_validity() {
        let hop = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9));
        let mut reply = Reply::new(hop, 11, 0);
        assert!(!reply.is_valid());
        reply.sport = 7;
        assert!(reply.is_valid());
        reply.set_rtt(10, 20);
        assert_eq!(Anomaly::RTT_UNDERFLOW, reply.anomalies);
        assert_eq!((0, 7, 0), (reply.rtt, reply.sport, reply.dport));
        assert!(!reply.is_valid());
    }
}
