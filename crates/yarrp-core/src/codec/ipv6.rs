use super::{be_u16, Ethernet, Reply};
use crate::config::{ProbeType, Protocol};
use crate::error::Result;
use crate::types::{InstanceId, Port};
use std::net::{IpAddr, Ipv6Addr};
use yarrp_packet::checksum::{
    address_checksum, compute_data, icmp_ipv6_checksum, tcp_ipv6_checksum, udp_ipv6_checksum,
};
use yarrp_packet::ethernet::{EthernetPacket, ETHER_TYPE_IPV6};
use yarrp_packet::icmpv6::echo::EchoPacket;
use yarrp_packet::icmpv6::quoting::QuotingPacket;
use yarrp_packet::icmpv6::{IcmpCode, IcmpPacket, IcmpType, HOP_LIMIT_EXCEEDED_IN_TRANSIT};
use yarrp_packet::ipv6::Ipv6Packet;
use yarrp_packet::tcp::{flags, TcpPacket};
use yarrp_packet::trailer::{TrailerPacket, TRAILER_MAGIC};
use yarrp_packet::udp::UdpPacket;
use yarrp_packet::IpProtocol;

const IPV6_HEADER_SIZE: usize = 40;

/// `UDP` and `TCP` probes have their checksum forced to this value by the trailer fudge.
const FORCED_CHECKSUM: u16 = 0xbeef;

const TCP_WINDOW: u16 = 0xFFFF;

/// The state carried by a single `IPv6` probe.
#[derive(Debug)]
pub(super) struct Probe {
    pub probe_type: ProbeType,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub ttl: u8,
    pub instance: InstanceId,
    pub dest_port: Port,
    pub elapsed: u32,
    pub sequence: u16,
    pub ethernet: Option<Ethernet>,
}

/// The size of the transport header which precedes the trailer.
const fn transport_header_size(protocol: Protocol) -> usize {
    match protocol {
        Protocol::Tcp => TcpPacket::minimum_packet_size(),
        Protocol::Udp => UdpPacket::minimum_packet_size(),
        Protocol::Icmp => EchoPacket::minimum_packet_size(),
    }
}

/// Write the probe into `buf`, returning its length.
pub(super) fn encode(buf: &mut [u8], probe: &Probe) -> Result<usize> {
    let link_size = probe
        .ethernet
        .map_or(0, |_| EthernetPacket::minimum_packet_size());
    let protocol = probe.probe_type.protocol();
    let header_size = transport_header_size(protocol);
    let transport_size = header_size + TrailerPacket::minimum_packet_size();
    let total = link_size + IPV6_HEADER_SIZE + transport_size;
    let frame = &mut buf[..total];
    frame.fill(0);
    let (link, packet) = frame.split_at_mut(link_size);
    if let Some(ethernet) = probe.ethernet {
        let mut header = EthernetPacket::new(link)?;
        header.set_destination(ethernet.destination);
        header.set_source(ethernet.source);
        header.set_ether_type(ETHER_TYPE_IPV6);
    }
    let (header, transport) = packet.split_at_mut(IPV6_HEADER_SIZE);
    make_trailer(&mut transport[header_size..], probe)?;
    let next_header = match protocol {
        Protocol::Tcp => {
            make_tcp_packet(transport, probe)?;
            IpProtocol::Tcp
        }
        Protocol::Udp => {
            make_udp_packet(transport, probe)?;
            IpProtocol::Udp
        }
        Protocol::Icmp => {
            make_echo_packet(transport, probe)?;
            IpProtocol::IcmpV6
        }
    };
    let mut ipv6 = Ipv6Packet::new(header)?;
    ipv6.set_version(6);
    ipv6.set_payload_length(transport_size as u16);
    ipv6.set_next_header(next_header);
    ipv6.set_hop_limit(probe.ttl);
    ipv6.set_source_address(probe.src);
    ipv6.set_destination_address(probe.dst);
    Ok(total)
}

fn make_trailer(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let mut trailer = TrailerPacket::new(buf)?;
    trailer.set_magic(TRAILER_MAGIC);
    trailer.set_target(probe.dst);
    trailer.set_instance(probe.instance.0);
    trailer.set_ttl(probe.ttl);
    trailer.set_elapsed(probe.elapsed);
    Ok(())
}

/// Solve the trailer fudge so the transport checksum becomes [`FORCED_CHECKSUM`].
fn set_fudge(trailer: &mut [u8], start: u16) -> Result<()> {
    TrailerPacket::new(trailer)?.set_fudge(compute_data(start, FORCED_CHECKSUM));
    Ok(())
}

fn make_udp_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let length = buf.len() as u16;
    let start = {
        let mut udp = UdpPacket::new(&mut *buf)?;
        udp.set_source(address_checksum(IpAddr::V6(probe.dst)));
        udp.set_destination(probe.dest_port.0);
        udp.set_length(length);
        udp_ipv6_checksum(udp.packet(), probe.src, probe.dst)
    };
    set_fudge(&mut buf[UdpPacket::minimum_packet_size()..], start)?;
    UdpPacket::new(buf)?.set_checksum(FORCED_CHECKSUM);
    Ok(())
}

fn make_tcp_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let start = {
        let mut tcp = TcpPacket::new(&mut *buf)?;
        tcp.set_source(address_checksum(IpAddr::V6(probe.dst)));
        tcp.set_destination(probe.dest_port.0);
        tcp.set_sequence(1);
        if probe.probe_type == ProbeType::Tcp6Ack {
            tcp.set_flags(flags::ACK);
        } else {
            tcp.set_flags(flags::SYN);
        }
        tcp.set_data_offset(5);
        tcp.set_window_size(TCP_WINDOW);
        tcp_ipv6_checksum(tcp.packet(), probe.src, probe.dst)
    };
    set_fudge(&mut buf[TcpPacket::minimum_packet_size()..], start)?;
    TcpPacket::new(buf)?.set_checksum(FORCED_CHECKSUM);
    Ok(())
}

fn make_echo_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let mut echo = EchoPacket::new(buf)?;
    echo.set_icmp_type(IcmpType::EchoRequest);
    echo.set_icmp_code(IcmpCode(0));
    echo.set_identifier(address_checksum(IpAddr::V6(probe.dst)));
    echo.set_sequence(probe.sequence);
    echo.set_checksum(icmp_ipv6_checksum(echo.packet(), probe.src, probe.dst));
    Ok(())
}

/// Decode an `ICMPv6` message received from `hop`.
///
/// Only messages carrying one of our trailers are decoded; the rest yield `None`.
pub(super) fn decode(packet: &[u8], hop: Ipv6Addr, elapsed: u32) -> Result<Option<Reply>> {
    let icmp = IcmpPacket::new_view(packet)?;
    let icmp_type = icmp.get_icmp_type();
    let icmp_code = icmp.get_icmp_code();
    let mut reply = Reply::new(IpAddr::V6(hop), icmp_type.id(), icmp_code.0);
    reply.reply_size = packet.len() as u16;
    if icmp_type == IcmpType::EchoReply {
        let echo = EchoPacket::new_view(packet)?;
        let Ok(trailer) = TrailerPacket::new_checked(echo.payload()) else {
            return Ok(None);
        };
        reply.protocol = IpProtocol::IcmpV6.id();
        reply.probe_size = packet.len() as u16;
        reply.target = IpAddr::V6(trailer.get_target());
        reply.sport = echo.get_identifier();
        reply.dport = echo.get_sequence();
        apply_trailer(&mut reply, &trailer, elapsed);
        return Ok(Some(reply));
    }
    let quoting = QuotingPacket::new_view(packet)?;
    let Ok(quoted) = Ipv6Packet::new_view(quoting.payload()) else {
        return Ok(None);
    };
    let (protocol, upper) = quoted.upper_layer();
    let header_size = match protocol {
        IpProtocol::Tcp => transport_header_size(Protocol::Tcp),
        IpProtocol::Udp => transport_header_size(Protocol::Udp),
        IpProtocol::IcmpV6 => transport_header_size(Protocol::Icmp),
        _ => return Ok(None),
    };
    let Some(Ok(trailer)) = upper.get(header_size..).map(TrailerPacket::new_checked) else {
        return Ok(None);
    };
    reply.protocol = protocol.id();
    let quotes = match icmp_type {
        IcmpType::TimeExceeded => icmp_code == HOP_LIMIT_EXCEEDED_IN_TRANSIT,
        IcmpType::DestinationUnreachable => true,
        _ => false,
    };
    if quotes {
        let quoted_dst = quoted.get_destination_address();
        reply.target = IpAddr::V6(quoted_dst);
        reply.probe_size = quoted.get_payload_length();
        reply.sport = be_u16(upper, 0);
        reply.dport = be_u16(upper, 2);
        if protocol == IpProtocol::IcmpV6 {
            reply.sport = be_u16(upper, 4);
            reply.dport = be_u16(upper, 6);
        }
        reply.verify_destination(IpAddr::V6(quoted_dst));
    }
    apply_trailer(&mut reply, &trailer, elapsed);
    reply.parse_extension(quoting.extension());
    Ok(Some(reply))
}

fn apply_trailer(reply: &mut Reply, trailer: &TrailerPacket<'_>, elapsed: u32) {
    reply.ttl = trailer.get_ttl();
    reply.instance = InstanceId(trailer.get_instance());
    if reply.anomalies.is_empty() {
        reply.set_rtt(elapsed, trailer.get_elapsed());
    }
}
