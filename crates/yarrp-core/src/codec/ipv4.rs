use super::{be_u16, be_u32, Reply, MAX_PROBE_SIZE};
use crate::config::{ProbeType, Protocol};
use crate::error::{Error, Result};
use crate::net::platform::Ipv4ByteOrder;
use crate::types::{Anomaly, InstanceId, Port};
use std::net::{IpAddr, Ipv4Addr};
use yarrp_packet::checksum::{
    address_checksum, compute_data, icmp_ipv4_checksum, ipv4_header_checksum, on_wire,
    tcp_ipv4_checksum, udp_ipv4_checksum,
};
use yarrp_packet::icmpv4::echo::EchoPacket;
use yarrp_packet::icmpv4::quoting::QuotingPacket;
use yarrp_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType, TTL_EXPIRED_IN_TRANSIT};
use yarrp_packet::ipv4::{Ipv4Packet, DONT_FRAGMENT};
use yarrp_packet::tcp::{flags, TcpPacket};
use yarrp_packet::udp::UdpPacket;
use yarrp_packet::IpProtocol;

const IPV4_HEADER_SIZE: usize = 20;

/// The transport header bytes guaranteed to be quoted by a router.
const MIN_QUOTED_TRANSPORT: usize = 8;

/// The two payload bytes used to force a transport checksum.
const CHECKSUM_FUDGE_SIZE: usize = 2;

const TCP_WINDOW: u16 = 0xFFFE;

/// The number of distinct `UDP` payload lengths used to carry the high bits of the send time.
const UDP_TIME_WRAP: u32 = 1024;

/// The send time bits recoverable from a `UDP` probe, 2^26 time units.
const UDP_TIME_MASK: u32 = (UDP_TIME_WRAP << 16) - 1;

/// The state carried by a single `IPv4` probe.
#[derive(Debug)]
pub(super) struct Probe {
    pub probe_type: ProbeType,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ttl: u8,
    pub instance: InstanceId,
    pub dest_port: Port,
    pub elapsed: u32,
    pub byte_order: Ipv4ByteOrder,
}

impl Probe {
    /// The identification field carries the TTL and the instance.
    fn identification(&self) -> u16 {
        u16::from(self.ttl) | (u16::from(self.instance.0) << 8)
    }
}

/// Write the probe into `buf`, returning its length.
pub(super) fn encode(buf: &mut [u8], probe: &Probe) -> Result<usize> {
    let protocol = probe.probe_type.protocol();
    let transport_size = match protocol {
        Protocol::Tcp => TcpPacket::minimum_packet_size(),
        Protocol::Udp => UdpPacket::minimum_packet_size() + udp_payload_size(probe.elapsed),
        Protocol::Icmp => EchoPacket::minimum_packet_size() + CHECKSUM_FUDGE_SIZE,
    };
    let total = IPV4_HEADER_SIZE + transport_size;
    if total > MAX_PROBE_SIZE {
        return Err(Error::InvalidPacketSize(total));
    }
    let (header, transport) = buf[..total].split_at_mut(IPV4_HEADER_SIZE);
    transport.fill(0);
    let ip_protocol = match protocol {
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
            IpProtocol::Icmp
        }
    };
    make_ipv4_header(header, ip_protocol, probe, total as u16)?;
    Ok(total)
}

/// The UDP payload grows by one byte for every 2^16 time units so that the send time survives
/// the 16 bit checksum.
///
/// The length wraps every [`UDP_TIME_WRAP`] steps so that a long scan never exceeds the MTU.
fn udp_payload_size(elapsed: u32) -> usize {
    CHECKSUM_FUDGE_SIZE + ((elapsed >> 16) % UDP_TIME_WRAP) as usize
}

fn make_ipv4_header(
    header: &mut [u8],
    protocol: IpProtocol,
    probe: &Probe,
    total_length: u16,
) -> Result<()> {
    let mut ipv4 = Ipv4Packet::new(header)?;
    ipv4.set_version(4);
    ipv4.set_header_length(5);
    ipv4.set_tos(0);
    ipv4.set_total_length(probe.byte_order.adjust_length(total_length));
    ipv4.set_identification(probe.identification());
    ipv4.set_flags_and_fragment_offset(probe.byte_order.adjust_length(DONT_FRAGMENT));
    ipv4.set_ttl(probe.ttl);
    ipv4.set_protocol(protocol);
    ipv4.set_checksum(0);
    ipv4.set_source(probe.src);
    ipv4.set_destination(probe.dst);
    let checksum = ipv4_header_checksum(ipv4.packet());
    ipv4.set_checksum(checksum);
    Ok(())
}

/// A `TCP` SYN (or ACK) carrying the send time in its sequence number.
fn make_tcp_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let mut tcp = TcpPacket::new(buf)?;
    tcp.set_source(address_checksum(IpAddr::V4(probe.dst)));
    tcp.set_destination(probe.dest_port.0);
    tcp.set_sequence(probe.elapsed);
    if probe.probe_type == ProbeType::TcpAck {
        tcp.set_acknowledgement(u32::from(probe.dst));
        tcp.set_flags(flags::ACK);
    } else {
        tcp.set_flags(flags::SYN);
    }
    tcp.set_data_offset(5);
    tcp.set_window_size(TCP_WINDOW);
    tcp.set_checksum(tcp_ipv4_checksum(tcp.packet(), probe.src, probe.dst));
    Ok(())
}

/// A `UDP` datagram whose checksum is forced to the low 16 bits of the send time.
fn make_udp_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let length = buf.len() as u16;
    let mut udp = UdpPacket::new(buf)?;
    udp.set_source(address_checksum(IpAddr::V4(probe.dst)));
    udp.set_destination(probe.dest_port.0);
    udp.set_length(length);
    let start = udp_ipv4_checksum(udp.packet(), probe.src, probe.dst);
    let fudge = compute_data(start, probe.elapsed as u16);
    udp.set_payload(&fudge.to_be_bytes());
    udp.set_checksum(on_wire(probe.elapsed as u16));
    Ok(())
}

/// An `ICMP` echo carrying the send time in its identifier and sequence, with a checksum forced
/// to the checksum of the destination.
fn make_echo_packet(buf: &mut [u8], probe: &Probe) -> Result<()> {
    let mut echo = EchoPacket::new(buf)?;
    if probe.probe_type == ProbeType::IcmpReply {
        echo.set_icmp_type(IcmpType::EchoReply);
    } else {
        echo.set_icmp_type(IcmpType::EchoRequest);
    }
    echo.set_icmp_code(IcmpCode(0));
    echo.set_identifier(probe.elapsed as u16);
    echo.set_sequence((probe.elapsed >> 16) as u16);
    let target = address_checksum(IpAddr::V4(probe.dst));
    let start = icmp_ipv4_checksum(echo.packet());
    echo.set_payload(&compute_data(start, target).to_be_bytes());
    echo.set_checksum(target);
    Ok(())
}

/// Decode an `ICMPv4` packet, including its `IPv4` header.
pub(super) fn decode(packet: &[u8], elapsed: u32) -> Result<Option<Reply>> {
    let ipv4 = Ipv4Packet::new_view(packet)?;
    if ipv4.get_protocol() != IpProtocol::Icmp {
        return Ok(None);
    }
    let icmp = IcmpPacket::new_view(ipv4.payload())?;
    let icmp_type = icmp.get_icmp_type();
    let icmp_code = icmp.get_icmp_code();
    let mut reply = Reply::new(IpAddr::V4(ipv4.get_source()), icmp_type.id(), icmp_code.0);
    reply.reply_size = ipv4.get_total_length();
    reply.ipid = ipv4.get_identification();
    reply.reply_ttl = ipv4.get_ttl();
    reply.reply_tos = ipv4.get_tos();
    let quotes = match icmp_type {
        IcmpType::TimeExceeded => icmp_code == TTL_EXPIRED_IN_TRANSIT,
        IcmpType::DestinationUnreachable => true,
        _ => false,
    };
    if quotes {
        let quoting = QuotingPacket::new_view(ipv4.payload())?;
        decode_quote(&mut reply, quoting.payload(), elapsed)?;
        reply.parse_extension(quoting.extension());
    }
    Ok(Some(reply))
}

/// Recover the probe state from the quoted `IPv4` datagram.
fn decode_quote(reply: &mut Reply, quote: &[u8], elapsed: u32) -> Result<()> {
    let quoted = Ipv4Packet::new_view(quote)?;
    let identification = quoted.get_identification();
    let target = quoted.get_destination();
    reply.target = IpAddr::V4(target);
    reply.probe_size = quoted.get_total_length();
    reply.ttl = (identification & 0xFF) as u8;
    reply.instance = InstanceId((identification >> 8) as u8);
    reply.protocol = quoted.get_protocol().id();
    let transport = quoted.payload();
    if transport.len() < MIN_QUOTED_TRANSPORT {
        reply.flag(Anomaly::TRUNCATED);
        return Ok(());
    }
    let sent = match quoted.get_protocol() {
        IpProtocol::Tcp => {
            reply.sport = be_u16(transport, 0);
            reply.dport = be_u16(transport, 2);
            Some(be_u32(transport, 4))
        }
        IpProtocol::Udp => {
            let udp = UdpPacket::new_view(transport)?;
            reply.sport = udp.get_source();
            reply.dport = udp.get_destination();
            Some(udp_send_time(&udp, elapsed))
        }
        IpProtocol::Icmp => {
            let echo = EchoPacket::new_view(transport)?;
            reply.sport = echo.get_checksum();
            reply.dport = 0;
            Some(u32::from(echo.get_identifier()) + (u32::from(echo.get_sequence()) << 16))
        }
        _ => None,
    };
    let Some(sent) = sent else {
        return Ok(());
    };
    reply.verify_destination(IpAddr::V4(target));
    if reply.anomalies.is_empty() {
        reply.set_rtt(elapsed, sent);
    }
    Ok(())
}

/// The send time carried by a quoted `UDP` probe.
///
/// Only the low 26 bits of the send time survive, so the latest time at or before `elapsed`
/// with those bits is taken.  A computed checksum of zero is transmitted as `0xFFFF`, which
/// would place the probe up to 2^16 time units in the future; in that case the low bits are
/// taken as zero.
fn udp_send_time(udp: &UdpPacket<'_>, elapsed: u32) -> u32 {
    let checksum = u32::from(udp.get_checksum());
    let payload_size = u32::from(udp.get_length()).saturating_sub(8);
    let high = payload_size.saturating_sub(CHECKSUM_FUDGE_SIZE as u32) % UDP_TIME_WRAP;
    let mut carried = (high << 16) | checksum;
    let ahead = carried.wrapping_sub(elapsed) & UDP_TIME_MASK;
    if checksum == 0xFFFF && (1..=0xFFFF).contains(&ahead) {
        carried &= !0xFFFF;
    }
    let behind = elapsed.wrapping_sub(carried) & UDP_TIME_MASK;
    elapsed.wrapping_sub(behind)
}
