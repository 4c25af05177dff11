use crate::simulation::{Protocol, Simulation, Tamper};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use yarrp_core::net::{ProbeSender, ReplyReceiver};
use yarrp_packet::checksum::{icmp_ipv4_checksum, ipv4_header_checksum};
use yarrp_packet::icmpv4::echo::EchoPacket;
use yarrp_packet::icmpv4::quoting::QuotingPacket;
use yarrp_packet::icmpv4::{IcmpCode, IcmpType};
use yarrp_packet::ipv4::Ipv4Packet;
use yarrp_packet::IpProtocol;

/// The longest a simulated read blocks, whatever the timeout requested.
const READ_POLL: Duration = Duration::from_millis(20);

/// The port unreachable code of a destination unreachable message.
const PORT_UNREACHABLE: u8 = 3;

/// The number of bytes of the probe a router quotes.
const QUOTE_SIZE: usize = 28;

/// Create the two halves of a simulated network.
///
/// Every probe is answered at once, so the replies are queued before the probe call returns.
pub fn network(sim: Arc<Simulation>) -> (SimSender, SimReceiver) {
    let (tx, rx) = mpsc::channel();
    (SimSender { sim, tx }, SimReceiver { rx })
}

pub struct SimSender {
    sim: Arc<Simulation>,
    tx: Sender<(Vec<u8>, IpAddr)>,
}

impl ProbeSender for SimSender {
    fn send_probe(&mut self, packet: &[u8], target: IpAddr) -> yarrp_core::Result<()> {
        let probe = Ipv4Packet::new_view(packet)?;
        let IpAddr::V4(source) = self.sim.source else {
            unimplemented!("ipv6 simulation")
        };
        assert_eq!(IpAddr::V4(probe.get_destination()), target);
        let ttl = probe.get_ttl();
        let reply = if ttl >= self.sim.target_ttl() {
            let IpAddr::V4(addr) = target else {
                unreachable!()
            };
            match self.sim.protocol {
                Protocol::Icmp => {
                    info!("sending EchoReply from {} for ttl {}", addr, ttl);
                    Some((addr, make_echo_reply(&probe)?))
                }
                _ => {
                    info!("sending DestinationUnreachable from {} for ttl {}", addr, ttl);
                    let quote = quote(packet, None);
                    Some((
                        addr,
                        make_quoting(IcmpType::DestinationUnreachable, PORT_UNREACHABLE, &quote)?,
                    ))
                }
            }
        } else {
            match self.sim.hop(ttl) {
                Some(hop) => match hop.addr {
                    Some(IpAddr::V4(addr)) => {
                        info!("sending TimeExceeded from {} for ttl {}", addr, ttl);
                        let quote = quote(packet, hop.tamper);
                        Some((addr, make_quoting(IcmpType::TimeExceeded, 0, &quote)?))
                    }
                    Some(IpAddr::V6(_)) => unimplemented!("ipv6 hop"),
                    None => None,
                },
                None => None,
            }
        };
        if let Some((addr, icmp)) = reply {
            let ipv4 = make_ipv4(addr, source, &icmp)?;
            // the receiver may already have gone
            let _ = self.tx.send((ipv4, IpAddr::V4(addr)));
        } else {
            debug!("no response for ttl {}", ttl);
        }
        Ok(())
    }
}

pub struct SimReceiver {
    rx: Receiver<(Vec<u8>, IpAddr)>,
}

impl ReplyReceiver for SimReceiver {
    fn recv_packet(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> yarrp_core::Result<Option<(usize, IpAddr)>> {
        match self.rx.recv_timeout(timeout.min(READ_POLL)) {
            Ok((packet, addr)) => {
                buf[..packet.len()].copy_from_slice(&packet);
                Ok(Some((packet.len(), addr)))
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// The leading bytes of the probe as a router would quote them.
fn quote(probe: &[u8], tamper: Option<Tamper>) -> Vec<u8> {
    let mut quote = probe[..QUOTE_SIZE.min(probe.len())].to_vec();
    match tamper {
        Some(Tamper::Foreign) => quote[4] = quote[4].wrapping_add(1),
        Some(Tamper::BadDestination) => quote[19] = quote[19].wrapping_add(1),
        None => {}
    }
    quote
}

fn make_quoting(icmp_type: IcmpType, code: u8, quote: &[u8]) -> yarrp_core::Result<Vec<u8>> {
    let mut buf = vec![0_u8; QuotingPacket::minimum_packet_size() + quote.len()];
    let mut packet = QuotingPacket::new(&mut buf)?;
    packet.set_icmp_type(icmp_type);
    packet.set_icmp_code(IcmpCode(code));
    packet.set_payload(quote);
    let checksum = icmp_ipv4_checksum(packet.packet());
    packet.set_checksum(checksum);
    Ok(buf)
}

fn make_echo_reply(probe: &Ipv4Packet<'_>) -> yarrp_core::Result<Vec<u8>> {
    let request = EchoPacket::new_view(probe.payload())?;
    let mut buf = vec![0_u8; EchoPacket::minimum_packet_size()];
    let mut packet = EchoPacket::new(&mut buf)?;
    packet.set_icmp_type(IcmpType::EchoReply);
    packet.set_identifier(request.get_identifier());
    packet.set_sequence(request.get_sequence());
    let checksum = icmp_ipv4_checksum(packet.packet());
    packet.set_checksum(checksum);
    Ok(buf)
}

fn make_ipv4(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    payload: &[u8],
) -> yarrp_core::Result<Vec<u8>> {
    let length = Ipv4Packet::minimum_packet_size() + payload.len();
    let mut buf = vec![0_u8; length];
    let mut ipv4 = Ipv4Packet::new(&mut buf)?;
    ipv4.set_version(4);
    ipv4.set_header_length(5);
    ipv4.set_total_length(length as u16);
    ipv4.set_ttl(64);
    ipv4.set_protocol(IpProtocol::Icmp);
    ipv4.set_source(source);
    ipv4.set_destination(destination);
    ipv4.set_payload(payload);
    let checksum = ipv4_header_checksum(ipv4.header());
    ipv4.set_checksum(checksum);
    Ok(buf)
}
