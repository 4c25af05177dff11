//! One's-complement checksums for `IPv4`, `IPv6`, `ICMP`, `UDP` and `TCP`, and the payload
//! crafting used to force a transport checksum to a chosen value.
//!
//! All values are expressed as big-endian 16-bit words, the same way they appear on the wire.

use crate::IpProtocol;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The RFC 1071 Internet checksum of `data`.
#[must_use]
pub fn internet_checksum(data: &[u8]) -> u16 {
    finalize(sum_words(data, None))
}

/// The checksum of a destination address.
///
/// Probes carry this value in their source port (or `ICMP` checksum) so that the quoted
/// destination of a reply can be verified without keeping any per-probe state.
#[must_use]
pub fn address_checksum(addr: IpAddr) -> u16 {
    match addr {
        IpAddr::V4(addr) => internet_checksum(&addr.octets()),
        IpAddr::V6(addr) => internet_checksum(&addr.octets()),
    }
}

/// Calculate the checksum for an `IPv4` header, ignoring the checksum field.
#[must_use]
pub fn ipv4_header_checksum(header: &[u8]) -> u16 {
    finalize(sum_words(header, Some(5)))
}

/// Calculate the checksum for an `IPv4` `ICMP` packet, ignoring the checksum field.
#[must_use]
pub fn icmp_ipv4_checksum(data: &[u8]) -> u16 {
    finalize(sum_words(data, Some(1)))
}

/// Calculate the checksum for an `IPv6` `ICMP` packet.
#[must_use]
pub fn icmp_ipv6_checksum(data: &[u8], src: Ipv6Addr, dst: Ipv6Addr) -> u16 {
    let pseudo = pseudo_sum(&src.octets(), &dst.octets(), IpProtocol::IcmpV6, data.len());
    finalize(pseudo + sum_words(data, Some(1)))
}

/// Calculate the checksum for an `IPv4` `UDP` packet.
#[must_use]
pub fn udp_ipv4_checksum(data: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    let pseudo = pseudo_sum(&src.octets(), &dst.octets(), IpProtocol::Udp, data.len());
    finalize(pseudo + sum_words(data, Some(3)))
}

/// Calculate the checksum for an `IPv4` `TCP` packet.
#[must_use]
pub fn tcp_ipv4_checksum(data: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    let pseudo = pseudo_sum(&src.octets(), &dst.octets(), IpProtocol::Tcp, data.len());
    finalize(pseudo + sum_words(data, Some(8)))
}

/// Calculate the checksum for an `IPv6` `UDP` packet.
#[must_use]
pub fn udp_ipv6_checksum(data: &[u8], src: Ipv6Addr, dst: Ipv6Addr) -> u16 {
    let pseudo = pseudo_sum(&src.octets(), &dst.octets(), IpProtocol::Udp, data.len());
    finalize(pseudo + sum_words(data, Some(3)))
}

/// Calculate the checksum for an `IPv6` `TCP` packet.
#[must_use]
pub fn tcp_ipv6_checksum(data: &[u8], src: Ipv6Addr, dst: Ipv6Addr) -> u16 {
    let pseudo = pseudo_sum(&src.octets(), &dst.octets(), IpProtocol::Tcp, data.len());
    finalize(pseudo + sum_words(data, Some(8)))
}

/// The 16-bit data word which, placed in a zeroed word-aligned slot of a packet whose checksum
/// is `start`, makes the checksum of that packet equal to `target`.
///
/// A `target` of `0xFFFF` is treated as `0x0000` (RFC 768 transmits a computed zero checksum as
/// `0xFFFF`), see [`on_wire`].
#[must_use]
pub const fn compute_data(start: u16, target: u16) -> u16 {
    let target = if target == 0xFFFF { 0x0000 } else { target };
    if !target > !start {
        !target - !start
    } else {
        0xFFFF - !start + !target
    }
}

/// The value transmitted for a computed checksum, substituting `0xFFFF` for `0x0000`.
#[must_use]
pub const fn on_wire(checksum: u16) -> u16 {
    if checksum == 0 {
        0xFFFF
    } else {
        checksum
    }
}

fn pseudo_sum(src: &[u8], dst: &[u8], protocol: IpProtocol, len: usize) -> u32 {
    sum_words(src, None) + sum_words(dst, None) + u32::from(protocol.id()) + len as u32
}

fn sum_words(data: &[u8], skip_word: Option<usize>) -> u32 {
    let mut words = data.chunks_exact(2);
    let mut sum = words
        .by_ref()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip_word)
        .map(|(_, w)| u32::from(u16::from_be_bytes([w[0], w[1]])))
        .sum::<u32>();
    if let [last] = words.remainder() {
        if skip_word != Some(data.len() / 2) {
            sum += u32::from(*last) << 8;
        }
    }
    sum
}

const fn finalize(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_case::test_case;

    #[test]
    fn test_empty() {
        assert_eq!(0xFFFF, internet_checksum(&[]));
        assert_eq!(0xFFFF, ipv4_header_checksum(&[]));
    }

    #[test]
    fn test_odd_length() {
        assert_eq!(0xFEFF, internet_checksum(&[0x01]));
    }

    #[test]
    fn test_ipv4_header_checksum() {
        let bytes = hex!("45 00 0f fc 38 c0 00 00 40 01 2e 3b 0a 00 00 02 0a 00 00 01");
        assert_eq!(0x1e3f, ipv4_header_checksum(&bytes));
    }

    #[test]
    fn test_tcp_ipv4_checksum() {
        let bytes = hex!("00 50 80 ea 00 00 00 00 95 9d 2e c7 50 12 ff ff 55 cc 00 00");
        let src = Ipv4Addr::new(10, 0, 0, 103);
        let dst = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(0x55cc, tcp_ipv4_checksum(&bytes, src, dst));
    }

    #[test_case(Ipv4Addr::new(0, 0, 0, 0), 0xFFFF)]
    #[test_case(Ipv4Addr::new(10, 0, 0, 1), 0xF5FE)]
    #[test_case(Ipv4Addr::new(192, 168, 1, 1), 0x3E56)]
    fn test_address_checksum(addr: Ipv4Addr, expected: u16) {
        assert_eq!(expected, address_checksum(IpAddr::V4(addr)));
    }

    #[test]
    fn test_address_checksum_ipv6() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        // 0x2001 + 0x0db8 + 0x0001 = 0x2dba
        assert_eq!(!0x2dba_u16, address_checksum(IpAddr::V6(addr)));
    }

    #[test_case(0x0000, 0x1234)]
    #[test_case(0xFFFF, 0x1234)]
    #[test_case(0x1234, 0x1234)]
    #[test_case(0xabcd, 0x0001)]
    #[test_case(0x0001, 0xabcd)]
    #[test_case(0x8000, 0x7fff)]
    fn test_compute_data_hits_target(start_seed: u16, target: u16) {
        let mut packet = [0_u8; 12];
        packet[..2].copy_from_slice(&start_seed.to_be_bytes());
        packet[2..4].copy_from_slice(&hex!("5a 17"));
        let start = internet_checksum(&packet);
        let data = compute_data(start, target);
        packet[10..12].copy_from_slice(&data.to_be_bytes());
        assert_eq!(target, internet_checksum(&packet));
    }

    #[test_case(0xFFFF)]
    #[test_case(0x0000)]
    fn test_compute_data_zero_substitution(target: u16) {
        let mut packet = hex!("08 00 00 00 12 34 56 78 00 00");
        let start = icmp_ipv4_checksum(&packet);
        let data = compute_data(start, target);
        packet[8..10].copy_from_slice(&data.to_be_bytes());
        assert_eq!(0x0000, icmp_ipv4_checksum(&packet));
        assert_eq!(0xFFFF, on_wire(icmp_ipv4_checksum(&packet)));
    }

    #[test]
    fn test_skipped_checksum_word_is_ignored() {
        let zeroed = hex!("00 50 80 ea 00 08 00 00 01 02");
        let filled = hex!("00 50 80 ea 00 08 ab cd 01 02");
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        assert_eq!(
            udp_ipv4_checksum(&zeroed, src, dst),
            udp_ipv4_checksum(&filled, src, dst)
        );
    }
}
