use crate::buffer::Buffer;
use crate::error::Result;
use std::fmt::{Debug, Formatter};

const DESTINATION_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 6;
const ETHER_TYPE_OFFSET: usize = 12;

/// The `EtherType` of an `IPv6` payload.
pub const ETHER_TYPE_IPV6: u16 = 0x86dd;

/// A link layer (MAC) address.
#[derive(Clone, Copy, Eq, PartialEq, Default, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl Debug for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools as _;
        write!(f, "{:02x}", self.0.iter().format(":"))
    }
}

impl std::str::FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut octets = [0_u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| format!("invalid MAC address: {s}"))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| format!("invalid MAC address: {s}"))?;
        }
        if parts.next().is_some() {
            return Err(format!("invalid MAC address: {s}"));
        }
        Ok(Self(octets))
    }
}

/// Represents an Ethernet II frame header.
pub struct EthernetPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> EthernetPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "EthernetPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "EthernetPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        14
    }

    #[must_use]
    pub fn get_destination(&self) -> MacAddr {
        MacAddr(self.buf.get_bytes(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn get_source(&self) -> MacAddr {
        MacAddr(self.buf.get_bytes(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_ether_type(&self) -> u16 {
        self.buf.get_u16(ETHER_TYPE_OFFSET)
    }

    pub fn set_destination(&mut self, val: MacAddr) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.0);
    }

    pub fn set_source(&mut self, val: MacAddr) {
        self.buf.set_bytes(SOURCE_OFFSET, val.0);
    }

    pub fn set_ether_type(&mut self, val: u16) {
        self.buf.set_u16(ETHER_TYPE_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buf.tail(Self::minimum_packet_size())
    }
}

impl Debug for EthernetPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetPacket")
            .field("destination", &self.get_destination())
            .field("source", &self.get_source())
            .field("ether_type", &self.get_ether_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_header() {
        let mut buf = [0_u8; EthernetPacket::minimum_packet_size()];
        let mut frame = EthernetPacket::new(&mut buf).unwrap();
        frame.set_destination("00:11:22:33:44:55".parse().unwrap());
        frame.set_source(MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        frame.set_ether_type(ETHER_TYPE_IPV6);
        assert_eq!(
            hex!("00 11 22 33 44 55 aa bb cc dd ee ff 86 dd"),
            frame.packet()
        );
        assert_eq!("aa:bb:cc:dd:ee:ff", frame.get_source().to_string());
    }

    #[test]
    fn test_bad_mac() {
        assert!("00:11:22".parse::<MacAddr>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddr>().is_err());
        assert!("zz:11:22:33:44:55".parse::<MacAddr>().is_err());
    }
}
