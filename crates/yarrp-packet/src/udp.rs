use crate::buffer::Buffer;
use crate::error::Result;
use crate::fmt_payload;
use std::fmt::{Debug, Formatter};

const SOURCE_PORT_OFFSET: usize = 0;
const DESTINATION_PORT_OFFSET: usize = 2;
const LENGTH_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 6;

/// Represents a UDP Packet.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct UdpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> UdpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "UdpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "UdpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_source(&self) -> u16 {
        self.buf.get_u16(SOURCE_PORT_OFFSET)
    }

    #[must_use]
    pub fn get_destination(&self) -> u16 {
        self.buf.get_u16(DESTINATION_PORT_OFFSET)
    }

    #[must_use]
    pub fn get_length(&self) -> u16 {
        self.buf.get_u16(LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.get_u16(CHECKSUM_OFFSET)
    }

    pub fn set_source(&mut self, val: u16) {
        self.buf.set_u16(SOURCE_PORT_OFFSET, val);
    }

    pub fn set_destination(&mut self, val: u16) {
        self.buf.set_u16(DESTINATION_PORT_OFFSET, val);
    }

    pub fn set_length(&mut self, val: u16) {
        self.buf.set_u16(LENGTH_OFFSET, val);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        self.buf.copy_from(Self::minimum_packet_size(), vals);
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

impl Debug for UdpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpPacket")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("length", &self.get_length())
            .field("checksum", &self.get_checksum())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_ports() {
        let mut buf = [0_u8; UdpPacket::minimum_packet_size()];
        let mut packet = UdpPacket::new(&mut buf).unwrap();
        packet.set_source(0xf5fe);
        packet.set_destination(53);
        assert_eq!(0xf5fe, packet.get_source());
        assert_eq!(53, packet.get_destination());
        assert_eq!([0xf5, 0xfe, 0x00, 0x35], packet.packet()[..4]);
    }

    #[test]
    fn test_length_and_checksum() {
        let mut buf = [0_u8; UdpPacket::minimum_packet_size()];
        let mut packet = UdpPacket::new(&mut buf).unwrap();
        packet.set_length(13);
        packet.set_checksum(0xFFFF);
        assert_eq!([0x00, 0x0d, 0xff, 0xff], packet.packet()[4..]);
    }

    #[test]
    fn test_view() {
        let buf = hex!("68 bf 81 b6 00 0a ac be 12 34");
        let packet = UdpPacket::new_view(&buf).unwrap();
        assert_eq!(26815, packet.get_source());
        assert_eq!(33206, packet.get_destination());
        assert_eq!(10, packet.get_length());
        assert_eq!(44222, packet.get_checksum());
        assert_eq!(&[0x12, 0x34], packet.payload());
    }
}
