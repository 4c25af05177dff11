use crate::buffer::Buffer;
use crate::error::Result;
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv6Addr;

const VERSION_OFFSET: usize = 0;
const PAYLOAD_LENGTH_OFFSET: usize = 4;
const NEXT_HEADER_OFFSET: usize = 6;
const HOP_LIMIT_OFFSET: usize = 7;
const SOURCE_ADDRESS_OFFSET: usize = 8;
const DESTINATION_ADDRESS_OFFSET: usize = 24;

/// The `IPv6` fragment extension header protocol number.
pub const FRAGMENT_HEADER: u8 = 44;

/// The length of an `IPv6` fragment extension header.
pub const FRAGMENT_HEADER_LENGTH: usize = 8;

/// Represents an IPv6 Packet.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct Ipv6Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv6Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "Ipv6Packet", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "Ipv6Packet", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        40
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_OFFSET) >> 4
    }

    #[must_use]
    pub fn get_payload_length(&self) -> u16 {
        self.buf.get_u16(PAYLOAD_LENGTH_OFFSET)
    }

    /// The raw next header value, which may name an extension header.
    #[must_use]
    pub fn get_next_header(&self) -> u8 {
        self.buf.read(NEXT_HEADER_OFFSET)
    }

    #[must_use]
    pub fn get_hop_limit(&self) -> u8 {
        self.buf.read(HOP_LIMIT_OFFSET)
    }

    #[must_use]
    pub fn get_source_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.buf.get_bytes(SOURCE_ADDRESS_OFFSET))
    }

    #[must_use]
    pub fn get_destination_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.buf.get_bytes(DESTINATION_ADDRESS_OFFSET))
    }

    /// Set the version, clearing the traffic class and flow label.
    pub fn set_version(&mut self, val: u8) {
        self.buf.set_u32(VERSION_OFFSET, u32::from(val & 0xf) << 28);
    }

    pub fn set_payload_length(&mut self, val: u16) {
        self.buf.set_u16(PAYLOAD_LENGTH_OFFSET, val);
    }

    pub fn set_next_header(&mut self, val: IpProtocol) {
        *self.buf.write(NEXT_HEADER_OFFSET) = val.id();
    }

    pub fn set_hop_limit(&mut self, val: u8) {
        *self.buf.write(HOP_LIMIT_OFFSET) = val;
    }

    pub fn set_source_address(&mut self, val: Ipv6Addr) {
        self.buf.set_bytes(SOURCE_ADDRESS_OFFSET, val.octets());
    }

    pub fn set_destination_address(&mut self, val: Ipv6Addr) {
        self.buf.set_bytes(DESTINATION_ADDRESS_OFFSET, val.octets());
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buf.tail(Self::minimum_packet_size())
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_slice_mut()[Self::minimum_packet_size()..]
    }

    /// The upper layer protocol and its bytes, stepping over a fragment header if present.
    #[must_use]
    pub fn upper_layer(&self) -> (IpProtocol, &[u8]) {
        let payload = self.payload();
        match self.get_next_header() {
            FRAGMENT_HEADER if payload.len() >= FRAGMENT_HEADER_LENGTH => (
                IpProtocol::from(payload[0]),
                &payload[FRAGMENT_HEADER_LENGTH..],
            ),
            next => (IpProtocol::from(next), payload),
        }
    }
}

impl Debug for Ipv6Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv6Packet")
            .field("version", &self.get_version())
            .field("payload_length", &self.get_payload_length())
            .field("next_header", &self.get_next_header())
            .field("hop_limit", &self.get_hop_limit())
            .field("source_address", &self.get_source_address())
            .field("destination_address", &self.get_destination_address())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}
