use crate::buffer::Buffer;
use crate::error::Result;
use crate::fmt_payload;
use std::fmt::{Debug, Formatter};

const SOURCE_OFFSET: usize = 0;
const DESTINATION_OFFSET: usize = 2;
const SEQUENCE_OFFSET: usize = 4;
const ACKNOWLEDGEMENT_OFFSET: usize = 8;
const DATA_OFFSET_OFFSET: usize = 12;
const FLAGS_OFFSET: usize = 13;
const WINDOW_SIZE_OFFSET: usize = 14;
const CHECKSUM_OFFSET: usize = 16;
const URGENT_POINTER_OFFSET: usize = 18;

/// TCP control flags.
pub mod flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
}

/// Represents a TCP Packet.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct TcpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> TcpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "TcpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "TcpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub fn get_source(&self) -> u16 {
        self.buf.get_u16(SOURCE_OFFSET)
    }

    #[must_use]
    pub fn get_destination(&self) -> u16 {
        self.buf.get_u16(DESTINATION_OFFSET)
    }

    #[must_use]
    pub fn get_sequence(&self) -> u32 {
        self.buf.get_u32(SEQUENCE_OFFSET)
    }

    #[must_use]
    pub fn get_acknowledgement(&self) -> u32 {
        self.buf.get_u32(ACKNOWLEDGEMENT_OFFSET)
    }

    /// The header length in 32-bit words.
    #[must_use]
    pub fn get_data_offset(&self) -> u8 {
        self.buf.read(DATA_OFFSET_OFFSET) >> 4
    }

    #[must_use]
    pub fn get_flags(&self) -> u8 {
        self.buf.read(FLAGS_OFFSET)
    }

    #[must_use]
    pub fn get_window_size(&self) -> u16 {
        self.buf.get_u16(WINDOW_SIZE_OFFSET)
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.get_u16(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_urgent_pointer(&self) -> u16 {
        self.buf.get_u16(URGENT_POINTER_OFFSET)
    }

    pub fn set_source(&mut self, val: u16) {
        self.buf.set_u16(SOURCE_OFFSET, val);
    }

    pub fn set_destination(&mut self, val: u16) {
        self.buf.set_u16(DESTINATION_OFFSET, val);
    }

    pub fn set_sequence(&mut self, val: u32) {
        self.buf.set_u32(SEQUENCE_OFFSET, val);
    }

    pub fn set_acknowledgement(&mut self, val: u32) {
        self.buf.set_u32(ACKNOWLEDGEMENT_OFFSET, val);
    }

    pub fn set_data_offset(&mut self, val: u8) {
        *self.buf.write(DATA_OFFSET_OFFSET) = (val & 0xf) << 4;
    }

    pub fn set_flags(&mut self, val: u8) {
        *self.buf.write(FLAGS_OFFSET) = val;
    }

    pub fn set_window_size(&mut self, val: u16) {
        self.buf.set_u16(WINDOW_SIZE_OFFSET, val);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_urgent_pointer(&mut self, val: u16) {
        self.buf.set_u16(URGENT_POINTER_OFFSET, val);
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        let offset = self.header_bytes();
        self.buf.copy_from(offset, vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buf.tail(self.header_bytes())
    }

    fn header_bytes(&self) -> usize {
        (usize::from(self.get_data_offset()) * 4).max(Self::minimum_packet_size())
    }
}

impl Debug for TcpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPacket")
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("sequence", &self.get_sequence())
            .field("acknowledgement", &self.get_acknowledgement())
            .field("data_offset", &self.get_data_offset())
            .field("flags", &self.get_flags())
            .field("window_size", &self.get_window_size())
            .field("checksum", &self.get_checksum())
            .field("urgent_pointer", &self.get_urgent_pointer())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}
