use crate::buffer::Buffer;
use crate::error::{Error, Result};
use std::fmt::{Debug, Formatter};
use std::net::Ipv6Addr;

/// The magic which starts every probe trailer, ASCII `yrp6`.
pub const TRAILER_MAGIC: u32 = 0x7972_7036;

const MAGIC_OFFSET: usize = 0;
const TARGET_OFFSET: usize = 4;
const INSTANCE_OFFSET: usize = 20;
const TTL_OFFSET: usize = 21;
const FUDGE_OFFSET: usize = 22;
const ELAPSED_OFFSET: usize = 24;

/// Represents the state trailer appended after the transport header of an `IPv6` probe.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         magic ("yrp6")                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                     target (16 bytes)                         +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   instance    |      ttl      |             fudge             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            elapsed                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `fudge` is solved for so that the transport checksum takes a fixed value.
pub struct TrailerPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> TrailerPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "TrailerPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "TrailerPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    /// Create a view, rejecting a trailer which does not carry the magic.
    pub fn new_checked(packet: &'a [u8]) -> Result<Self> {
        let trailer = Self::new_view(packet)?;
        match trailer.get_magic() {
            TRAILER_MAGIC => Ok(trailer),
            magic => Err(Error::BadTrailerMagic(magic)),
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        28
    }

    #[must_use]
    pub fn get_magic(&self) -> u32 {
        self.buf.get_u32(MAGIC_OFFSET)
    }

    #[must_use]
    pub fn get_target(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.buf.get_bytes(TARGET_OFFSET))
    }

    #[must_use]
    pub fn get_instance(&self) -> u8 {
        self.buf.read(INSTANCE_OFFSET)
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.read(TTL_OFFSET)
    }

    #[must_use]
    pub fn get_fudge(&self) -> u16 {
        self.buf.get_u16(FUDGE_OFFSET)
    }

    #[must_use]
    pub fn get_elapsed(&self) -> u32 {
        self.buf.get_u32(ELAPSED_OFFSET)
    }

    pub fn set_magic(&mut self, val: u32) {
        self.buf.set_u32(MAGIC_OFFSET, val);
    }

    pub fn set_target(&mut self, val: Ipv6Addr) {
        self.buf.set_bytes(TARGET_OFFSET, val.octets());
    }

    pub fn set_instance(&mut self, val: u8) {
        *self.buf.write(INSTANCE_OFFSET) = val;
    }

    pub fn set_ttl(&mut self, val: u8) {
        *self.buf.write(TTL_OFFSET) = val;
    }

    pub fn set_fudge(&mut self, val: u16) {
        self.buf.set_u16(FUDGE_OFFSET, val);
    }

    pub fn set_elapsed(&mut self, val: u32) {
        self.buf.set_u32(ELAPSED_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The offset of the fudge word from the start of the trailer.
    #[must_use]
    pub const fn fudge_offset() -> usize {
        FUDGE_OFFSET
    }
}

impl Debug for TrailerPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrailerPacket")
            .field("magic", &format_args!("{:#010x}", self.get_magic()))
            .field("target", &self.get_target())
            .field("instance", &self.get_instance())
            .field("ttl", &self.get_ttl())
            .field("fudge", &self.get_fudge())
            .field("elapsed", &self.get_elapsed())
            .finish()
    }
}
