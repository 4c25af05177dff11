use crate::buffer::Buffer;
use crate::error::Result;
use crate::fmt_payload;
use std::fmt::{Debug, Formatter};

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;

/// The type of `ICMPv4` packet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    EchoRequest,
    TimeExceeded,
    Other(u8),
}

impl IcmpType {
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::EchoReply => 0,
            Self::DestinationUnreachable => 3,
            Self::EchoRequest => 8,
            Self::TimeExceeded => 11,
            Self::Other(id) => *id,
        }
    }
}

impl From<u8> for IcmpType {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::EchoReply,
            3 => Self::DestinationUnreachable,
            8 => Self::EchoRequest,
            11 => Self::TimeExceeded,
            id => Self::Other(id),
        }
    }
}

/// The code of `ICMPv4` packet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IcmpCode(pub u8);

impl From<u8> for IcmpCode {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

/// The time exceeded code for a TTL which expired in transit.
pub const TTL_EXPIRED_IN_TRANSIT: IcmpCode = IcmpCode(0);

/// Represents the fixed leading fields shared by all `ICMPv4` packets.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct IcmpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> IcmpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        let buf = Buffer::mutable(packet, "IcmpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "IcmpPacket", Self::minimum_packet_size())?;
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_icmp_type(&self) -> IcmpType {
        IcmpType::from(self.buf.read(TYPE_OFFSET))
    }

    #[must_use]
    pub fn get_icmp_code(&self) -> IcmpCode {
        IcmpCode::from(self.buf.read(CODE_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.get_u16(CHECKSUM_OFFSET)
    }

    pub fn set_icmp_type(&mut self, val: IcmpType) {
        *self.buf.write(TYPE_OFFSET) = val.id();
    }

    pub fn set_icmp_code(&mut self, val: IcmpCode) {
        *self.buf.write(CODE_OFFSET) = val.0;
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }
}

impl Debug for IcmpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpPacket")
            .field("icmp_type", &self.get_icmp_type())
            .field("icmp_code", &self.get_icmp_code())
            .field("checksum", &self.get_checksum())
            .finish()
    }
}

pub mod echo {
    use super::{IcmpCode, IcmpType, CHECKSUM_OFFSET, CODE_OFFSET, TYPE_OFFSET};
    use crate::buffer::Buffer;
    use crate::error::Result;
    use crate::fmt_payload;
    use std::fmt::{Debug, Formatter};

    const IDENTIFIER_OFFSET: usize = 4;
    const SEQUENCE_OFFSET: usize = 6;

    /// Represents an `ICMPv4` echo request or echo reply packet, which share a layout.
    pub struct EchoPacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> EchoPacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            let buf = Buffer::mutable(packet, "EchoPacket", Self::minimum_packet_size())?;
            Ok(Self { buf })
        }

        pub fn new_view(packet: &'a [u8]) -> Result<Self> {
            let buf = Buffer::immutable(packet, "EchoPacket", Self::minimum_packet_size())?;
            Ok(Self { buf })
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.read(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.get_u16(CHECKSUM_OFFSET)
        }

        #[must_use]
        pub fn get_identifier(&self) -> u16 {
            self.buf.get_u16(IDENTIFIER_OFFSET)
        }

        #[must_use]
        pub fn get_sequence(&self) -> u16 {
            self.buf.get_u16(SEQUENCE_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            *self.buf.write(TYPE_OFFSET) = val.id();
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            *self.buf.write(CODE_OFFSET) = val.0;
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_identifier(&mut self, val: u16) {
            self.buf.set_u16(IDENTIFIER_OFFSET, val);
        }

        pub fn set_sequence(&mut self, val: u16) {
            self.buf.set_u16(SEQUENCE_OFFSET, val);
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

    impl Debug for EchoPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("EchoPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("checksum", &self.get_checksum())
                .field("identifier", &self.get_identifier())
                .field("sequence", &self.get_sequence())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

}

pub mod quoting {
    use super::{IcmpCode, IcmpType, CHECKSUM_OFFSET, CODE_OFFSET, TYPE_OFFSET};
    use crate::buffer::Buffer;
    use crate::error::Result;
    use crate::fmt_payload;
    use crate::icmp_extension::split;
    use std::fmt::{Debug, Formatter};

    const LENGTH_OFFSET: usize = 5;

    /// Represents an `ICMPv4` `TimeExceeded` or `DestinationUnreachable` packet.
    ///
    /// Both carry a quote of the datagram which triggered them, optionally followed by an
    /// rfc4884 extension structure.  The rfc4884 length field counts 32-bit words.
    pub struct QuotingPacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> QuotingPacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            let buf = Buffer::mutable(packet, "QuotingPacket", Self::minimum_packet_size())?;
            Ok(Self { buf })
        }

        pub fn new_view(packet: &'a [u8]) -> Result<Self> {
            let buf = Buffer::immutable(packet, "QuotingPacket", Self::minimum_packet_size())?;
            Ok(Self { buf })
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.read(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_icmp_code(&self) -> IcmpCode {
            IcmpCode::from(self.buf.read(CODE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.get_u16(CHECKSUM_OFFSET)
        }

        #[must_use]
        pub fn get_length(&self) -> u8 {
            self.buf.read(LENGTH_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            *self.buf.write(TYPE_OFFSET) = val.id();
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            *self.buf.write(CODE_OFFSET) = val.0;
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_length(&mut self, val: u8) {
            *self.buf.write(LENGTH_OFFSET) = val;
        }

        pub fn set_payload(&mut self, vals: &[u8]) {
            self.buf.copy_from(Self::minimum_packet_size(), vals);
        }

        #[must_use]
        pub fn packet(&self) -> &[u8] {
            self.buf.as_slice()
        }

        /// The quoted datagram, without any extension.
        #[must_use]
        pub fn payload(&self) -> &[u8] {
            self.split_payload_extension().0
        }

        #[must_use]
        pub fn payload_raw(&self) -> &[u8] {
            self.buf.tail(Self::minimum_packet_size())
        }

        #[must_use]
        pub fn extension(&self) -> Option<&[u8]> {
            self.split_payload_extension().1
        }

        fn split_payload_extension(&self) -> (&[u8], Option<&[u8]>) {
            split(usize::from(self.get_length()) * 4, self.payload_raw())
        }
    }

    impl Debug for QuotingPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("QuotingPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
                .field("checksum", &self.get_checksum())
                .field("length", &self.get_length())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmp_type_round_trip_ids() {
        assert_eq!(IcmpType::TimeExceeded, IcmpType::from(11));
        assert_eq!(IcmpType::DestinationUnreachable, IcmpType::from(3));
        assert_eq!(IcmpType::Other(5), IcmpType::from(5));
        assert_eq!(8, IcmpType::EchoRequest.id());
    }

    #[test]
    fn test_header() {
        let buf = [0x0b, 0x00, 0xf4, 0xff, 0x00, 0x00, 0x00, 0x00];
        let icmp = IcmpPacket::new_view(&buf).unwrap();
        assert_eq!(IcmpType::TimeExceeded, icmp.get_icmp_type());
        assert_eq!(TTL_EXPIRED_IN_TRANSIT, icmp.get_icmp_code());
        assert_eq!(0xf4ff, icmp.get_checksum());
    }

    #[test]
    fn test_debug() {
        let buf = [0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let icmp = IcmpPacket::new_view(&buf).unwrap();
        assert_eq!(
            "IcmpPacket { icmp_type: DestinationUnreachable, icmp_code: IcmpCode(3), checksum: 0 }",
            format!("{icmp:?}")
        );
        assert_eq!("03 03", fmt_payload(&icmp.packet()[..2]));
    }
}
