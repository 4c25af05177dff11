use crate::buffer::Buffer;
use crate::error::Result;
use std::fmt::{Debug, Formatter};

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;

/// The type of `ICMPv6` packet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IcmpType {
    DestinationUnreachable,
    TimeExceeded,
    EchoRequest,
    EchoReply,
    Other(u8),
}

impl IcmpType {
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::DestinationUnreachable => 1,
            Self::TimeExceeded => 3,
            Self::EchoRequest => 128,
            Self::EchoReply => 129,
            Self::Other(id) => *id,
        }
    }
}

impl From<u8> for IcmpType {
    fn from(val: u8) -> Self {
        match val {
            1 => Self::DestinationUnreachable,
            3 => Self::TimeExceeded,
            128 => Self::EchoRequest,
            129 => Self::EchoReply,
            id => Self::Other(id),
        }
    }
}

/// The code of `ICMPv6` packet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IcmpCode(pub u8);

impl From<u8> for IcmpCode {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

/// The time exceeded code for a hop limit which expired in transit.
pub const HOP_LIMIT_EXCEEDED_IN_TRANSIT: IcmpCode = IcmpCode(0);

/// Represents the fixed leading fields shared by all `ICMPv6` packets.
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

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Everything after the fixed 8 byte header.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.buf.tail(Self::minimum_packet_size())
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

    /// Represents an `ICMPv6` echo request or echo reply packet.
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

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::checksum::icmp_ipv6_checksum;
        use std::net::Ipv6Addr;

        #[test]
        fn test_echo_request_checksum() {
            let src: Ipv6Addr = "fe80::811:3f6:7601:6c3f".parse().unwrap();
            let dst: Ipv6Addr = "fe80::1c8d:7d69:d0b6:8182".parse().unwrap();
            let mut buf = [0_u8; 24];
            let mut icmp = EchoPacket::new(&mut buf).unwrap();
            icmp.set_icmp_type(IcmpType::EchoRequest);
            icmp.set_identifier(0x4000);
            let checksum = icmp_ipv6_checksum(icmp.packet(), src, dst);
            icmp.set_checksum(checksum);
            assert_eq!(0x80, icmp.packet()[0]);
            assert_eq!(checksum.to_be_bytes(), icmp.packet()[2..4]);
            assert_eq!(0x4000, icmp.get_identifier());
            assert_eq!(16, icmp.payload().len());
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

    const LENGTH_OFFSET: usize = 4;

    /// Represents an `ICMPv6` `TimeExceeded` or `DestinationUnreachable` packet.
    ///
    /// The rfc4884 length field counts 64-bit words.
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
            split(usize::from(self.get_length()) * 8, self.payload_raw())
        }
    }

    impl Debug for QuotingPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("QuotingPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
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
    fn test_icmp_type_ids() {
        assert_eq!(IcmpType::EchoReply, IcmpType::from(129));
        assert_eq!(IcmpType::TimeExceeded, IcmpType::from(3));
        assert_eq!(IcmpType::Other(135), IcmpType::from(135));
        assert_eq!(1, IcmpType::DestinationUnreachable.id());
    }

    #[test]
    fn test_body() {
        let buf = [0x81, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01, 0x79, 0x72];
        let icmp = IcmpPacket::new_view(&buf).unwrap();
        assert_eq!(IcmpType::EchoReply, icmp.get_icmp_type());
        assert_eq!(IcmpCode(0), icmp.get_icmp_code());
        assert_eq!(&[0x79, 0x72], icmp.body());
    }
}
