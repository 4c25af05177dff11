//! `ICMP` multi-part message extensions (rfc4884) and the `MPLS` label stack object (rfc4950).

use crate::buffer::Buffer;
use crate::error::Result;
use std::fmt::{Debug, Formatter};

/// The only extension structure version defined by rfc4884.
pub const ICMP_EXTENSION_VERSION: u8 = 2;

const VERSION_OFFSET: usize = 0;
const CHECKSUM_OFFSET: usize = 2;
const HEADER_LENGTH: usize = 4;

/// From rfc4884 (section 3) entitled "Summary of Changes to ICMP":
///
/// "When the ICMP Extension Structure is appended to an ICMP message
/// and that ICMP message contains an "original datagram" field, the
/// "original datagram" field MUST contain at least 128 octets."
const ICMP_ORIG_DATAGRAM_MIN_LENGTH: usize = 128;

/// Separate an `ICMP` payload from any rfc4884 extension structure.
///
/// `length` is the rfc4884 length of the original datagram in bytes.  Routers which pad the
/// quote to 128 octets but leave the length field zero are also handled.
#[must_use]
pub fn split(length: usize, icmp_payload: &[u8]) -> (&[u8], Option<&[u8]>) {
    if length > icmp_payload.len() || icmp_payload.len() <= ICMP_ORIG_DATAGRAM_MIN_LENGTH {
        return (icmp_payload, None);
    }
    let boundary = length.max(ICMP_ORIG_DATAGRAM_MIN_LENGTH);
    let (quote, extension) = icmp_payload.split_at(boundary);
    if extension.len() < HEADER_LENGTH {
        return (icmp_payload, None);
    }
    let quote = if length > 0 { &quote[..length] } else { quote };
    (quote, Some(extension))
}

/// The class of an extension object.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClassNum {
    MultiProtocolLabelSwitchingLabelStack,
    InterfaceInformationObject,
    Other(u8),
}

impl ClassNum {
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::MultiProtocolLabelSwitchingLabelStack => 1,
            Self::InterfaceInformationObject => 2,
            Self::Other(id) => *id,
        }
    }
}

impl From<u8> for ClassNum {
    fn from(val: u8) -> Self {
        match val {
            1 => Self::MultiProtocolLabelSwitchingLabelStack,
            2 => Self::InterfaceInformationObject,
            id => Self::Other(id),
        }
    }
}

/// Represents an rfc4884 extension structure: a 4 byte header followed by objects.
pub struct ExtensionsPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> ExtensionsPacket<'a> {
    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        let buf = Buffer::immutable(packet, "ExtensionsPacket", HEADER_LENGTH)?;
        Ok(Self { buf })
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_OFFSET) >> 4
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.get_u16(CHECKSUM_OFFSET)
    }

    /// Iterate the well formed objects of this structure.
    #[must_use]
    pub fn objects(&self) -> ExtensionObjectIter<'_> {
        ExtensionObjectIter {
            bytes: self.buf.tail(HEADER_LENGTH),
        }
    }
}

impl Debug for ExtensionsPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionsPacket")
            .field("version", &self.get_version())
            .field("checksum", &self.get_checksum())
            .finish()
    }
}

/// An iterator over extension objects.
///
/// Iteration stops at the first object whose length is shorter than an object header or runs
/// past the end of the available bytes.
pub struct ExtensionObjectIter<'a> {
    bytes: &'a [u8],
}

impl<'a> Iterator for ExtensionObjectIter<'a> {
    type Item = ExtensionObject<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.len() < ExtensionObject::HEADER_LENGTH {
            return None;
        }
        let length = usize::from(u16::from_be_bytes([self.bytes[0], self.bytes[1]]));
        if length < ExtensionObject::HEADER_LENGTH || length > self.bytes.len() {
            self.bytes = &[];
            return None;
        }
        let (object, rest) = self.bytes.split_at(length);
        self.bytes = rest;
        Some(ExtensionObject {
            class_num: ClassNum::from(object[2]),
            class_subtype: object[3],
            payload: &object[ExtensionObject::HEADER_LENGTH..],
        })
    }
}

/// A single extension object.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ExtensionObject<'a> {
    pub class_num: ClassNum,
    pub class_subtype: u8,
    pub payload: &'a [u8],
}

impl ExtensionObject<'_> {
    const HEADER_LENGTH: usize = 4;

    /// Is this an incoming `MPLS` label stack object (class 1, c-type 1)?
    #[must_use]
    pub fn is_mpls_label_stack(&self) -> bool {
        self.class_num == ClassNum::MultiProtocolLabelSwitchingLabelStack && self.class_subtype == 1
    }

    /// The label stack entries of an `MPLS` object, ending at the bottom of stack entry.
    #[must_use]
    pub fn mpls_members(&self) -> MplsLabelStackIter<'_> {
        MplsLabelStackIter {
            bytes: self.payload,
            done: false,
        }
    }
}

/// An `MPLS` label stack entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MplsLabelStackMember {
    pub label: u32,
    pub exp: u8,
    pub bos: u8,
    pub ttl: u8,
}

impl MplsLabelStackMember {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        let word = u32::from_be_bytes(bytes);
        Self {
            label: word >> 12,
            exp: ((word >> 9) & 0x7) as u8,
            bos: ((word >> 8) & 0x1) as u8,
            ttl: (word & 0xff) as u8,
        }
    }
}

/// An iterator over the entries of an `MPLS` label stack.
pub struct MplsLabelStackIter<'a> {
    bytes: &'a [u8],
    done: bool,
}

impl Iterator for MplsLabelStackIter<'_> {
    type Item = MplsLabelStackMember;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.bytes {
            [a, b, c, d, rest @ ..] => {
                let member = MplsLabelStackMember::from_bytes([*a, *b, *c, *d]);
                self.bytes = rest;
                self.done = member.bos == 1;
                Some(member)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_split_empty_payload() {
        let (payload, extension) = split(0, &[]);
        assert!(payload.is_empty() && extension.is_none());
    }

    #[test]
    fn test_split_length_larger_than_payload() {
        let icmp_payload = [0_u8; 140];
        let (payload, extension) = split(144, &icmp_payload);
        assert_eq!(140, payload.len());
        assert!(extension.is_none());
    }

    #[test]
    fn test_split_non_compliant_padded_quote() {
        let icmp_payload = [0_u8; 140];
        let (payload, extension) = split(0, &icmp_payload);
        assert_eq!(128, payload.len());
        assert_eq!(Some(&[0_u8; 12][..]), extension);
    }

    #[test]
    fn test_split_compliant_short_quote() {
        let icmp_payload = [0_u8; 140];
        let (payload, extension) = split(64, &icmp_payload);
        assert_eq!(64, payload.len());
        assert_eq!(12, extension.unwrap().len());
    }

    #[test]
    fn test_split_compliant_long_quote() {
        let icmp_payload = [0_u8; 160];
        let (payload, extension) = split(152, &icmp_payload);
        assert_eq!(152, payload.len());
        assert_eq!(8, extension.unwrap().len());
    }

    #[test]
    fn test_split_extension_too_short() {
        let icmp_payload = [0_u8; 130];
        let (payload, extension) = split(128, &icmp_payload);
        assert_eq!(130, payload.len());
        assert!(extension.is_none());
    }

    #[test]
    fn test_mpls_two_members() {
        let buf = hex!("20 00 96 53 00 0c 01 01 06 9f 18 01 00 00 29 ff");
        let extensions = ExtensionsPacket::new_view(&buf).unwrap();
        assert_eq!(ICMP_EXTENSION_VERSION, extensions.get_version());
        assert_eq!(0x9653, extensions.get_checksum());
        let objects = extensions.objects().collect::<Vec<_>>();
        assert_eq!(1, objects.len());
        assert!(objects[0].is_mpls_label_stack());
        let members = objects[0].mpls_members().collect::<Vec<_>>();
        assert_eq!(
            vec![
                MplsLabelStackMember {
                    label: 27121,
                    exp: 4,
                    bos: 0,
                    ttl: 1
                },
                MplsLabelStackMember {
                    label: 2,
                    exp: 4,
                    bos: 1,
                    ttl: 255
                }
            ],
            members
        );
    }

    #[test]
    fn test_mpls_stops_at_bottom_of_stack() {
        let buf = hex!("20 00 99 3a 00 0c 01 01 04 bb 41 01 00 00 29 ff");
        let extensions = ExtensionsPacket::new_view(&buf).unwrap();
        let object = extensions.objects().next().unwrap();
        let members = object.mpls_members().collect::<Vec<_>>();
        assert_eq!(1, members.len());
        assert_eq!(19380, members[0].label);
        assert_eq!(1, members[0].ttl);
    }

    #[test]
    fn test_object_iterator_rejects_bad_lengths() {
        let zero = hex!("20 00 99 3a 00 00 01 01 04 bb 41 01");
        let too_long = hex!("20 00 99 3a a7 dd 01 01 04 bb 41 01");
        for buf in [zero, too_long] {
            let extensions = ExtensionsPacket::new_view(&buf).unwrap();
            assert!(extensions.objects().next().is_none());
        }
    }

    #[test]
    fn test_non_mpls_object() {
        let buf = hex!("20 00 00 00 00 08 02 01 00 00 00 01");
        let extensions = ExtensionsPacket::new_view(&buf).unwrap();
        let object = extensions.objects().next().unwrap();
        assert_eq!(ClassNum::InterfaceInformationObject, object.class_num);
        assert!(!object.is_mpls_label_stack());
    }
}
