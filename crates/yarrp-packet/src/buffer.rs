use crate::error::{Error, Result};

/// A byte buffer that holds a mutable or immutable byte slice.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl<'a> Buffer<'a> {
    /// Wrap a mutable slice, checking it can hold at least `min` bytes.
    pub fn mutable(packet: &'a mut [u8], name: &str, min: usize) -> Result<Self> {
        if packet.len() >= min {
            Ok(Self::Mutable(packet))
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from(name),
                min,
                packet.len(),
            ))
        }
    }

    /// Wrap an immutable slice, checking it can hold at least `min` bytes.
    pub fn immutable(packet: &'a [u8], name: &str, min: usize) -> Result<Self> {
        if packet.len() >= min {
            Ok(Self::Immutable(packet))
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from(name),
                min,
                packet.len(),
            ))
        }
    }

    /// access the buffer as an immutable slice of bytes.
    pub fn as_slice(&self) -> &[u8] {
        match &self {
            Buffer::Immutable(packet) => packet,
            Buffer::Mutable(packet) => packet,
        }
    }

    /// access the buffer as a mutable slice of bytes.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write operation called on readonly buffer"),
            Buffer::Mutable(packet) => packet,
        }
    }

    /// The bytes from `offset` to the end of the buffer, empty if `offset` is out of range.
    pub fn tail(&self, offset: usize) -> &[u8] {
        self.as_slice().get(offset..).unwrap_or_default()
    }

    /// Get N bytes from the packet at a given byte offset.
    pub fn get_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        core::array::from_fn(|i| self.read(offset + i))
    }

    /// Set N bytes in the packet at a given offset.
    pub fn set_bytes<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&bytes);
    }

    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes(self.get_bytes(offset))
    }

    pub fn set_u16(&mut self, offset: usize, val: u16) {
        self.set_bytes(offset, val.to_be_bytes());
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes(self.get_bytes(offset))
    }

    pub fn set_u32(&mut self, offset: usize, val: u32) {
        self.set_bytes(offset, val.to_be_bytes());
    }

    /// Get the value at a given offset.
    pub fn read(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    /// Set the value at a given offset.
    pub fn write(&mut self, offset: usize) -> &mut u8 {
        &mut self.as_slice_mut()[offset]
    }

    /// Copy `vals` into the buffer starting at `offset`.
    pub fn copy_from(&mut self, offset: usize, vals: &[u8]) {
        self.as_slice_mut()[offset..offset + vals.len()].copy_from_slice(vals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_buffer() {
        let buf = [0_u8; 3];
        let err = Buffer::immutable(&buf, "Probe", 4).unwrap_err();
        assert_eq!(
            Error::InsufficientPacketBuffer(String::from("Probe"), 4, 3),
            err
        );
    }

    #[test]
    fn test_words_are_big_endian() {
        let mut buf = [0_u8; 6];
        let mut buffer = Buffer::mutable(&mut buf, "Probe", 6).unwrap();
        buffer.set_u16(0, 0xbeef);
        buffer.set_u32(2, 0x7972_7036);
        assert_eq!(&[0xbe, 0xef, 0x79, 0x72, 0x70, 0x36], buffer.as_slice());
        assert_eq!(0xbeef, buffer.get_u16(0));
        assert_eq!(0x7972_7036, buffer.get_u32(2));
    }

    #[test]
    fn test_tail() {
        let buf = [1_u8, 2, 3];
        let buffer = Buffer::Immutable(&buf);
        assert_eq!(&[2, 3], buffer.tail(1));
        assert!(buffer.tail(3).is_empty());
        assert!(buffer.tail(10).is_empty());
    }

    #[test]
    fn test_copy_from() {
        let mut buf = [0_u8; 5];
        let mut buffer = Buffer::Mutable(&mut buf);
        buffer.copy_from(3, &[9, 9]);
        *buffer.write(0) = 2;
        assert_eq!(&[2, 0, 0, 9, 9], buffer.as_slice());
    }

    #[test]
    #[should_panic(expected = "write operation called on readonly buffer")]
    fn test_immutable_buffer_cannot_write() {
        let buf = [0_u8; 5];
        let mut buffer = Buffer::Immutable(&buf);
        buffer.set_u16(0, 1);
    }
}
