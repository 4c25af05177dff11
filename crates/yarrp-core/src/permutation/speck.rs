//! The Speck lightweight block ciphers in the two small block sizes used for scanning.
//!
//! Words are loaded little-endian from the key bytes, with the first key word being `k0` and the
//! remaining words forming the `l` schedule.  A block value carries the low (`y`) word in its low
//! bits and the high (`x`) word above it.

const SPECK32_ROUNDS: usize = 22;
const SPECK48_ROUNDS: usize = 23;
const MASK24: u32 = 0x00ff_ffff;

/// Speck with a 32 bit block and a 64 bit key.
#[derive(Debug, Clone)]
pub struct Speck32 {
    round_keys: [u16; SPECK32_ROUNDS],
}

impl Speck32 {
    pub const KEY_LENGTH: usize = 8;

    #[must_use]
    pub fn new(key: &[u8; Self::KEY_LENGTH]) -> Self {
        let word = |i: usize| u16::from_le_bytes([key[2 * i], key[2 * i + 1]]);
        let mut l = [word(1), word(2), word(3)];
        let mut k = word(0);
        let mut round_keys = [0; SPECK32_ROUNDS];
        round_keys[0] = k;
        for i in 0..SPECK32_ROUNDS - 1 {
            let (x, y) = round16(l[i % 3], k, i as u16);
            l[i % 3] = x;
            k = y;
            round_keys[i + 1] = k;
        }
        Self { round_keys }
    }

    #[must_use]
    pub fn encrypt(&self, block: u32) -> u32 {
        let (x, y) = self
            .round_keys
            .iter()
            .fold(((block >> 16) as u16, block as u16), |(x, y), &k| {
                round16(x, y, k)
            });
        (u32::from(x) << 16) | u32::from(y)
    }
}

/// Speck with a 48 bit block and a 96 bit key.
#[derive(Debug, Clone)]
pub struct Speck48 {
    round_keys: [u32; SPECK48_ROUNDS],
}

impl Speck48 {
    pub const KEY_LENGTH: usize = 12;

    #[must_use]
    pub fn new(key: &[u8; Self::KEY_LENGTH]) -> Self {
        let word = |i: usize| u32::from_le_bytes([key[3 * i], key[3 * i + 1], key[3 * i + 2], 0]);
        let mut l = [word(1), word(2), word(3)];
        let mut k = word(0);
        let mut round_keys = [0; SPECK48_ROUNDS];
        round_keys[0] = k;
        for i in 0..SPECK48_ROUNDS - 1 {
            let (x, y) = round24(l[i % 3], k, i as u32);
            l[i % 3] = x;
            k = y;
            round_keys[i + 1] = k;
        }
        Self { round_keys }
    }

    /// Encrypt the low 48 bits of `block`.
    #[must_use]
    pub fn encrypt(&self, block: u64) -> u64 {
        let x = (block >> 24) as u32 & MASK24;
        let y = block as u32 & MASK24;
        let (x, y) = self
            .round_keys
            .iter()
            .fold((x, y), |(x, y), &k| round24(x, y, k));
        (u64::from(x) << 24) | u64::from(y)
    }
}

const fn round16(x: u16, y: u16, k: u16) -> (u16, u16) {
    let x = x.rotate_right(7).wrapping_add(y) ^ k;
    let y = y.rotate_left(2) ^ x;
    (x, y)
}

const fn round24(x: u32, y: u32, k: u32) -> (u32, u32) {
    let x = (ror24(x, 8).wrapping_add(y) & MASK24) ^ k;
    let y = rol24(y, 3) ^ x;
    (x, y)
}

const fn ror24(v: u32, r: u32) -> u32 {
    ((v >> r) | (v << (24 - r))) & MASK24
}

const fn rol24(v: u32, r: u32) -> u32 {
    ((v << r) | (v >> (24 - r))) & MASK24
}
