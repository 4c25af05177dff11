use crate::permutation::speck::Speck32;

const ROUNDS: u32 = 16;

/// A balanced Feistel network sized to the range being permuted.
///
/// The block is the smallest even number of bits (at least 2) able to hold every value of the
/// range, so a cycle walk discards at most three out of every four ciphertexts.  Each half is at
/// most 16 bits and the round function is Speck32 keyed once, applied to the round number and the
/// right half.
#[derive(Debug, Clone)]
pub struct Feistel {
    half_bits: u32,
    half_mask: u64,
    round_fn: Speck32,
}

impl Feistel {
    pub const KEY_LENGTH: usize = Speck32::KEY_LENGTH;

    /// The largest range a Feistel network can cover.
    pub const MAX_RANGE: u64 = 1 << 32;

    #[must_use]
    pub fn new(key: &[u8; Self::KEY_LENGTH], range: u64) -> Self {
        let half_bits = block_bits(range) / 2;
        Self {
            half_bits,
            half_mask: (1 << half_bits) - 1,
            round_fn: Speck32::new(key),
        }
    }

    /// The number of distinct blocks.
    #[must_use]
    pub const fn block_space(&self) -> u64 {
        1 << (2 * self.half_bits)
    }

    #[must_use]
    pub fn encrypt(&self, block: u64) -> u64 {
        let mut left = (block >> self.half_bits) & self.half_mask;
        let mut right = block & self.half_mask;
        for round in 0..ROUNDS {
            let mixed = left ^ self.round(round, right);
            left = right;
            right = mixed;
        }
        (left << self.half_bits) | right
    }

    fn round(&self, round: u32, half: u64) -> u64 {
        u64::from(self.round_fn.encrypt((round << 16) | half as u32)) & self.half_mask
    }
}

/// The smallest even bit width, at least 2, whose block space covers `range`.
#[must_use]
pub fn block_bits(range: u64) -> u32 {
    let mut bits = 2;
    while bits < 64 && (1_u64 << bits) < range {
        bits += 2;
    }
    bits
}
