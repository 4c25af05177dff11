use crate::error::{PermError, PermResult};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::instrument;

/// The Feistel network cipher.
mod feistel;

/// The RC5-16 cipher.
mod rc5;

/// The Speck32 and Speck48 ciphers.
mod speck;

pub use feistel::Feistel;
pub use rc5::Rc5;
pub use speck::{Speck32, Speck48};

/// The largest range a prefix table may be built for.
const MAX_PREFIX_TABLE_RANGE: u64 = 1 << 32;

/// The largest range any cipher can permute.
const MAX_RANGE: u64 = 1 << 48;

/// The block cipher requested for a permutation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Cipher {
    /// Pick the cheapest cipher able to cover the range.
    #[default]
    Auto,
    /// A Feistel network sized to the range.
    Feistel,
    /// Speck32 or Speck48, depending on the range.
    Speck,
    /// RC5-16/12.
    Rc5,
}

/// The concrete cipher a permutation runs.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CipherKind {
    Feistel,
    Speck32,
    Speck48,
    Rc5,
}

impl CipherKind {
    /// Select the cipher for a `range`.
    pub fn select(cipher: Cipher, range: u64) -> PermResult<Self> {
        if range == 0 || range > MAX_RANGE {
            return Err(PermError::Range);
        }
        match cipher {
            Cipher::Auto if range <= 1 << 30 => Ok(Self::Feistel),
            Cipher::Auto | Cipher::Speck if range <= 1 << 32 => Ok(Self::Speck32),
            Cipher::Auto | Cipher::Speck => Ok(Self::Speck48),
            Cipher::Feistel if range <= Feistel::MAX_RANGE => Ok(Self::Feistel),
            Cipher::Rc5 if range <= 1 << 32 => Ok(Self::Rc5),
            Cipher::Feistel | Cipher::Rc5 => Err(PermError::CipherNotSupported),
        }
    }

    /// The key length, in bytes, this cipher expects.
    #[must_use]
    pub const fn key_length(self) -> usize {
        match self {
            Self::Feistel => Feistel::KEY_LENGTH,
            Self::Speck32 => Speck32::KEY_LENGTH,
            Self::Speck48 => Speck48::KEY_LENGTH,
            Self::Rc5 => Rc5::KEY_LENGTH,
        }
    }
}

/// How a permutation walks its range.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Use a prefix table for ranges below the threshold and cycle walking otherwise.
    Auto { prefix_table_below: u64 },
    /// Encrypt successive counters, discarding ciphertexts outside the range.
    Cycle,
    /// Precompute and sort the whole permutation.
    PrefixTable,
}

enum BlockCipher {
    Feistel(Feistel),
    Speck32(Speck32),
    Speck48(Speck48),
    Rc5(Rc5),
}

impl BlockCipher {
    fn new(kind: CipherKind, key: &[u8], range: u64) -> PermResult<Self> {
        let bad_key = || PermError::BadKeyLength {
            expected: kind.key_length(),
            actual: key.len(),
        };
        Ok(match kind {
            CipherKind::Feistel => Self::Feistel(Feistel::new(
                key.try_into().map_err(|_| bad_key())?,
                range,
            )),
            CipherKind::Speck32 => {
                Self::Speck32(Speck32::new(key.try_into().map_err(|_| bad_key())?))
            }
            CipherKind::Speck48 => {
                Self::Speck48(Speck48::new(key.try_into().map_err(|_| bad_key())?))
            }
            CipherKind::Rc5 if key.len() == Rc5::KEY_LENGTH => Self::Rc5(Rc5::new(key)),
            CipherKind::Rc5 => return Err(bad_key()),
        })
    }

    fn encrypt(&self, block: u64) -> u64 {
        match self {
            Self::Feistel(cipher) => cipher.encrypt(block),
            Self::Speck32(cipher) => u64::from(cipher.encrypt(block as u32)),
            Self::Speck48(cipher) => cipher.encrypt(block),
            Self::Rc5(cipher) => u64::from(cipher.encrypt(block as u32)),
        }
    }
}

enum Walk {
    Cycle { counter: u64 },
    PrefixTable { table: Vec<u64> },
}

/// A keyed pseudorandom permutation of `[0, range)`.
///
/// Each pass produces every value of the range exactly once, in an order determined solely by the
/// key, cipher and mode.
///
/// # Examples
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use yarrp_core::permutation::{Cipher, Mode, Permutation};
///
/// let mut perm = Permutation::from_seed(10, Mode::Cycle, Cipher::Auto, 42)?;
/// let mut values = perm.by_ref().collect::<Vec<_>>();
/// values.sort_unstable();
/// assert_eq!((0..10).collect::<Vec<_>>(), values);
/// assert_eq!(None, perm.next());
/// # Ok(())
/// # }
/// ```
pub struct Permutation {
    range: u64,
    kind: CipherKind,
    cipher: BlockCipher,
    walk: Walk,
    position: u64,
}

impl Permutation {
    /// Create a permutation of `[0, range)` keyed with `key`.
    #[instrument(skip(key), level = "debug")]
    pub fn new(range: u64, mode: Mode, cipher: Cipher, key: &[u8]) -> PermResult<Self> {
        let kind = CipherKind::select(cipher, range)?;
        let cipher = BlockCipher::new(kind, key, range)?;
        let prefix_table = match mode {
            Mode::Auto { prefix_table_below } => range < prefix_table_below,
            Mode::Cycle => false,
            Mode::PrefixTable if range <= MAX_PREFIX_TABLE_RANGE => true,
            Mode::PrefixTable => return Err(PermError::ModeNotSupported),
        };
        let walk = if prefix_table {
            Walk::PrefixTable {
                table: build_table(&cipher, range)?,
            }
        } else {
            Walk::Cycle { counter: 0 }
        };
        tracing::debug!(?kind, prefix_table, "permutation created");
        Ok(Self {
            range,
            kind,
            cipher,
            walk,
            position: 0,
        })
    }

    /// Create a permutation keyed from a 64 bit seed.
    pub fn from_seed(range: u64, mode: Mode, cipher: Cipher, seed: u64) -> PermResult<Self> {
        let kind = CipherKind::select(cipher, range)?;
        Self::new(range, mode, cipher, &derive_key(seed, kind.key_length()))
    }

    /// The next value of this pass, or [`PermError::End`] once every value has been produced.
    pub fn next_value(&mut self) -> PermResult<u64> {
        if self.position >= self.range {
            return Err(PermError::End);
        }
        let value = match &mut self.walk {
            Walk::PrefixTable { table } => table[self.position as usize],
            Walk::Cycle { counter } => loop {
                let value = self.cipher.encrypt(*counter);
                *counter += 1;
                if value < self.range {
                    break value;
                }
            },
        };
        self.position += 1;
        Ok(value)
    }

    /// The `index`-th value of a pass.
    ///
    /// Only a prefix table permutation supports random access.
    pub fn encode(&self, index: u64) -> PermResult<u64> {
        match &self.walk {
            Walk::PrefixTable { table } => table
                .get(usize::try_from(index).map_err(|_| PermError::Range)?)
                .copied()
                .ok_or(PermError::Range),
            Walk::Cycle { .. } => Err(PermError::OperationNotSupported),
        }
    }

    /// Restart the pass with the same key.
    pub fn reset(&mut self) {
        self.position = 0;
        if let Walk::Cycle { counter } = &mut self.walk {
            *counter = 0;
        }
    }

    #[must_use]
    pub const fn range(&self) -> u64 {
        self.range
    }

    /// The number of values produced so far in this pass.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    pub const fn cipher(&self) -> CipherKind {
        self.kind
    }

    #[must_use]
    pub const fn is_prefix_table(&self) -> bool {
        matches!(self.walk, Walk::PrefixTable { .. })
    }
}

impl Iterator for Permutation {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_value().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.range - self.position).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl std::fmt::Debug for Permutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permutation")
            .field("range", &self.range)
            .field("cipher", &self.kind)
            .field("prefix_table", &self.is_prefix_table())
            .field("position", &self.position)
            .finish()
    }
}

/// Derive `len` bytes of key material from a seed.
///
/// This is not a cryptographic derivation: the key only needs to make the scan order
/// unpredictable.
#[must_use]
pub fn derive_key(seed: u64, len: usize) -> Vec<u8> {
    let mut key = vec![0; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut key);
    key
}

fn build_table(cipher: &BlockCipher, range: u64) -> PermResult<Vec<u64>> {
    let oom = |_| PermError::OutOfMemory { range };
    let len = usize::try_from(range).map_err(|_| PermError::OutOfMemory { range })?;
    let mut pairs = Vec::new();
    pairs.try_reserve_exact(len).map_err(oom)?;
    pairs.extend((0..range).map(|index| (cipher.encrypt(index), index)));
    pairs.sort_unstable();
    let mut table = Vec::new();
    table.try_reserve_exact(len).map_err(oom)?;
    table.extend(pairs.into_iter().map(|(_, index)| index));
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use test_case::test_case;

    fn drain_sorted(perm: &mut Permutation) -> Vec<u64> {
        let mut values = perm.by_ref().collect::<Vec<_>>();
        values.sort_unstable();
        values
    }

    #[test_case(Cipher::Auto, 10, Ok(CipherKind::Feistel))]
    #[test_case(Cipher::Auto, 1 << 30, Ok(CipherKind::Feistel))]
    #[test_case(Cipher::Auto, (1 << 30) + 1, Ok(CipherKind::Speck32))]
    #[test_case(Cipher::Auto, 1 << 32, Ok(CipherKind::Speck32))]
    #[test_case(Cipher::Auto, (1 << 32) + 1, Ok(CipherKind::Speck48))]
    #[test_case(Cipher::Auto, (1 << 48) - 1, Ok(CipherKind::Speck48))]
    #[test_case(Cipher::Auto, (1 << 48) + 1, Err(PermError::Range))]
    #[test_case(Cipher::Auto, 0, Err(PermError::Range))]
    #[test_case(Cipher::Speck, 100, Ok(CipherKind::Speck32))]
    #[test_case(Cipher::Speck, 1 << 40, Ok(CipherKind::Speck48))]
    #[test_case(Cipher::Rc5, 1 << 32, Ok(CipherKind::Rc5))]
    #[test_case(Cipher::Rc5, 1 << 33, Err(PermError::CipherNotSupported))]
    #[test_case(Cipher::Feistel, 1 << 33, Err(PermError::CipherNotSupported))]
    fn test_cipher_selection(cipher: Cipher, range: u64, expected: PermResult<CipherKind>) {
        assert_eq!(expected, CipherKind::select(cipher, range));
    }

    #[test]
    fn test_cycle_walk_small_range() {
        let mut perm = Permutation::new(10, Mode::Cycle, Cipher::Auto, b"yarrpkey").unwrap();
        assert_eq!(CipherKind::Feistel, perm.cipher());
        assert_eq!((0..10).collect::<Vec<_>>(), drain_sorted(&mut perm));
        assert_eq!(10, perm.position());
        assert_eq!(Err(PermError::End), perm.next_value());
        assert_eq!(Err(PermError::End), perm.next_value());
    }

    #[test_case(Cipher::Feistel)]
    #[test_case(Cipher::Speck)]
    #[test_case(Cipher::Rc5)]
    fn test_prefix_table_bijection(cipher: Cipher) {
        let mut perm = Permutation::from_seed(1000, Mode::PrefixTable, cipher, 7).unwrap();
        assert!(perm.is_prefix_table());
        assert_eq!((0..1000).collect::<Vec<_>>(), drain_sorted(&mut perm));
    }

    #[test]
    fn test_random_ranges_are_bijections() {
        let mut rng = StdRng::seed_from_u64(0x7961_7272);
        for _ in 0..50 {
            let range = rng.gen_range(1..3000);
            let seed = rng.gen();
            let mut perm = Permutation::from_seed(range, Mode::Cycle, Cipher::Auto, seed).unwrap();
            assert_eq!((0..range).collect::<Vec<_>>(), drain_sorted(&mut perm));
        }
    }

    #[test]
    fn test_encode_matches_pass() {
        let mut perm = Permutation::from_seed(64, Mode::PrefixTable, Cipher::Auto, 3).unwrap();
        let encoded = (0..64).map(|i| perm.encode(i).unwrap()).collect::<Vec<_>>();
        assert_eq!(encoded, perm.by_ref().collect::<Vec<_>>());
        assert_eq!(Err(PermError::Range), perm.encode(64));
    }

    #[test]
    fn test_encode_unsupported_in_cycle_mode() {
        let perm = Permutation::from_seed(64, Mode::Cycle, Cipher::Auto, 3).unwrap();
        assert_eq!(Err(PermError::OperationNotSupported), perm.encode(0));
    }

    #[test]
    fn test_auto_mode_threshold() {
        let below = Mode::Auto {
            prefix_table_below: 101,
        };
        let at = Mode::Auto {
            prefix_table_below: 100,
        };
        assert!(Permutation::from_seed(100, below, Cipher::Auto, 1)
            .unwrap()
            .is_prefix_table());
        assert!(!Permutation::from_seed(100, at, Cipher::Auto, 1)
            .unwrap()
            .is_prefix_table());
    }

    #[test]
    fn test_modes_agree_on_set() {
        let mut table = Permutation::from_seed(500, Mode::PrefixTable, Cipher::Auto, 9).unwrap();
        let mut cycle = Permutation::from_seed(500, Mode::Cycle, Cipher::Auto, 9).unwrap();
        assert_eq!(drain_sorted(&mut table), drain_sorted(&mut cycle));
    }

    #[test]
    fn test_reset_repeats_order() {
        let mut perm = Permutation::from_seed(300, Mode::Cycle, Cipher::Auto, 11).unwrap();
        let first = perm.by_ref().collect::<Vec<_>>();
        perm.reset();
        assert_eq!(0, perm.position());
        assert_eq!(first, perm.collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_determines_order() {
        let order = |seed| {
            Permutation::from_seed(1000, Mode::Cycle, Cipher::Auto, seed)
                .unwrap()
                .collect::<Vec<_>>()
        };
        assert_eq!(order(1), order(1));
        assert_ne!(order(1), order(2));
    }

    #[test]
    fn test_bad_key_length() {
        let err = Permutation::new(1000, Mode::Cycle, Cipher::Rc5, &[0; 8]).unwrap_err();
        assert_eq!(
            PermError::BadKeyLength {
                expected: 16,
                actual: 8
            },
            err
        );
        let err = Permutation::new(1 << 40, Mode::Cycle, Cipher::Auto, &[0; 8]).unwrap_err();
        assert_eq!(
            PermError::BadKeyLength {
                expected: 12,
                actual: 8
            },
            err
        );
    }

    #[test]
    fn test_prefix_table_too_large() {
        assert_eq!(
            PermError::ModeNotSupported,
            Permutation::from_seed(1 << 40, Mode::PrefixTable, Cipher::Auto, 0).unwrap_err()
        );
    }

    #[test]
    fn test_large_range_cycle() {
        let mut perm = Permutation::from_seed((1 << 48) - 1, Mode::Cycle, Cipher::Auto, 5).unwrap();
        assert_eq!(CipherKind::Speck48, perm.cipher());
        let first = perm.by_ref().take(1000).collect::<Vec<_>>();
        assert!(first.iter().all(|&v| v < (1 << 48) - 1));
        let mut unique = first.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(first.len(), unique.len());
        assert_eq!(1000, perm.position());
    }
}
