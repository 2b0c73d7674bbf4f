//! Define [`Nibbles`] and the hex-prefix ("compact") path encoding that leaf
//! and extension nodes use to store their key pieces.
//!
//! Two layouts of the same key show up in this crate. [`Nibbles`] packs its
//! nibbles into the low `4 * count` bits of a `U256` (the last nibble is the
//! least significant one). Steps instead carry lookup keys *left-aligned*: the
//! first nibble occupies the most significant four bits of the word. Use
//! [`Nibbles::from_left_aligned`] and [`Nibbles::to_left_aligned`] to move
//! between the two.
use std::{
    fmt::{self, Debug, Display, LowerHex, UpperHex},
    ops::Range,
    str::FromStr,
};

use bytes::{Bytes, BytesMut};
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Use a whole byte for a Nibble just for convenience
/// A Nibble has 4 bits and is stored as `u8`.
pub type Nibble = u8;

/// The longest key (in nibbles) that an Ethereum trie can hold.
pub const MAX_NIBBLES: usize = 64;

/// The longest hex-prefix encoded path: one flag byte plus `32` path bytes.
pub const MAX_HEX_PREFIX_BYTES: usize = 33;

const TERMINATING_FLAG: u8 = 0b0010;
const ODD_FLAG: u8 = 0b0001;

const MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG: &str =
    "Attempted to create a nibbles sequence longer than 64!";
const SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG: &str =
    "Attempted to append a single nibble that was greater than 15!";

#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
/// Errors encountered when converting from `Bytes` to `Nibbles`.
pub enum BytesToNibblesError {
    #[error("Tried constructing `Nibbles` from a zero byte slice")]
    /// The size is zero.
    ZeroSizedKey,

    #[error("Tried constructing `Nibbles` from a byte slice with more than 32 bytes (len: {0})")]
    /// The slice is too large.
    TooManyBytes(usize),
}

#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
/// Errors encountered when converting a hex prefix encoding into nibbles.
pub enum FromHexPrefixError {
    #[error("Tried to convert an empty byte string into `Nibbles`")]
    /// There is no flag byte.
    Empty,

    #[error("Tried to convert a hex prefix byte string into `Nibbles` with invalid flags at the start: {0:#06b}")]
    /// The reserved flag bits are set.
    InvalidFlags(Nibble),

    #[error("Hex prefix byte string for an even length path has a non-zero padding nibble: {0:#x}")]
    /// An even length path must leave the low nibble of the flag byte zeroed.
    NonZeroPadding(Nibble),

    #[error("Tried to convert a hex prefix byte string into `Nibbles` that was longer than 33 bytes or 64 nibbles: (bytes: {0}, length: {1})")]
    /// The hex prefix encoding is too large.
    TooLong(String, usize),
}

/// An error encountered when converting a string to a sequence of nibbles.
#[derive(Debug, Error)]
pub enum StrToNibblesError {
    #[error(transparent)]
    /// The string is not valid hex.
    Hex(#[from] hex::FromHexError),

    #[error("Tried constructing `Nibbles` from a hex string with more than 64 nibbles (len: {0})")]
    /// The string holds more nibbles than a key can.
    TooLong(usize),
}

#[derive(Copy, Clone, Deserialize, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
/// A sequence of up to `64` nibbles, used both for key pieces stored in nodes
/// and for the lookup keys steps walk down.
///
/// It's important to note that leading `0` nibbles are part of a key:
/// ```rust
/// # use mpt_step::nibbles::Nibbles;
/// # use std::str::FromStr;
/// let n1 = Nibbles::from_str("0x123").unwrap();
/// let n2 = Nibbles::from_str("0x0123").unwrap();
///
/// assert_ne!(n1, n2); // These are different keys
/// ```
pub struct Nibbles {
    /// The number of nibbles in this sequence.
    pub count: usize,
    /// A packed encoding of these nibbles. Only the first (least significant)
    /// `4 * count` bits are used. The rest are unused and should be zero.
    pub packed: U256,
}

impl Display for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as LowerHex>::fmt(self, f)
    }
}

// Manual impl in order to print `packed` nicely.
impl Debug for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nibbles")
            .field("count", &self.count)
            .field("packed", &format!("{self:x}"))
            .finish()
    }
}

impl FromStr for Nibbles {
    type Err = StrToNibblesError;

    /// Parses a hex string with or without a preceding "0x". Every character
    /// (leading zeros included) becomes one nibble.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped_str = s.strip_prefix("0x").unwrap_or(s);
        let count = stripped_str.len();

        if count > MAX_NIBBLES {
            return Err(StrToNibblesError::TooLong(count));
        }

        let padded = match count % 2 {
            0 => stripped_str.to_string(),
            _ => format!("0{stripped_str}"),
        };
        let bytes = hex::decode(padded)?;

        Ok(Self {
            count,
            packed: U256::from_big_endian(&bytes),
        })
    }
}

impl LowerHex for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex_str(|bytes| hex::encode(bytes)))
    }
}

impl UpperHex for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex_str(|bytes| hex::encode_upper(bytes)))
    }
}

impl From<H256> for Nibbles {
    fn from(v: H256) -> Self {
        Self::from_h256_be(v)
    }
}

impl Nibbles {
    /// An empty sequence.
    pub const fn empty() -> Self {
        Self {
            count: 0,
            packed: U256([0; 4]),
        }
    }

    /// Creates `Nibbles` from big endian bytes. Every byte holds two nibbles.
    ///
    /// Returns an error if the byte slice is empty or is longer than `32`
    /// bytes.
    pub fn from_bytes_be(bytes: &[u8]) -> Result<Self, BytesToNibblesError> {
        if bytes.is_empty() {
            return Err(BytesToNibblesError::ZeroSizedKey);
        }

        if bytes.len() > 32 {
            return Err(BytesToNibblesError::TooManyBytes(bytes.len()));
        }

        Ok(Self {
            count: bytes.len() * 2,
            packed: U256::from_big_endian(bytes),
        })
    }

    /// Creates a full length (`64` nibble) key from a big endian `H256`.
    pub fn from_h256_be(v: H256) -> Self {
        Self {
            count: MAX_NIBBLES,
            packed: U256::from_big_endian(v.as_bytes()),
        }
    }

    /// Creates a new `Nibbles` from a single `Nibble`.
    ///
    /// # Panics
    /// Panics if the nibble is > `0xf`.
    pub fn from_nibble(n: Nibble) -> Self {
        assert!(n <= 0xf, "{}", SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG);

        Self {
            count: 1,
            packed: n.into(),
        }
    }

    /// Reads the first `count` nibbles of a left-aligned key word (first
    /// nibble in the most significant bits).
    ///
    /// # Panics
    /// Panics if `count` is larger than `64`.
    pub fn from_left_aligned(word: U256, count: usize) -> Self {
        assert!(count <= MAX_NIBBLES, "{}", MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG);

        Self {
            count,
            packed: shr_nibbles(word, MAX_NIBBLES - count),
        }
    }

    /// The inverse of [`Nibbles::from_left_aligned`]. Bits past the last
    /// nibble are zero.
    pub fn to_left_aligned(&self) -> U256 {
        shl_nibbles(self.packed, MAX_NIBBLES - self.count)
    }

    /// Gets the nth proceeding nibble. The front `Nibble` is at idx `0`.
    ///
    /// # Panics
    /// Panics if `idx` is out of range.
    pub fn get_nibble(&self, idx: usize) -> Nibble {
        assert!(
            idx < self.count,
            "Tried reading nibble {idx} of a sequence of {} nibbles",
            self.count
        );

        let shifted = shr_nibbles(self.packed, self.count - idx - 1);
        (shifted.low_u64() & 0xf) as Nibble
    }

    /// Gets the next `n` nibbles.
    ///
    /// # Panics
    /// Panics if `n` is larger than the number of nibbles contained.
    pub fn get_next_nibbles(&self, n: usize) -> Nibbles {
        self.get_nibble_range(0..n)
    }

    /// Gets the nibbles in the given (front indexed) range.
    ///
    /// # Panics
    /// Panics if the range reaches past the end of the sequence.
    pub fn get_nibble_range(&self, range: Range<usize>) -> Nibbles {
        assert!(range.start <= range.end && range.end <= self.count);

        let count = range.end - range.start;
        let shifted = shr_nibbles(self.packed, self.count - range.end);

        Nibbles {
            count,
            packed: shifted & create_mask_of_1s(count * 4),
        }
    }

    /// Drops the first `n` nibbles. Truncating more nibbles than are held
    /// leaves an empty sequence.
    pub fn truncate_n_nibbles_front(&self, n: usize) -> Nibbles {
        let count = self.count - n.min(self.count);

        Nibbles {
            count,
            packed: self.packed & create_mask_of_1s(count * 4),
        }
    }

    /// Returns whether or not this `Nibbles` contains actual nibbles. (If
    /// `count` is set to `0`)
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pushes a nibble onto the back.
    ///
    /// # Panics
    /// Panics if the nibble is > `0xf` or the sequence is already full.
    pub fn push_nibble_back(&mut self, n: Nibble) {
        self.nibble_append_safety_asserts(n);

        self.packed = shl_nibbles(self.packed, 1) | U256::from(n);
        self.count += 1;
    }

    /// Merge a single Nibble with a `Nibbles`. `self` will be the prefix.
    ///
    /// # Panics
    /// Panics if merging the `Nibble` causes an overflow (total nibbles > 64).
    pub fn merge_nibble(&self, post: Nibble) -> Nibbles {
        let mut merged = *self;
        merged.push_nibble_back(post);

        merged
    }

    /// Merge two `Nibbles` together. `self` will be the prefix.
    ///
    /// # Panics
    /// Panics if merging the `Nibbles` causes an overflow (total nibbles > 64).
    pub fn merge_nibbles(&self, post: &Nibbles) -> Nibbles {
        let new_count = self.count + post.count;
        assert!(new_count <= MAX_NIBBLES, "{}", MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG);

        Nibbles {
            count: new_count,
            packed: shl_nibbles(self.packed, post.count) | post.packed,
        }
    }

    /// Splits the `Nibbles` at the given index, returning two `Nibbles`.
    /// Specifically, if `0x1234` is split at `1`, we get `0x1` and `0x234`.
    ///
    /// # Panics
    /// Panics if the `idx` is out of range.
    pub fn split_at_idx(&self, idx: usize) -> (Nibbles, Nibbles) {
        (
            self.get_nibble_range(0..idx),
            self.get_nibble_range(idx..self.count),
        )
    }

    /// Returns the number of leading nibbles both sequences share. Never
    /// larger than the shorter of the two.
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        let min_count = self.count.min(other.count);

        (0..min_count)
            .find(|&i| self.get_nibble(i) != other.get_nibble(i))
            .unwrap_or(min_count)
    }

    /// Returns the minimum number of bytes needed to represent these `Nibbles`.
    pub const fn min_bytes(&self) -> usize {
        (self.count + 1) / 2
    }

    /// Returns the nibbles bytes in big-endian format. An odd count is padded
    /// with a leading zero nibble.
    pub fn bytes_be(&self) -> Vec<u8> {
        let mut byte_buf = [0; 32];
        self.packed.to_big_endian(&mut byte_buf);

        byte_buf[32 - self.min_bytes()..].to_vec()
    }

    /// Returns a hex representation of the string.
    fn as_hex_str<F>(&self, hex_encode_f: F) -> String
    where
        F: Fn(&[u8]) -> String,
    {
        let hex_string_raw = hex_encode_f(&self.bytes_be());
        let skip = self.count % 2;

        let mut hex_string = String::from("0x");
        hex_string.extend(hex_string_raw.chars().skip(skip));

        hex_string
    }

    /// Converts [`Nibbles`] to hex-prefix encoding (AKA "compact").
    /// The flag nibble in front encodes whether the path has an odd length
    /// and whether it belongs to a leaf (terminator) or not.
    pub fn to_hex_prefix_encoding(&self, is_leaf: bool) -> Bytes {
        let num_bytes = self.count / 2 + 1;
        let flag_byte_idx = MAX_HEX_PREFIX_BYTES - num_bytes;

        // `to_big_endian` always writes `32` bytes.
        let mut bytes = BytesMut::zeroed(MAX_HEX_PREFIX_BYTES);
        self.packed.to_big_endian(&mut bytes[1..]);

        let odd_bit = match self.count % 2 {
            0 => 0,
            _ => ODD_FLAG,
        };

        let term_bit = match is_leaf {
            false => 0,
            true => TERMINATING_FLAG,
        };

        bytes[flag_byte_idx] |= (odd_bit | term_bit) << 4;
        Bytes::copy_from_slice(&bytes[flag_byte_idx..])
    }

    /// Converts a hex prefix byte string (AKA "compact") into `Nibbles`, also
    /// returning whether the terminating (leaf) flag was set.
    pub fn from_hex_prefix_encoding(
        hex_prefix_bytes: &[u8],
    ) -> Result<(Self, bool), FromHexPrefixError> {
        let (&flag_byte, path_bytes) = hex_prefix_bytes
            .split_first()
            .ok_or(FromHexPrefixError::Empty)?;

        let flag_bits = flag_byte >> 4;
        if flag_bits & !(TERMINATING_FLAG | ODD_FLAG) != 0 {
            return Err(FromHexPrefixError::InvalidFlags(flag_bits));
        }

        let is_leaf = flag_bits & TERMINATING_FLAG != 0;
        let is_odd = flag_bits & ODD_FLAG != 0;
        let count = path_bytes.len() * 2 + usize::from(is_odd);

        if hex_prefix_bytes.len() > MAX_HEX_PREFIX_BYTES || count > MAX_NIBBLES {
            return Err(FromHexPrefixError::TooLong(
                hex::encode(hex_prefix_bytes),
                hex_prefix_bytes.len(),
            ));
        }

        let first_nibble = flag_byte & 0xf;
        let mut nibbles = match (is_odd, first_nibble) {
            (true, n) => Nibbles::from_nibble(n),
            (false, 0) => Nibbles::empty(),
            (false, n) => return Err(FromHexPrefixError::NonZeroPadding(n)),
        };

        for b in path_bytes {
            nibbles.push_nibble_back(b >> 4);
            nibbles.push_nibble_back(b & 0xf);
        }

        Ok((nibbles, is_leaf))
    }

    fn nibble_append_safety_asserts(&self, n: Nibble) {
        assert!(
            self.count < MAX_NIBBLES,
            "{}",
            MULTIPLE_NIBBLES_APPEND_ASSERT_ERR_MSG
        );
        assert!(n < 16, "{}", SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG);
    }
}

/// Decodes a hex-prefix encoded node path into its terminating flag and its
/// nibbles (which carry their own count).
pub fn decode_path(encoded: &[u8]) -> Result<(bool, Nibbles), FromHexPrefixError> {
    Nibbles::from_hex_prefix_encoding(encoded).map(|(nibbles, is_leaf)| (is_leaf, nibbles))
}

/// The exact inverse of [`decode_path`].
pub fn encode_path(nibbles: &Nibbles, terminating: bool) -> Bytes {
    nibbles.to_hex_prefix_encoding(terminating)
}

/// Returns the longest common prefix of two paths, comparing from the first
/// nibble and stopping at the first mismatch or at the end of the shorter one.
pub fn common_nibble_prefix(a: &Nibbles, b: &Nibbles) -> Nibbles {
    a.get_next_nibbles(a.common_prefix_len(b))
}

pub(crate) fn create_mask_of_1s(amt: usize) -> U256 {
    match amt {
        0 => U256::zero(),
        a if a >= 256 => U256::MAX,
        a => (U256::one() << a) - 1,
    }
}

fn shl_nibbles(v: U256, n: usize) -> U256 {
    match n {
        n if n >= MAX_NIBBLES => U256::zero(),
        n => v << (n * 4),
    }
}

fn shr_nibbles(v: U256, n: usize) -> U256 {
    match n {
        n if n >= MAX_NIBBLES => U256::zero(),
        n => v >> (n * 4),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethereum_types::{H256, U256};

    use super::{
        common_nibble_prefix, decode_path, encode_path, FromHexPrefixError, Nibbles,
        StrToNibblesError,
    };

    const ZERO_NIBS_63: &str = "0x000000000000000000000000000000000000000000000000000000000000000";
    const ZERO_NIBS_64: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
    const ZERO_NIBS_64_LEADING_1: &str =
        "0x1000000000000000000000000000000000000000000000000000000000000000";

    fn nibs(s: &str) -> Nibbles {
        Nibbles::from_str(s).unwrap()
    }

    #[test]
    fn get_nibble_works() -> Result<(), StrToNibblesError> {
        let n = Nibbles::from_str("0x1234")?;
        assert_eq!(n.get_nibble(0), 0x1);
        assert_eq!(n.get_nibble(3), 0x4);

        let n = Nibbles::from_str(ZERO_NIBS_64_LEADING_1)?;
        assert_eq!(n.get_nibble(0), 0x1);
        assert_eq!(n.get_nibble(63), 0x0);

        Ok(())
    }

    #[test]
    fn leading_zeros_are_counted() -> Result<(), StrToNibblesError> {
        assert_eq!(Nibbles::from_str("0x0123")?.count, 4);
        assert_eq!(Nibbles::from_str(ZERO_NIBS_63)?.count, 63);
        assert_eq!(Nibbles::from_str(ZERO_NIBS_64)?.count, 64);
        assert_eq!(Nibbles::from_str("0x")?, Nibbles::empty());

        Ok(())
    }

    #[test]
    fn from_str_rejects_more_than_64_nibbles() {
        let too_long = format!("{ZERO_NIBS_64}0");
        assert!(matches!(
            Nibbles::from_str(&too_long),
            Err(StrToNibblesError::TooLong(65))
        ));
    }

    #[test]
    fn get_nibble_range_works() -> Result<(), StrToNibblesError> {
        let n = Nibbles::from_str("0x123456")?;

        assert_eq!(n.get_nibble_range(0..0), Nibbles::empty());
        assert_eq!(n.get_nibble_range(0..2), Nibbles::from_str("0x12")?);
        assert_eq!(n.get_nibble_range(2..5), Nibbles::from_str("0x345")?);
        assert_eq!(n.get_nibble_range(0..6), n);
        assert_eq!(n.get_next_nibbles(1), Nibbles::from_str("0x1")?);

        Ok(())
    }

    #[test]
    fn truncate_nibbles_works() -> Result<(), StrToNibblesError> {
        let n = Nibbles::from_str("0x1234")?;

        assert_eq!(n.truncate_n_nibbles_front(0), n);
        assert_eq!(n.truncate_n_nibbles_front(1), Nibbles::from_str("0x234")?);
        assert_eq!(n.truncate_n_nibbles_front(4), Nibbles::empty());
        assert_eq!(n.truncate_n_nibbles_front(9), Nibbles::empty());

        Ok(())
    }

    #[test]
    fn split_at_idx_works() -> Result<(), StrToNibblesError> {
        let n = Nibbles::from_str("0x1234")?;

        assert_eq!(
            n.split_at_idx(0),
            (Nibbles::empty(), Nibbles::from_str("0x1234")?)
        );
        assert_eq!(
            n.split_at_idx(1),
            (Nibbles::from_str("0x1")?, Nibbles::from_str("0x234")?)
        );
        assert_eq!(
            n.split_at_idx(4),
            (Nibbles::from_str("0x1234")?, Nibbles::empty())
        );

        Ok(())
    }

    #[test]
    fn merge_nibbles_works() -> Result<(), StrToNibblesError> {
        let pre = Nibbles::from_str("0x12")?;

        assert_eq!(pre.merge_nibble(0x3), Nibbles::from_str("0x123")?);
        assert_eq!(
            pre.merge_nibbles(&Nibbles::from_str("0x0034")?),
            Nibbles::from_str("0x120034")?
        );
        assert_eq!(Nibbles::empty().merge_nibbles(&pre), pre);

        let full = Nibbles::from_str(ZERO_NIBS_64_LEADING_1)?;
        assert_eq!(Nibbles::empty().merge_nibbles(&full), full);

        Ok(())
    }

    #[test]
    #[should_panic]
    fn merge_nibbles_panics_past_64_nibbles() {
        let full = nibs(ZERO_NIBS_64);
        full.merge_nibble(1);
    }

    #[test]
    fn left_aligned_conversions_work() {
        let n = nibbles_from_left_aligned_hex("0xabc", 3);
        assert_eq!(n, nibs("0xabc"));
        assert_eq!(n.to_left_aligned(), U256::from(0xabc) << 244);

        let full = Nibbles::from_h256_be(H256::repeat_byte(0x5a));
        assert_eq!(
            Nibbles::from_left_aligned(full.to_left_aligned(), 64),
            full
        );

        assert_eq!(
            Nibbles::from_left_aligned(U256::MAX, 0),
            Nibbles::empty()
        );
        assert_eq!(Nibbles::empty().to_left_aligned(), U256::zero());
    }

    fn nibbles_from_left_aligned_hex(s: &str, count: usize) -> Nibbles {
        let word = nibs(s).to_left_aligned();
        Nibbles::from_left_aligned(word, count)
    }

    #[test]
    fn nibbles_to_hex_prefix_encoding_works() {
        assert_eq!(encode_path(&nibs("0x"), false).as_ref(), &[0x00]);
        assert_eq!(encode_path(&nibs("0x"), true).as_ref(), &[0x20]);
        assert_eq!(encode_path(&nibs("0x1"), false).as_ref(), &[0x11]);
        assert_eq!(encode_path(&nibs("0x12"), true).as_ref(), &[0x20, 0x12]);
        assert_eq!(encode_path(&nibs("0xabc"), true).as_ref(), &[0x3a, 0xbc]);
        assert_eq!(
            encode_path(&nibs("0x0123"), false).as_ref(),
            &[0x00, 0x01, 0x23]
        );

        let full = encode_path(&nibs(ZERO_NIBS_64_LEADING_1), true);
        assert_eq!(full.len(), 33);
        assert_eq!(full[0], 0x20);
        assert_eq!(full[1], 0x10);

        let odd = encode_path(&nibs(ZERO_NIBS_63), true);
        assert_eq!(odd.len(), 32);
        assert_eq!(odd[0], 0x30);
    }

    #[test]
    fn nibbles_from_hex_prefix_encoding_works() {
        assert_eq!(decode_path(&[0x00]), Ok((false, nibs("0x"))));
        assert_eq!(decode_path(&[0x20]), Ok((true, nibs("0x"))));
        assert_eq!(decode_path(&[0x11]), Ok((false, nibs("0x1"))));
        assert_eq!(decode_path(&[0x3a, 0xbc]), Ok((true, nibs("0xabc"))));
        assert_eq!(
            decode_path(&[0x00, 0x01, 0x23]),
            Ok((false, nibs("0x0123")))
        );
    }

    #[test]
    fn hex_prefix_round_trips_for_every_length() {
        for count in 0..=64 {
            let nibbles = Nibbles::from_left_aligned(U256::MAX / 7, count);
            for terminating in [false, true] {
                let encoded = encode_path(&nibbles, terminating);
                assert_eq!(encoded.len(), 1 + count / 2);
                assert_eq!(decode_path(&encoded), Ok((terminating, nibbles)));
            }
        }
    }

    #[test]
    fn nibbles_from_hex_prefix_encoding_errors_if_flags_invalid() {
        assert_eq!(
            decode_path(&[0x40]),
            Err(FromHexPrefixError::InvalidFlags(0b0100))
        );
        assert_eq!(
            decode_path(&[0xc1, 0x00]),
            Err(FromHexPrefixError::InvalidFlags(0b1100))
        );
    }

    #[test]
    fn nibbles_from_hex_prefix_encoding_errors_on_bad_lengths() {
        assert_eq!(decode_path(&[]), Err(FromHexPrefixError::Empty));

        let too_many_bytes = [0x20; 34];
        assert!(matches!(
            decode_path(&too_many_bytes),
            Err(FromHexPrefixError::TooLong(_, 34))
        ));

        // 33 bytes with the odd flag would hold 65 nibbles.
        let mut odd_and_full = [0u8; 33];
        odd_and_full[0] = 0x31;
        assert!(matches!(
            decode_path(&odd_and_full),
            Err(FromHexPrefixError::TooLong(_, 33))
        ));
    }

    #[test]
    fn nibbles_from_hex_prefix_encoding_errors_on_padding() {
        assert_eq!(
            decode_path(&[0x25, 0x12]),
            Err(FromHexPrefixError::NonZeroPadding(0x5))
        );
    }

    #[test]
    fn common_nibble_prefix_works() {
        assert_eq!(common_nibble_prefix(&nibs("0xabc"), &nibs("0xabd")), nibs("0xab"));
        assert_eq!(common_nibble_prefix(&nibs("0xabc"), &nibs("0xab")), nibs("0xab"));
        assert_eq!(common_nibble_prefix(&nibs("0x1"), &nibs("0x2")), nibs("0x"));
        assert_eq!(common_nibble_prefix(&nibs("0x"), &nibs("0x12")), nibs("0x"));
        assert_eq!(
            common_nibble_prefix(&nibs("0x0123"), &nibs("0x0123")),
            nibs("0x0123")
        );
    }

    #[test]
    fn common_prefix_len_stops_at_first_difference() {
        let a = Nibbles::from_h256_be(H256::repeat_byte(0x11));
        let mut b_bytes = [0x11; 32];
        b_bytes[20] = 0x12;
        let b = Nibbles::from_h256_be(H256(b_bytes));

        let len = a.common_prefix_len(&b);
        assert_eq!(len, 41);
        assert_eq!(a.get_next_nibbles(len), b.get_next_nibbles(len));
        assert_ne!(a.get_nibble(len), b.get_nibble(len));
    }

    #[test]
    fn nibbles_display_works() {
        assert_eq!(format!("{}", nibs("0x0123")), "0x0123");
        assert_eq!(format!("{:x}", nibs("0xabc")), "0xabc");
        assert_eq!(format!("{:X}", nibs("0xabc")), "0xABC");
        assert_eq!(format!("{}", Nibbles::empty()), "0x");
    }

    #[test]
    fn from_bytes_be_works() {
        assert_eq!(Nibbles::from_bytes_be(&[0x01, 0x23]), Ok(nibs("0x0123")));
        assert!(Nibbles::from_bytes_be(&[]).is_err());
        assert!(Nibbles::from_bytes_be(&[0; 33]).is_err());
    }
}
