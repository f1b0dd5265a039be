//! 256-bit keyspace arithmetic and hex boundary parsing.
//!
//! Arithmetic and ordering come from `ethereum_types::U256`; this wrapper adds
//! the big-endian byte and hex forms the cache and the job records use.

use std::fmt;
use std::str::FromStr;

use ethereum_types::U256 as Word;

use crate::error::{Result, SearchError};

/// secp256k1 curve order n.
pub const CURVE_ORDER: U256 = U256(Word([
    0xBFD2_5E8C_D036_4141,
    0xBAAE_DCE6_AF48_A03B,
    0xFFFF_FFFF_FFFF_FFFE,
    0xFFFF_FFFF_FFFF_FFFF,
]));

/// An unsigned 256-bit integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256(Word);

impl U256 {
    pub const ZERO: U256 = U256(Word([0; 4]));
    pub const ONE: U256 = U256::from_u64(1);
    pub const MAX: U256 = U256(Word([u64::MAX; 4]));

    #[inline]
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(Word::from_big_endian(&bytes))
    }

    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self(Word([value, 0, 0, 0]))
    }

    /// Left-pads a big-endian slice of at most 32 bytes.
    pub fn from_be_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() > 32 {
            return Err(SearchError::InvalidLength {
                expected: 32,
                actual: slice.len(),
            });
        }
        Ok(Self(Word::from_big_endian(slice)))
    }

    /// Parses a hex string with optional `0x` prefix, either case, any number
    /// of leading zeros. Values wider than 256 bits are rejected.
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SearchError::InvalidHex(input.to_string()));
        }
        let significant = digits.trim_start_matches('0');
        if significant.len() > 64 {
            return Err(SearchError::InvalidHex(format!(
                "value has {} hex digits, at most 64 are allowed",
                significant.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(format!("{significant:0>64}"), &mut bytes)?;
        Ok(Self::from_be_bytes(bytes))
    }

    #[inline]
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        bytes
    }

    /// Returns the value as 64 uppercase hex digits.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_be_bytes())
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant bits.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.0.bits() as u32
    }

    #[inline]
    pub fn checked_add(&self, other: &U256) -> Option<U256> {
        self.0.checked_add(other.0).map(U256)
    }

    #[inline]
    pub fn checked_sub(&self, other: &U256) -> Option<U256> {
        self.0.checked_sub(other.0).map(U256)
    }

    #[inline]
    pub fn checked_increment(&self) -> Option<U256> {
        self.checked_add(&U256::ONE)
    }

    #[inline]
    pub fn checked_decrement(&self) -> Option<U256> {
        self.checked_sub(&U256::ONE)
    }

    /// Returns true if the value is a usable secp256k1 private key (0 < k < n).
    #[inline]
    pub fn is_valid_private_key(&self) -> bool {
        !self.is_zero() && *self < CURVE_ORDER
    }
}

impl FromStr for U256 {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        U256::from_hex(s)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256(0x{})", self.to_hex())
    }
}

/// An inclusive range of private keys.
///
/// Both ends lie in `[1, n - 1]`, so every member is a valid secp256k1 key
/// and stepping one past either end never overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    lower: U256,
    upper: U256,
}

impl SearchRange {
    pub fn new(lower: U256, upper: U256) -> Result<Self> {
        if lower > upper {
            return Err(SearchError::MalformedRange(format!(
                "lower bound {lower} is greater than upper bound {upper}"
            )));
        }
        if lower.is_zero() {
            return Err(SearchError::MalformedRange(
                "lower bound must be at least 1".into(),
            ));
        }
        if upper >= CURVE_ORDER {
            return Err(SearchError::MalformedRange(format!(
                "upper bound {upper} is not below the curve order"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Parses both bounds from hex.
    pub fn parse(lower: &str, upper: &str) -> Result<Self> {
        let lower = U256::from_hex(lower)
            .map_err(|e| SearchError::MalformedRange(format!("lower bound: {e}")))?;
        let upper = U256::from_hex(upper)
            .map_err(|e| SearchError::MalformedRange(format!("upper bound: {e}")))?;
        Self::new(lower, upper)
    }

    #[inline]
    pub fn lower(&self) -> U256 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> U256 {
        self.upper
    }

    /// `upper - lower`; the range holds `width + 1` keys.
    pub fn width(&self) -> U256 {
        self.upper
            .checked_sub(&self.lower)
            .unwrap_or(U256::ZERO)
    }

    #[inline]
    pub fn contains(&self, value: &U256) -> bool {
        *value >= self.lower && *value <= self.upper
    }
}
