//! Address encoders: Base58Check, Bech32/Bech32m and EIP-55.

use bech32::{ToBase32, Variant};

use crate::error::{Result, SearchError};

use super::hash::{double_sha256, keccak256};

/// Turns a digest into an address string.
pub trait AddressEncoder {
    fn encode(&self, payload: &[u8]) -> Result<String>;
}

/// Base58Check with a one-byte version prefix.
#[derive(Debug, Clone, Copy)]
pub struct Base58Check {
    version: u8,
}

impl Base58Check {
    /// Longest payload accepted, in bytes.
    pub const MAX_PAYLOAD: usize = 32;

    pub const fn new(version: u8) -> Self {
        Self { version }
    }
}

impl AddressEncoder for Base58Check {
    fn encode(&self, payload: &[u8]) -> Result<String> {
        if payload.len() > Self::MAX_PAYLOAD {
            return Err(SearchError::InvalidLength {
                expected: Self::MAX_PAYLOAD,
                actual: payload.len(),
            });
        }
        // version || payload || checksum
        let mut buf = [0u8; 1 + Self::MAX_PAYLOAD + 4];
        let body = 1 + payload.len();
        buf[0] = self.version;
        buf[1..body].copy_from_slice(payload);
        let checksum = double_sha256(&buf[..body]);
        buf[body..body + 4].copy_from_slice(&checksum[..4]);
        Ok(bs58::encode(&buf[..body + 4]).into_string())
    }
}

/// Segwit address encoder. Witness version 0 uses Bech32, later versions
/// use Bech32m (BIP-350).
#[derive(Debug, Clone, Copy)]
pub struct SegwitEncoder {
    hrp: &'static str,
    witness_version: u8,
}

impl SegwitEncoder {
    pub const fn new(hrp: &'static str, witness_version: u8) -> Self {
        Self {
            hrp,
            witness_version,
        }
    }

    fn variant(&self) -> Variant {
        if self.witness_version == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }
}

impl AddressEncoder for SegwitEncoder {
    fn encode(&self, payload: &[u8]) -> Result<String> {
        let version = bech32::u5::try_from_u8(self.witness_version)
            .map_err(|e| SearchError::Encoding(e.to_string()))?;
        let mut data = Vec::with_capacity(1 + (payload.len() * 8 + 4) / 5);
        data.push(version);
        data.extend(payload.to_base32());
        bech32::encode(self.hrp, data, self.variant())
            .map_err(|e| SearchError::Encoding(e.to_string()))
    }
}

/// EIP-55 mixed-case checksummed hex, `0x` prefixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eip55;

impl AddressEncoder for Eip55 {
    fn encode(&self, payload: &[u8]) -> Result<String> {
        if payload.len() != 20 {
            return Err(SearchError::InvalidLength {
                expected: 20,
                actual: payload.len(),
            });
        }
        let hex_addr = hex::encode(payload);
        let hash = keccak256(hex_addr.as_bytes());

        let mut checksum = String::with_capacity(42);
        checksum.push_str("0x");

        for (i, c) in hex_addr.chars().enumerate() {
            let hash_byte = hash[i / 2];
            let hash_nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };

            if c.is_ascii_digit() || hash_nibble < 8 {
                checksum.push(c);
            } else {
                checksum.push(c.to_ascii_uppercase());
            }
        }

        Ok(checksum)
    }
}
