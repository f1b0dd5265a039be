//! Digest modules: SHA-256, RIPEMD-160 and Keccak-256.

use ripemd::Ripemd160 as RipemdHasher;
use sha2::{Digest, Sha256 as Sha256Hasher};
use tiny_keccak::{Hasher, Keccak};

use crate::error::Result;
use crate::memory::{Cache, Slot};

use super::Algorithm;

/// SHA-256 (FIPS 180-4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

/// RIPEMD-160.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ripemd160;

/// Keccak-256 with the original Keccak padding (not NIST SHA3-256).
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256;

impl Algorithm for Sha256 {
    fn output_len(&self) -> usize {
        32
    }

    #[inline]
    fn execute(&self, cache: &mut Cache, input: Slot, output: Slot) -> Result<()> {
        let digest = sha256(cache.read(input)?);
        cache.write(output, &digest)
    }
}

impl Algorithm for Ripemd160 {
    fn output_len(&self) -> usize {
        20
    }

    #[inline]
    fn execute(&self, cache: &mut Cache, input: Slot, output: Slot) -> Result<()> {
        let digest = RipemdHasher::digest(cache.read(input)?);
        cache.write(output, digest.as_slice())
    }
}

impl Algorithm for Keccak256 {
    fn output_len(&self) -> usize {
        32
    }

    #[inline]
    fn execute(&self, cache: &mut Cache, input: Slot, output: Slot) -> Result<()> {
        let digest = keccak256(cache.read(input)?);
        cache.write(output, &digest)
    }
}

/// SHA-256 of arbitrary bytes.
#[inline]
pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256Hasher::digest(input));
    out
}

/// SHA-256 applied twice, as used by Base58Check checksums.
#[inline]
pub fn double_sha256(input: &[u8]) -> [u8; 32] {
    sha256(&sha256(input))
}

/// RIPEMD-160(SHA-256(data)).
#[inline]
pub fn hash160(input: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&RipemdHasher::digest(sha256(input)));
    out
}

/// Keccak-256 of arbitrary bytes.
#[inline]
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(input);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// BIP-340 tagged hash: SHA-256(SHA-256(tag) || SHA-256(tag) || data).
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut hasher = Sha256Hasher::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
