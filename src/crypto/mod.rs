//! Cryptographic building blocks of the derivation chain.
//!
//! This module provides:
//! - Digest modules (SHA-256, RIPEMD-160, Keccak-256) operating on cache slots
//! - secp256k1 public key derivation in several point formats
//! - Address encoders and decoders for every supported variant

mod address;
mod decode;
mod encoding;
mod hash;
mod keypair;

pub use address::{AddressKind, AddressVariant, Network};
pub use decode::{decode_address, DecodedAddress};
pub use encoding::{AddressEncoder, Base58Check, Eip55, SegwitEncoder};
pub use hash::{double_sha256, hash160, keccak256, sha256, tagged_hash, Keccak256, Ripemd160, Sha256};
pub use keypair::{PointFormat, PublicKeyDerivation};

use crate::error::Result;
use crate::memory::{Cache, Slot};

/// A stateless transformer from one cache slot into another.
///
/// `execute` reads exactly `input.length` bytes and writes exactly
/// [`output_len`](Algorithm::output_len) bytes at `output.start`; `output`
/// must have that length. All modules here finish reading before they
/// write, so input and output may overlap.
pub trait Algorithm {
    fn output_len(&self) -> usize;

    fn execute(&self, cache: &mut Cache, input: Slot, output: Slot) -> Result<()>;
}
