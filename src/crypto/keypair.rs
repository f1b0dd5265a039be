//! secp256k1 public key derivation.

use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};

use crate::error::{Result, SearchError};
use crate::memory::{Cache, Slot};

use super::hash::tagged_hash;
use super::Algorithm;

/// Serialization of the derived public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointFormat {
    /// `04 || x || y`, 65 bytes.
    Uncompressed,
    /// `02/03 || x`, 33 bytes.
    Compressed,
    /// `x || y` without the prefix byte, 64 bytes. Keccak-256 input for EVM addresses.
    UncompressedRaw,
    /// BIP-341 key-path output key: x-only `P + H_TapTweak(P)·G`, 32 bytes.
    XOnlyTweaked,
}

impl PointFormat {
    pub const fn len(self) -> usize {
        match self {
            PointFormat::Uncompressed => 65,
            PointFormat::Compressed => 33,
            PointFormat::UncompressedRaw => 64,
            PointFormat::XOnlyTweaked => 32,
        }
    }
}

/// Derives a public key from a 32-byte private key held in the cache.
pub struct PublicKeyDerivation {
    secp: Secp256k1<All>,
    format: PointFormat,
}

impl PublicKeyDerivation {
    /// Creates the derivation module. Builds the secp256k1 context, so call
    /// this once per pipeline, not per candidate.
    pub fn new(format: PointFormat) -> Self {
        Self {
            secp: Secp256k1::new(),
            format,
        }
    }

    pub fn format(&self) -> PointFormat {
        self.format
    }

    fn derive(&self, scalar: &[u8]) -> Result<PublicKey> {
        if scalar.len() != 32 {
            return Err(SearchError::InvalidLength {
                expected: 32,
                actual: scalar.len(),
            });
        }
        let secret = SecretKey::from_slice(scalar).map_err(|_| SearchError::InvalidScalar)?;
        Ok(PublicKey::from_secret_key(&self.secp, &secret))
    }
}

impl Algorithm for PublicKeyDerivation {
    fn output_len(&self) -> usize {
        self.format.len()
    }

    fn execute(&self, cache: &mut Cache, input: Slot, output: Slot) -> Result<()> {
        let public = self.derive(cache.read(input)?)?;
        match self.format {
            PointFormat::Uncompressed => cache.write(output, &public.serialize_uncompressed()),
            PointFormat::Compressed => cache.write(output, &public.serialize()),
            PointFormat::UncompressedRaw => {
                cache.write(output, &public.serialize_uncompressed()[1..])
            }
            PointFormat::XOnlyTweaked => {
                let (internal, _) = public.x_only_public_key();
                let tweak = tagged_hash("TapTweak", &internal.serialize());
                let tweak = Scalar::from_be_bytes(tweak).map_err(|_| SearchError::InvalidScalar)?;
                let (output_key, _) = internal
                    .add_tweak(&self.secp, &tweak)
                    .map_err(|_| SearchError::InvalidScalar)?;
                cache.write(output, &output_key.serialize())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::{CURVE_ORDER, U256};

    const G_UNCOMPRESSED: &str = "0479BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8";

    fn derive_hex(format: PointFormat, key: U256) -> Result<String> {
        let mut cache = Cache::new(128);
        let private = Slot::new(0, 32);
        let public = Slot::new(32, format.len());
        cache.write(private, &key.to_be_bytes())?;
        PublicKeyDerivation::new(format).execute(&mut cache, private, public)?;
        cache.to_hex(public)
    }

    #[test]
    fn test_generator_point_uncompressed() {
        assert_eq!(
            derive_hex(PointFormat::Uncompressed, U256::ONE).unwrap(),
            G_UNCOMPRESSED
        );
    }

    #[test]
    fn test_generator_point_other_formats() {
        assert_eq!(
            derive_hex(PointFormat::Compressed, U256::ONE).unwrap(),
            format!("02{}", &G_UNCOMPRESSED[2..66])
        );
        assert_eq!(
            derive_hex(PointFormat::UncompressedRaw, U256::ONE).unwrap(),
            &G_UNCOMPRESSED[2..]
        );
    }

    #[test]
    fn test_tweaked_key_differs_from_internal_key() {
        let tweaked = derive_hex(PointFormat::XOnlyTweaked, U256::ONE).unwrap();
        assert_eq!(tweaked.len(), 64);
        assert_ne!(tweaked, &G_UNCOMPRESSED[2..66]);
        assert_eq!(
            tweaked,
            derive_hex(PointFormat::XOnlyTweaked, U256::ONE).unwrap()
        );
    }

    #[test]
    fn test_invalid_scalars() {
        assert_eq!(
            derive_hex(PointFormat::Compressed, U256::ZERO).unwrap_err(),
            SearchError::InvalidScalar
        );
        assert_eq!(
            derive_hex(PointFormat::Compressed, CURVE_ORDER).unwrap_err(),
            SearchError::InvalidScalar
        );
        assert_eq!(
            derive_hex(PointFormat::Compressed, U256::MAX).unwrap_err(),
            SearchError::InvalidScalar
        );
        let max_key = CURVE_ORDER.checked_decrement().unwrap();
        assert!(derive_hex(PointFormat::Compressed, max_key).is_ok());
    }

    #[test]
    fn test_scalar_slot_must_be_32_bytes() {
        let mut cache = Cache::new(128);
        let err = PublicKeyDerivation::new(PointFormat::Compressed)
            .execute(&mut cache, Slot::new(0, 31), Slot::new(32, 33))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidLength { expected: 32, actual: 31 }));
    }
}
