//! Slot layouts of the derivation chain.

use crate::crypto::AddressVariant;
use crate::memory::Slot;

/// How the public key is hashed into the matched digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashStage {
    /// SHA-256 into `sha256`, then RIPEMD-160 into `ripemd160`.
    Hash160 { sha256: Slot, ripemd160: Slot },
    /// Keccak-256 into `output`.
    Keccak { output: Slot },
    /// The public key slot is the digest.
    Identity,
}

/// Named slots partitioning one cache for a given variant.
///
/// Legacy and SegWit share the base layout: private key at 0..32, public key
/// from 32, SHA-256 at 97..129 and RIPEMD-160 at 129..149.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub private_key: Slot,
    pub public_key: Slot,
    pub hash: HashStage,
    pub digest: Slot,
}

impl SlotLayout {
    /// Cache size that fits every layout.
    pub const CAPACITY: usize = 149;

    const PRIVATE_KEY: Slot = Slot::new(0, 32);
    const SHA256: Slot = Slot::new(97, 32);
    const RIPEMD160: Slot = Slot::new(129, 20);

    pub const fn for_variant(variant: AddressVariant) -> Self {
        let public_key = Slot::new(32, variant.point_format().len());
        match variant {
            AddressVariant::Legacy { .. } | AddressVariant::SegWit => Self {
                private_key: Self::PRIVATE_KEY,
                public_key,
                hash: HashStage::Hash160 {
                    sha256: Self::SHA256,
                    ripemd160: Self::RIPEMD160,
                },
                digest: Self::RIPEMD160,
            },
            AddressVariant::Evm => {
                let keccak = Slot::new(96, 32);
                Self {
                    private_key: Self::PRIVATE_KEY,
                    public_key,
                    hash: HashStage::Keccak { output: keccak },
                    digest: keccak.sub(12, 20),
                }
            }
            AddressVariant::Taproot => Self {
                private_key: Self::PRIVATE_KEY,
                public_key,
                hash: HashStage::Identity,
                digest: public_key,
            },
        }
    }

    /// Smallest cache size holding every slot of this layout.
    pub fn required_capacity(&self) -> usize {
        let hash_end = match self.hash {
            HashStage::Hash160 { sha256, ripemd160 } => sha256.end.max(ripemd160.end),
            HashStage::Keccak { output } => output.end,
            HashStage::Identity => 0,
        };
        self.private_key
            .end
            .max(self.public_key.end)
            .max(self.digest.end)
            .max(hash_end)
    }
}
