//! Target address lookup.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::crypto::{decode_address, AddressKind, Network};
use crate::error::{Result, SearchError};

/// Opaque identifier of a target address, assigned by the caller.
pub type AddressId = u64;

/// Target digests grouped by address kind.
///
/// Built once from address strings, then queried with the raw digest the
/// pipeline computes. Lookups never allocate.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    network: Network,
    legacy: HashMap<[u8; 20], AddressId>,
    segwit: HashMap<[u8; 20], AddressId>,
    taproot: HashMap<[u8; 32], AddressId>,
    evm: HashMap<[u8; 20], AddressId>,
}

impl TargetSet {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Decodes all `(id, address)` entries in parallel.
    ///
    /// Fails on the first address that does not decode for `network`.
    pub fn from_addresses<S>(network: Network, entries: Vec<(AddressId, S)>) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        let decoded = entries
            .par_iter()
            .map(|(id, address)| decode_address(address.as_ref(), network).map(|d| (*id, d)))
            .collect::<Result<Vec<_>>>()?;

        let mut set = Self::new(network);
        for (id, address) in decoded {
            set.insert_digest(address.kind, &address.payload, id)?;
        }
        Ok(set)
    }

    /// Adds one target address.
    pub fn insert(&mut self, id: AddressId, address: &str) -> Result<()> {
        let decoded = decode_address(address, self.network)?;
        self.insert_digest(decoded.kind, &decoded.payload, id)
    }

    /// Adds a raw digest for `kind`.
    pub fn insert_digest(&mut self, kind: AddressKind, digest: &[u8], id: AddressId) -> Result<()> {
        let bad_length = |expected| SearchError::InvalidLength {
            expected,
            actual: digest.len(),
        };
        match kind {
            AddressKind::Legacy => {
                let key = digest.try_into().map_err(|_| bad_length(20))?;
                self.legacy.insert(key, id);
            }
            AddressKind::SegWit => {
                let key = digest.try_into().map_err(|_| bad_length(20))?;
                self.segwit.insert(key, id);
            }
            AddressKind::Taproot => {
                let key = digest.try_into().map_err(|_| bad_length(32))?;
                self.taproot.insert(key, id);
            }
            AddressKind::Evm => {
                let key = digest.try_into().map_err(|_| bad_length(20))?;
                self.evm.insert(key, id);
            }
        }
        Ok(())
    }

    /// Looks up a digest computed for `kind`.
    #[inline]
    pub fn lookup(&self, kind: AddressKind, digest: &[u8]) -> Option<AddressId> {
        match kind {
            AddressKind::Legacy => lookup_in(&self.legacy, digest),
            AddressKind::SegWit => lookup_in(&self.segwit, digest),
            AddressKind::Taproot => lookup_in(&self.taproot, digest),
            AddressKind::Evm => lookup_in(&self.evm, digest),
        }
    }

    /// Returns the id registered for an address string, if any.
    pub fn lookup_address(&self, address: &str) -> Option<AddressId> {
        let decoded = decode_address(address, self.network).ok()?;
        self.lookup(decoded.kind, &decoded.payload)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Number of targets of `kind`.
    pub fn count(&self, kind: AddressKind) -> usize {
        match kind {
            AddressKind::Legacy => self.legacy.len(),
            AddressKind::SegWit => self.segwit.len(),
            AddressKind::Taproot => self.taproot.len(),
            AddressKind::Evm => self.evm.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.legacy.len() + self.segwit.len() + self.taproot.len() + self.evm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[inline]
fn lookup_in<const N: usize>(map: &HashMap<[u8; N], AddressId>, digest: &[u8]) -> Option<AddressId> {
    let key: &[u8; N] = digest.try_into().ok()?;
    map.get(key).copied()
}
