//! The per-worker generation pipeline.

use rand::RngCore;

use crate::crypto::{
    Algorithm, AddressVariant, Keccak256, Network, PublicKeyDerivation, Ripemd160, Sha256,
};
use crate::error::{Result, SearchError};
use crate::keyspace::U256;
use crate::matcher::{AddressId, TargetSet};
use crate::memory::{Cache, RandomBytesPool};

use super::layout::{HashStage, SlotLayout};
use super::sampler::{GenerationMode, Sampler, MAX_DRAW_LEN};

/// A candidate whose digest is in the target set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFound {
    pub candidate_scalar: U256,
    pub address: String,
    pub address_id: AddressId,
}

/// Private key → public key → digest, for one variant.
pub struct DerivationChain {
    variant: AddressVariant,
    layout: SlotLayout,
    derivation: PublicKeyDerivation,
}

impl DerivationChain {
    pub fn new(variant: AddressVariant) -> Self {
        Self {
            variant,
            layout: SlotLayout::for_variant(variant),
            derivation: PublicKeyDerivation::new(variant.point_format()),
        }
    }

    pub fn variant(&self) -> AddressVariant {
        self.variant
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Writes `scalar` into the private key slot and runs the chain. The
    /// digest is left in `layout().digest`.
    #[inline]
    pub fn run(&self, cache: &mut Cache, scalar: &U256) -> Result<()> {
        let layout = &self.layout;
        cache.write(layout.private_key, &scalar.to_be_bytes())?;
        self.derivation
            .execute(cache, layout.private_key, layout.public_key)?;
        match layout.hash {
            HashStage::Hash160 { sha256, ripemd160 } => {
                Sha256.execute(cache, layout.public_key, sha256)?;
                Ripemd160.execute(cache, sha256, ripemd160)
            }
            HashStage::Keccak { output } => Keccak256.execute(cache, layout.public_key, output),
            HashStage::Identity => Ok(()),
        }
    }
}

/// Derives the address of a single private key.
pub fn derive_address(variant: AddressVariant, network: Network, scalar: &U256) -> Result<String> {
    let chain = DerivationChain::new(variant);
    let mut cache = Cache::new(SlotLayout::CAPACITY);
    chain.run(&mut cache, scalar)?;
    variant.encode(network, cache.read(chain.layout().digest)?)
}

/// Settings fixed for the lifetime of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub variant: AddressVariant,
    pub network: Network,
    pub sampler: Sampler,
}

/// Runs candidates through the derivation chain against a target set.
///
/// Borrows the worker's cache and random pool; an iteration only overwrites
/// slot contents and does not allocate unless it produces a match.
pub struct Pipeline<'a, R: RngCore> {
    cache: &'a mut Cache,
    pool: &'a mut RandomBytesPool<R>,
    targets: &'a TargetSet,
    network: Network,
    chain: DerivationChain,
    sampler: Sampler,
    attempts: u64,
}

impl<'a, R: RngCore> Pipeline<'a, R> {
    pub fn new(
        cache: &'a mut Cache,
        pool: &'a mut RandomBytesPool<R>,
        targets: &'a TargetSet,
        config: PipelineConfig,
    ) -> Result<Self> {
        let chain = DerivationChain::new(config.variant);
        let needed = chain.layout().required_capacity();
        if cache.capacity() < needed {
            return Err(SearchError::OutOfBounds {
                start: 0,
                end: needed,
                capacity: cache.capacity(),
            });
        }
        if pool.size() < MAX_DRAW_LEN {
            return Err(SearchError::InvalidLength {
                expected: MAX_DRAW_LEN,
                actual: pool.size(),
            });
        }
        Ok(Self {
            cache,
            pool,
            targets,
            network: config.network,
            chain,
            sampler: config.sampler,
            attempts: 0,
        })
    }

    /// Runs one iteration.
    ///
    /// Returns `Ok(Some(_))` on a match, `Ok(None)` on a miss and
    /// `Err(RangeExhausted)` once a deterministic walk is done. Candidates
    /// that are not valid keys are skipped and another is drawn.
    #[inline]
    pub fn step(&mut self) -> Result<Option<MatchFound>> {
        loop {
            let candidate = self.sampler.next(self.pool)?;
            self.attempts += 1;
            match self.evaluate(&candidate) {
                Err(SearchError::InvalidScalar) => continue,
                other => return other,
            }
        }
    }

    #[inline]
    fn evaluate(&mut self, candidate: &U256) -> Result<Option<MatchFound>> {
        self.chain.run(self.cache, candidate)?;
        let digest = self.cache.read(self.chain.layout().digest)?;
        let variant = self.chain.variant();
        match self.targets.lookup(variant.kind(), digest) {
            None => Ok(None),
            Some(address_id) => Ok(Some(MatchFound {
                candidate_scalar: *candidate,
                address: variant.encode(self.network, digest)?,
                address_id,
            })),
        }
    }

    /// Candidates drawn so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Next key of a deterministic walk.
    pub fn cursor(&self) -> Option<U256> {
        self.sampler.cursor()
    }

    pub fn mode(&self) -> GenerationMode {
        self.sampler.mode()
    }

    pub fn variant(&self) -> AddressVariant {
        self.chain.variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::SearchRange;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded_pool() -> RandomBytesPool<StdRng> {
        RandomBytesPool::with_rng(1024, StdRng::seed_from_u64(99)).unwrap()
    }

    fn config(variant: AddressVariant, mode: GenerationMode, lower: u64, upper: u64) -> PipelineConfig {
        let range = SearchRange::new(U256::from_u64(lower), U256::from_u64(upper)).unwrap();
        PipelineConfig {
            variant,
            network: Network::Mainnet,
            sampler: Sampler::new(mode, range, None).unwrap(),
        }
    }

    #[test]
    fn test_derive_known_addresses() {
        let one = U256::ONE;
        assert_eq!(
            derive_address(AddressVariant::Legacy { compressed: false }, Network::Mainnet, &one).unwrap(),
            "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm"
        );
        assert_eq!(
            derive_address(AddressVariant::Legacy { compressed: true }, Network::Mainnet, &one).unwrap(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
        assert_eq!(
            derive_address(AddressVariant::SegWit, Network::Mainnet, &one).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            derive_address(AddressVariant::Evm, Network::Mainnet, &one)
                .unwrap()
                .to_lowercase(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        let taproot = derive_address(AddressVariant::Taproot, Network::Mainnet, &one).unwrap();
        // BIP-341 key-path output for the generator point.
        assert_eq!(
            taproot,
            "bc1pmfr3p9j00pfxjh0zmgp99y8zftmd3s5pmedqhyptwy6lm87hf5sspknck9"
        );
    }

    #[test]
    fn test_derive_rejects_zero() {
        assert_eq!(
            derive_address(AddressVariant::SegWit, Network::Mainnet, &U256::ZERO).unwrap_err(),
            SearchError::InvalidScalar
        );
    }

    #[test]
    fn test_ascending_finds_target() {
        let variant = AddressVariant::Legacy { compressed: true };
        let target = derive_address(variant, Network::Mainnet, &U256::from_u64(3)).unwrap();
        let mut targets = TargetSet::new(Network::Mainnet);
        targets.insert(77, &target).unwrap();

        let mut cache = Cache::new(SlotLayout::CAPACITY);
        let mut pool = seeded_pool();
        let mut pipeline = Pipeline::new(
            &mut cache,
            &mut pool,
            &targets,
            config(variant, GenerationMode::Ascending, 1, 5),
        )
        .unwrap();

        assert_eq!(pipeline.step().unwrap(), None);
        assert_eq!(pipeline.step().unwrap(), None);
        let found = pipeline.step().unwrap().unwrap();
        assert_eq!(found.candidate_scalar, U256::from_u64(3));
        assert_eq!(found.address, target);
        assert_eq!(found.address_id, 77);
        assert_eq!(pipeline.attempts(), 3);
        assert_eq!(pipeline.cursor(), Some(U256::from_u64(4)));
    }

    #[test]
    fn test_random_finds_target_for_every_variant() {
        for variant in [
            AddressVariant::Legacy { compressed: false },
            AddressVariant::SegWit,
            AddressVariant::Taproot,
            AddressVariant::Evm,
        ] {
            let target = derive_address(variant, Network::Mainnet, &U256::from_u64(3)).unwrap();
            let mut targets = TargetSet::new(Network::Mainnet);
            targets.insert(1, &target).unwrap();

            let mut cache = Cache::new(SlotLayout::CAPACITY);
            let mut pool = seeded_pool();
            let mut pipeline = Pipeline::new(
                &mut cache,
                &mut pool,
                &targets,
                config(variant, GenerationMode::Random, 1, 5),
            )
            .unwrap();

            let found = (0..500)
                .find_map(|_| pipeline.step().unwrap())
                .unwrap_or_else(|| panic!("{variant}: no match"));
            assert_eq!(found.candidate_scalar, U256::from_u64(3), "{variant}");
            assert_eq!(found.address, target, "{variant}");
        }
    }

    #[test]
    fn test_descending_exhausts_without_match() {
        let targets = TargetSet::new(Network::Mainnet);
        let mut cache = Cache::new(SlotLayout::CAPACITY);
        let mut pool = seeded_pool();
        let mut pipeline = Pipeline::new(
            &mut cache,
            &mut pool,
            &targets,
            config(AddressVariant::SegWit, GenerationMode::Descending, 10, 12),
        )
        .unwrap();
        for _ in 0..3 {
            assert_eq!(pipeline.step().unwrap(), None);
        }
        assert_eq!(pipeline.step().unwrap_err(), SearchError::RangeExhausted);
        assert_eq!(pipeline.attempts(), 3);
        assert_eq!(pipeline.cursor(), Some(U256::from_u64(9)));
    }

    #[test]
    fn test_cache_reused_in_place() {
        let targets = TargetSet::new(Network::Mainnet);
        let mut cache = Cache::new(SlotLayout::CAPACITY);
        let mut pool = seeded_pool();
        {
            let mut pipeline = Pipeline::new(
                &mut cache,
                &mut pool,
                &targets,
                config(AddressVariant::Evm, GenerationMode::Ascending, 1, 2),
            )
            .unwrap();
            pipeline.step().unwrap();
            pipeline.step().unwrap();
        }
        let layout = SlotLayout::for_variant(AddressVariant::Evm);
        assert_eq!(
            U256::from_be_slice(cache.read(layout.private_key).unwrap()).unwrap(),
            U256::from_u64(2)
        );
        assert_eq!(cache.capacity(), SlotLayout::CAPACITY);
    }

    #[test]
    fn test_undersized_cache_rejected() {
        let targets = TargetSet::new(Network::Mainnet);
        let mut cache = Cache::new(64);
        let mut pool = seeded_pool();
        let result = Pipeline::new(
            &mut cache,
            &mut pool,
            &targets,
            config(AddressVariant::SegWit, GenerationMode::Ascending, 1, 2),
        );
        assert!(matches!(result, Err(SearchError::OutOfBounds { .. })));
    }
}
