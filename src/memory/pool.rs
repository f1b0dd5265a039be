//! Bulk random byte source.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{Result, SearchError};

use super::{Cache, Slot};

/// Serves fixed-length random slices out of a pre-filled buffer.
///
/// The buffer is regenerated in one pass when a request would overrun it,
/// so the random source is touched once per `size` bytes instead of once per
/// call. A read never spans two fills.
pub struct RandomBytesPool<R = StdRng> {
    cache: Cache,
    position: usize,
    rng: R,
    refills: u64,
}

impl RandomBytesPool<StdRng> {
    /// Creates a pool of `size` bytes backed by an OS-seeded CSPRNG.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_rng(size, StdRng::from_entropy())
    }

    /// Creates a pool that is guaranteed to serve reads of up to `max_read` bytes.
    pub fn for_reads(size: usize, max_read: usize) -> Result<Self> {
        Self::for_reads_with_rng(size, max_read, StdRng::from_entropy())
    }
}

impl<R: RngCore> RandomBytesPool<R> {
    /// Creates a pool of `size` bytes drawing from `rng`. The buffer is filled
    /// immediately.
    pub fn with_rng(size: usize, rng: R) -> Result<Self> {
        if size == 0 {
            return Err(SearchError::InvalidLength {
                expected: 1,
                actual: 0,
            });
        }
        let mut pool = Self {
            cache: Cache::new(size),
            position: 0,
            rng,
            refills: 0,
        };
        pool.fill()?;
        Ok(pool)
    }

    /// Like [`RandomBytesPool::for_reads`], drawing from `rng`.
    pub fn for_reads_with_rng(size: usize, max_read: usize, rng: R) -> Result<Self> {
        if max_read > size {
            return Err(SearchError::InvalidLength {
                expected: max_read,
                actual: size,
            });
        }
        Self::with_rng(size, rng)
    }

    fn fill(&mut self) -> Result<()> {
        let full = self.cache.full();
        self.cache.fill_random(full, &mut self.rng)?;
        self.position = 0;
        Ok(())
    }

    /// Reserves `length` fresh bytes and returns the slot holding them.
    pub fn read(&mut self, length: usize) -> Result<Slot> {
        if length > self.size() {
            return Err(SearchError::InvalidLength {
                expected: self.size(),
                actual: length,
            });
        }
        if self.position + length > self.size() {
            self.fill()?;
            self.refills += 1;
        }
        let slot = Slot::new(self.position, length);
        self.position += length;
        Ok(slot)
    }

    /// Reserves `length` fresh bytes and returns them.
    #[inline]
    pub fn bytes(&mut self, length: usize) -> Result<&[u8]> {
        let slot = self.read(length)?;
        self.cache.read(slot)
    }

    /// Returns the underlying buffer. Slots returned by [`read`](Self::read)
    /// stay valid until the next read.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.cache.capacity()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.size() - self.position
    }

    /// Number of regenerations since construction. The initial fill is not
    /// counted.
    pub fn refills(&self) -> u64 {
        self.refills
    }
}
