//! Fixed-capacity byte cache addressed through slots.

use std::fmt;
use std::ops::Range;

use rand::RngCore;

use crate::error::{Result, SearchError};

/// A coordinate triple addressing a sub-range of a [`Cache`].
///
/// `end` is always `start + length`; use [`Slot::new`] to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub start: usize,
    pub length: usize,
    pub end: usize,
}

impl Slot {
    /// Creates a slot covering `start..start + length`.
    #[inline]
    pub const fn new(start: usize, length: usize) -> Self {
        Self {
            start,
            length,
            end: start + length,
        }
    }

    /// Returns a slot covering `length` bytes at `offset` inside this slot.
    #[inline]
    pub const fn sub(&self, offset: usize, length: usize) -> Self {
        Self::new(self.start + offset, length)
    }

    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// An owned byte buffer reused across iterations.
///
/// The cache never grows. Every access is bounds-checked against its
/// capacity and fails with [`SearchError::OutOfBounds`] instead of panicking.
#[derive(Clone, PartialEq, Eq)]
pub struct Cache {
    bytes: Box<[u8]>,
    origin: usize,
}

impl Cache {
    /// Allocates a zeroed cache of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::with_origin(size, 0)
    }

    /// Allocates a zeroed cache whose first byte sits at `origin` in a
    /// larger address space. The origin only shifts indices reported by
    /// [`Cache::indexed`].
    pub fn with_origin(size: usize, origin: usize) -> Self {
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
            origin,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Returns a slot covering the whole cache.
    #[inline]
    pub fn full(&self) -> Slot {
        Slot::new(0, self.capacity())
    }

    #[inline]
    fn check(&self, slot: Slot) -> Result<()> {
        if slot.end != slot.start + slot.length || slot.end > self.capacity() {
            return Err(SearchError::OutOfBounds {
                start: slot.start,
                end: slot.end,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Returns the bytes addressed by `slot`.
    #[inline]
    pub fn read(&self, slot: Slot) -> Result<&[u8]> {
        self.check(slot)?;
        Ok(&self.bytes[slot.range()])
    }

    /// Returns the bytes addressed by `slot` for in-place mutation.
    #[inline]
    pub fn read_mut(&mut self, slot: Slot) -> Result<&mut [u8]> {
        self.check(slot)?;
        Ok(&mut self.bytes[slot.range()])
    }

    /// Copies `bytes` into `slot`. The lengths must match exactly.
    #[inline]
    pub fn write(&mut self, slot: Slot, bytes: &[u8]) -> Result<()> {
        self.check(slot)?;
        if bytes.len() != slot.length {
            return Err(SearchError::InvalidLength {
                expected: slot.length,
                actual: bytes.len(),
            });
        }
        self.bytes[slot.range()].copy_from_slice(bytes);
        Ok(())
    }

    /// Sets every byte of `slot` to `byte`.
    pub fn fill(&mut self, slot: Slot, byte: u8) -> Result<()> {
        self.read_mut(slot)?.fill(byte);
        Ok(())
    }

    /// Overwrites `slot` with bytes drawn from `rng`.
    pub fn fill_random<R: RngCore + ?Sized>(&mut self, slot: Slot, rng: &mut R) -> Result<()> {
        rng.fill_bytes(self.read_mut(slot)?);
        Ok(())
    }

    /// Compares `slot_a` of this cache with `slot_b` of `other`.
    ///
    /// Slots of different lengths never compare equal.
    pub fn equals(&self, other: &Cache, slot_a: Slot, slot_b: Slot) -> Result<bool> {
        let a = self.read(slot_a)?;
        let b = other.read(slot_b)?;
        Ok(a == b)
    }

    /// Returns true iff every byte in `slot` is zero.
    pub fn is_empty(&self, slot: Slot) -> Result<bool> {
        Ok(self.read(slot)?.iter().all(|&b| b == 0))
    }

    /// Returns the slot contents as uppercase hex.
    pub fn to_hex(&self, slot: Slot) -> Result<String> {
        Ok(hex::encode_upper(self.read(slot)?))
    }

    /// Decodes `hex` (either case) into `slot`.
    pub fn from_hex(&mut self, hex: &str, slot: Slot) -> Result<()> {
        if hex.len() != slot.length * 2 {
            self.check(slot)?;
            return Err(SearchError::InvalidLength {
                expected: slot.length * 2,
                actual: hex.len(),
            });
        }
        hex::decode_to_slice(hex, self.read_mut(slot)?)?;
        Ok(())
    }

    /// Iterates the byte values of `slot` in ascending offset order.
    ///
    /// The iterator is `Clone`, so a sequence can be replayed from the start.
    pub fn bytes(&self, slot: Slot) -> Result<impl Iterator<Item = u8> + Clone + '_> {
        Ok(self.read(slot)?.iter().copied())
    }

    /// Iterates `(index, value)` pairs of `slot`, indices offset by the origin.
    pub fn indexed(&self, slot: Slot) -> Result<impl Iterator<Item = (usize, u8)> + Clone + '_> {
        let base = self.origin + slot.start;
        Ok(self
            .read(slot)?
            .iter()
            .enumerate()
            .map(move |(i, &b)| (base + i, b)))
    }
}

impl<'a> IntoIterator for &'a Cache {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.bytes.iter().copied()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity())
            .field("origin", &self.origin)
            .finish()
    }
}
