//! Candidate sampling within a search range.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::keyspace::{SearchRange, U256};
use crate::memory::RandomBytesPool;

/// Largest pool read a single random draw makes.
pub const MAX_DRAW_LEN: usize = 32;

/// How candidates are drawn from the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationMode {
    /// Uniformly random keys inside the range.
    #[default]
    Random,
    /// Every key from the lower bound upward.
    Ascending,
    /// Every key from the upper bound downward.
    Descending,
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "rand" => Ok(GenerationMode::Random),
            "ascending" | "asc" | "up" => Ok(GenerationMode::Ascending),
            "descending" | "desc" | "down" => Ok(GenerationMode::Descending),
            _ => Err(format!("Unknown generation mode: {}", s)),
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Random => write!(f, "random"),
            GenerationMode::Ascending => write!(f, "ascending"),
            GenerationMode::Descending => write!(f, "descending"),
        }
    }
}

/// Produces one candidate per call.
///
/// Random mode uses rejection sampling: `width + 1` keys are covered by
/// drawing `bits(width)` random bits and discarding draws above `width`, so
/// every key is equally likely and at least half of all draws are accepted.
#[derive(Debug, Clone)]
pub enum Sampler {
    Random {
        lower: U256,
        width: U256,
        draw_len: usize,
        top_mask: u8,
    },
    Ascending {
        next: U256,
        upper: U256,
    },
    Descending {
        next: U256,
        lower: U256,
    },
}

impl Sampler {
    /// Builds a sampler. `resume` restarts a deterministic walk at a
    /// previously persisted cursor and is ignored in random mode.
    pub fn new(mode: GenerationMode, range: SearchRange, resume: Option<U256>) -> Result<Self> {
        match mode {
            GenerationMode::Random => {
                let width = range.width();
                let bits = width.bits() as usize;
                let top_bits = bits % 8;
                Ok(Sampler::Random {
                    lower: range.lower(),
                    width,
                    draw_len: (bits + 7) / 8,
                    top_mask: if top_bits == 0 {
                        0xFF
                    } else {
                        (1u8 << top_bits) - 1
                    },
                })
            }
            GenerationMode::Ascending => {
                let next = resume.unwrap_or(range.lower());
                let past_end = range.upper().checked_increment();
                if next < range.lower() || Some(next) > past_end {
                    return Err(cursor_outside(next, &range));
                }
                Ok(Sampler::Ascending {
                    next,
                    upper: range.upper(),
                })
            }
            GenerationMode::Descending => {
                let next = resume.unwrap_or(range.upper());
                let past_end = range.lower().checked_decrement().unwrap_or(U256::ZERO);
                if next > range.upper() || next < past_end {
                    return Err(cursor_outside(next, &range));
                }
                Ok(Sampler::Descending {
                    next,
                    lower: range.lower(),
                })
            }
        }
    }

    pub fn mode(&self) -> GenerationMode {
        match self {
            Sampler::Random { .. } => GenerationMode::Random,
            Sampler::Ascending { .. } => GenerationMode::Ascending,
            Sampler::Descending { .. } => GenerationMode::Descending,
        }
    }

    /// The next key a deterministic walk will try. `None` in random mode.
    pub fn cursor(&self) -> Option<U256> {
        match self {
            Sampler::Random { .. } => None,
            Sampler::Ascending { next, .. } | Sampler::Descending { next, .. } => Some(*next),
        }
    }

    /// Returns the next candidate, or `RangeExhausted` once a deterministic
    /// walk has passed the end of its range.
    #[inline]
    pub fn next<R: RngCore>(&mut self, pool: &mut RandomBytesPool<R>) -> Result<U256> {
        match self {
            Sampler::Random {
                lower,
                width,
                draw_len,
                top_mask,
            } => {
                let offset = draw_offset(pool, width, *draw_len, *top_mask)?;
                lower
                    .checked_add(&offset)
                    .ok_or_else(|| SearchError::MalformedRange("random offset overflow".into()))
            }
            Sampler::Ascending { next, upper } => {
                if *next > *upper {
                    return Err(SearchError::RangeExhausted);
                }
                let candidate = *next;
                *next = candidate
                    .checked_increment()
                    .ok_or_else(|| SearchError::MalformedRange("cursor overflow".into()))?;
                Ok(candidate)
            }
            Sampler::Descending { next, lower } => {
                if *next < *lower {
                    return Err(SearchError::RangeExhausted);
                }
                let candidate = *next;
                *next = candidate
                    .checked_decrement()
                    .ok_or_else(|| SearchError::MalformedRange("cursor underflow".into()))?;
                Ok(candidate)
            }
        }
    }
}

fn draw_offset<R: RngCore>(
    pool: &mut RandomBytesPool<R>,
    width: &U256,
    draw_len: usize,
    top_mask: u8,
) -> Result<U256> {
    if draw_len == 0 {
        return Ok(U256::ZERO);
    }
    loop {
        let mut raw = [0u8; 32];
        let first = 32 - draw_len;
        raw[first..].copy_from_slice(pool.bytes(draw_len)?);
        raw[first] &= top_mask;
        let offset = U256::from_be_bytes(raw);
        if offset <= *width {
            return Ok(offset);
        }
    }
}

fn cursor_outside(cursor: U256, range: &SearchRange) -> SearchError {
    SearchError::MalformedRange(format!(
        "cursor {cursor} lies outside {}..={}",
        range.lower(),
        range.upper()
    ))
}
