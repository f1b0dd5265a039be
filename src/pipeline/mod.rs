//! Candidate generation: sample, derive, hash, match.
//!
//! - `sampler`: random, ascending and descending candidate sources
//! - `layout`: cache slot layout per address variant
//! - `generator`: the per-worker pipeline built from the two

mod generator;
mod layout;
mod sampler;

pub use generator::{derive_address, DerivationChain, MatchFound, Pipeline, PipelineConfig};
pub use layout::{HashStage, SlotLayout};
pub use sampler::{GenerationMode, Sampler, MAX_DRAW_LEN};
