//! Allocation-free working memory for the search loop.
//!
//! - `Cache`: fixed-capacity buffer addressed through `Slot`s
//! - `RandomBytesPool`: bulk random bytes served in fixed-length slices

mod cache;
mod pool;

pub use cache::{Cache, Slot};
pub use pool::RandomBytesPool;
