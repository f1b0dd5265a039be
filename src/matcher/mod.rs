//! Target matching for derived digests.
//!
//! Targets are decoded once into raw digests so the search loop compares
//! bytes, not address strings.

mod targets;

pub use targets::{AddressId, TargetSet};
