//! # keyspace_hunter
//!
//! Parallel keyspace search engine for Bitcoin and Ethereum addresses.
//!
//! ## Architecture
//!
//! - `memory`: Fixed-capacity byte cache and random bytes pool
//! - `keyspace`: 256-bit scalars and search ranges
//! - `crypto`: Hash, curve and address encoding modules
//! - `matcher`: Target digests to match against
//! - `pipeline`: Sample, derive, hash and match one candidate at a time
//! - `job`: Search jobs, their status machine and store
//! - `worker`: Parallel execution, worker pool and address-data refresh
//! - `config`: Runtime configuration

pub mod config;
pub mod crypto;
pub mod error;
pub mod job;
pub mod keyspace;
pub mod matcher;
pub mod memory;
pub mod pipeline;
pub mod worker;

pub use config::{Config, ConfigError};
pub use crypto::{AddressKind, AddressVariant, Network};
pub use error::{Result, SearchError};
pub use job::{InMemoryJobStore, Job, JobOutcome, JobStatus, JobStore};
pub use keyspace::{SearchRange, U256};
pub use matcher::{AddressId, TargetSet};
pub use memory::{Cache, RandomBytesPool, Slot};
pub use pipeline::{derive_address, GenerationMode, MatchFound, Pipeline, PipelineConfig};
pub use worker::{WorkerEvent, WorkerPool, WorkerSettings};
