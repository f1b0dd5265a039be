//! Search jobs and the store that hands them out.

mod record;
mod store;

pub use record::{
    FailureKind, InvalidTransition, Job, JobFailure, JobId, JobMatch, JobOutcome, JobStatus,
    Transition,
};
pub use store::{ClaimOutcome, InMemoryJobStore, JobStore, ProgressAck, StoreError, StoreResult};
