//! Job persistence seam and an in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use super::record::{InvalidTransition, Job, JobId, JobOutcome, JobStatus, Transition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("job {id} is {status}, not running")]
    NotRunning { id: JobId, status: JobStatus },

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of trying to claim a pending job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The job is now `Running` and owned by the caller.
    Claimed(Job),
    /// Another worker got there first, or the job is no longer pending.
    AlreadyClaimed,
}

/// Reply to a progress flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressAck {
    /// The job was cancelled externally; the worker should stop it.
    pub cancelled: bool,
}

/// Where jobs live.
///
/// Claims are compare-and-set, and all writes are idempotent so a worker can
/// retry them after a transient failure.
pub trait JobStore: Send + Sync {
    /// Ids of jobs currently `Pending`, oldest first.
    fn pending_ids(&self) -> StoreResult<Vec<JobId>>;

    /// Atomically moves `id` from `Pending` to `Running`.
    fn try_claim(&self, id: JobId) -> StoreResult<ClaimOutcome>;

    /// Records attempts and cursor of a running job. Attempts never go
    /// backwards.
    fn update_job_progress(
        &self,
        id: JobId,
        attempts: u64,
        cursor: Option<&str>,
    ) -> StoreResult<ProgressAck>;

    /// Moves a job to its terminal status.
    fn complete_job(&self, id: JobId, attempts: u64, outcome: JobOutcome) -> StoreResult<Transition>;

    /// Flag raised when the running job `id` is cancelled. Stores without
    /// push notification return `None`; their cancellations surface through
    /// the next [`ProgressAck`].
    fn cancellation_token(&self, _id: JobId) -> Option<Arc<AtomicBool>> {
        None
    }

    /// Claims the first pending job nobody else takes first.
    fn claim_next_pending(&self) -> StoreResult<Option<Job>> {
        for id in self.pending_ids()? {
            match self.try_claim(id) {
                Ok(ClaimOutcome::Claimed(job)) => return Ok(Some(job)),
                Ok(ClaimOutcome::AlreadyClaimed) | Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: BTreeMap<JobId, Job>,
    /// One flag per running job, created on claim.
    tokens: HashMap<JobId, Arc<AtomicBool>>,
}

/// `JobStore` backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: Mutex<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let store = Self::new();
        for job in jobs {
            store.insert(job);
        }
        store
    }

    /// Adds or replaces a job.
    pub fn insert(&self, job: Job) {
        self.lock().jobs.insert(job.id, job);
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Snapshot of every job, ordered by id.
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    /// Requests cancellation. A pending job stops immediately; a running one
    /// has its cancellation token raised. Returns false for unknown or
    /// finished jobs.
    pub fn cancel(&self, id: JobId) -> bool {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get_mut(&id) else {
            return false;
        };
        match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Stopped;
                job.version += 1;
                true
            }
            JobStatus::Running => {
                inner.tokens.entry(id).or_default().store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// True once every job has reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.lock().jobs.values().all(Job::is_terminal)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked writer leaves the map consistent; every mutation is a
        // single assignment.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobStore for InMemoryJobStore {
    fn pending_ids(&self) -> StoreResult<Vec<JobId>> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .map(|job| job.id)
            .collect())
    }

    fn try_claim(&self, id: JobId) -> StoreResult<ClaimOutcome> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if job.status != JobStatus::Pending {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        job.transition(JobStatus::Running)?;
        job.version += 1;
        let claimed = job.clone();
        inner.tokens.insert(id, Arc::default());
        Ok(ClaimOutcome::Claimed(claimed))
    }

    fn update_job_progress(
        &self,
        id: JobId,
        attempts: u64,
        cursor: Option<&str>,
    ) -> StoreResult<ProgressAck> {
        let mut inner = self.lock();
        let cancelled = inner
            .tokens
            .get(&id)
            .is_some_and(|token| token.load(Ordering::Relaxed));
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        match job.status {
            JobStatus::Running => {}
            JobStatus::Stopped => return Ok(ProgressAck { cancelled: true }),
            status => return Err(StoreError::NotRunning { id, status }),
        }
        job.attempts = job.attempts.max(attempts);
        if let Some(cursor) = cursor {
            job.cursor = Some(cursor.to_string());
        }
        job.version += 1;
        Ok(ProgressAck { cancelled })
    }

    fn complete_job(&self, id: JobId, attempts: u64, outcome: JobOutcome) -> StoreResult<Transition> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if job.transition(outcome.status())? == Transition::Unchanged {
            return Ok(Transition::Unchanged);
        }
        job.attempts = job.attempts.max(attempts);
        match outcome {
            JobOutcome::Succeeded(found) => job.result = Some(found),
            JobOutcome::Failed(failure) => {
                if failure.cursor.is_some() {
                    job.cursor = failure.cursor.clone();
                }
                job.error = Some(failure);
            }
            JobOutcome::Stopped => {}
        }
        job.version += 1;
        inner.tokens.remove(&id);
        Ok(Transition::Applied)
    }

    fn cancellation_token(&self, id: JobId) -> Option<Arc<AtomicBool>> {
        let mut inner = self.lock();
        if inner.jobs.get(&id)?.status != JobStatus::Running {
            return None;
        }
        Some(Arc::clone(inner.tokens.entry(id).or_default()))
    }
}
