//! CPU worker that claims jobs and runs them through a pipeline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::RngCore;
use thiserror::Error;

use crate::error::{Result, SearchError};
use crate::job::{
    FailureKind, Job, JobId, JobMatch, JobOutcome, JobStatus, JobStore, StoreError,
};
use crate::matcher::TargetSet;
use crate::memory::{Cache, RandomBytesPool};
use crate::pipeline::{MatchFound, Pipeline, PipelineConfig, Sampler, SlotLayout, MAX_DRAW_LEN};

use super::retry::RetryPolicy;

/// Statistics shared by all workers of a pool.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Candidates evaluated
    pub attempts: AtomicU64,
    /// Matches found
    pub matches: AtomicU64,
    /// Jobs driven to a terminal status
    pub jobs_finished: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn total_matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn total_jobs_finished(&self) -> u64 {
        self.jobs_finished.load(Ordering::Relaxed)
    }
}

/// Notifications sent to the pool owner. Delivery is best-effort; the job
/// store stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Claimed {
        worker_id: usize,
        job_id: JobId,
    },
    Progress {
        worker_id: usize,
        job_id: JobId,
        attempts: u64,
    },
    Finished {
        worker_id: usize,
        job_id: JobId,
        outcome: JobOutcome,
    },
}

/// Tunables of a worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Size of the random bytes pool.
    pub pool_size: usize,
    /// Flush progress after this many candidates...
    pub flush_every: u64,
    /// ...or after this much time, whichever comes first.
    pub flush_interval: Duration,
    /// Sleep between scans when no job is pending.
    pub idle_poll: Duration,
    /// Exit instead of polling once no job is pending.
    pub exit_when_idle: bool,
    pub retry: RetryPolicy,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            pool_size: 4096,
            flush_every: 10_000,
            flush_interval: Duration::from_secs(1),
            idle_poll: Duration::from_millis(200),
            exit_when_idle: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Handles shared between a worker and its pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn JobStore>,
    pub targets: Arc<TargetSet>,
    pub events: Sender<WorkerEvent>,
    pub stop_flag: Arc<AtomicBool>,
    pub stats: Arc<WorkerStats>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl WorkerError {
    /// Errors after which the worker must not claim more jobs.
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::Search(e) => e.is_fatal(),
            WorkerError::Store(_) => false,
            WorkerError::Spawn(_) => true,
        }
    }
}

/// Why the search loop ended.
enum Halt {
    Matched(MatchFound),
    Exhausted,
    Cancelled,
    Error(SearchError),
}

/// What `search` hands back to `run_job`.
struct Finish {
    outcome: JobOutcome,
    attempts: u64,
    fatal: Option<SearchError>,
}

/// A terminal status the store has not accepted yet. The job stays
/// `Running` in the store until this is written.
#[derive(Debug, Clone)]
struct Completion {
    job_id: JobId,
    attempts: u64,
    outcome: JobOutcome,
}

/// A CPU worker. Owns its cache and random pool; nothing in the hot loop is
/// shared with other workers.
pub struct CpuWorker<R: RngCore = StdRng> {
    id: usize,
    ctx: WorkerContext,
    settings: WorkerSettings,
    cache: Cache,
    pool: RandomBytesPool<R>,
    unsettled: Vec<Completion>,
}

impl CpuWorker<StdRng> {
    pub fn new(id: usize, ctx: WorkerContext, settings: WorkerSettings) -> Result<Self> {
        let pool = RandomBytesPool::for_reads(settings.pool_size, MAX_DRAW_LEN)?;
        Ok(Self::with_pool(id, ctx, settings, pool))
    }
}

impl<R: RngCore> CpuWorker<R> {
    pub fn with_rng(id: usize, ctx: WorkerContext, settings: WorkerSettings, rng: R) -> Result<Self> {
        let pool = RandomBytesPool::for_reads_with_rng(settings.pool_size, MAX_DRAW_LEN, rng)?;
        Ok(Self::with_pool(id, ctx, settings, pool))
    }

    fn with_pool(id: usize, ctx: WorkerContext, settings: WorkerSettings, pool: RandomBytesPool<R>) -> Self {
        Self {
            id,
            ctx,
            settings,
            cache: Cache::new(SlotLayout::CAPACITY),
            pool,
            unsettled: Vec::new(),
        }
    }

    /// Returns the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Claims and runs jobs until the stop flag is set, a fatal error
    /// occurs, or (with `exit_when_idle`) no job is pending.
    pub fn run(&mut self) {
        debug!("worker {} started", self.id);
        while !self.stopped() {
            self.settle();
            let claimed = self
                .settings
                .retry
                .run("claim", || self.ctx.store.claim_next_pending());
            match claimed {
                Ok(Some(job)) => {
                    if let Err(e) = self.run_job(job) {
                        error!("worker {}: {}", self.id, e);
                        if e.is_fatal() {
                            break;
                        }
                    }
                }
                Ok(None) if self.settings.exit_when_idle => break,
                Ok(None) => thread::sleep(self.settings.idle_poll),
                Err(e) => {
                    error!("worker {}: claiming failed: {}", self.id, e);
                    thread::sleep(self.settings.idle_poll);
                }
            }
        }
        self.settle();
        for completion in &self.unsettled {
            error!(
                "worker {}: job {} left RUNNING, store did not accept {}",
                self.id,
                completion.job_id,
                completion.outcome.status()
            );
        }
        debug!("worker {} exiting", self.id);
    }

    /// Number of finished jobs whose terminal status is still unwritten.
    pub fn unsettled(&self) -> usize {
        self.unsettled.len()
    }

    /// Runs a job this worker has claimed and reports its terminal status
    /// to the store.
    pub fn run_job(&mut self, job: Job) -> std::result::Result<JobStatus, WorkerError> {
        info!(
            "worker {} claimed job {} ({} {} {}..={})",
            self.id, job.id, job.variant, job.mode, job.lower_bound, job.upper_bound
        );
        self.emit(WorkerEvent::Claimed {
            worker_id: self.id,
            job_id: job.id,
        });

        let finish = self.search(&job);
        let status = finish.outcome.status();
        match &finish.outcome {
            JobOutcome::Succeeded(found) => info!(
                "worker {}: job {} matched address {} (id {}) after {} attempts",
                self.id, job.id, found.address, found.address_id, finish.attempts
            ),
            JobOutcome::Failed(failure) => warn!(
                "worker {}: job {} failed after {} attempts: {}",
                self.id, job.id, finish.attempts, failure.cause
            ),
            JobOutcome::Stopped => info!(
                "worker {}: job {} stopped after {} attempts",
                self.id, job.id, finish.attempts
            ),
        }

        let completed = self.complete(Completion {
            job_id: job.id,
            attempts: finish.attempts,
            outcome: finish.outcome,
        });
        match (finish.fatal, completed) {
            (Some(e), _) => Err(e.into()),
            (None, Err(e)) => Err(e.into()),
            (None, Ok(())) => Ok(status),
        }
    }

    /// Writes a terminal status. If the store is still unavailable after the
    /// retry policy gives up, the completion is kept for [`Self::settle`].
    fn complete(&mut self, completion: Completion) -> std::result::Result<(), StoreError> {
        let written = self.settings.retry.run("complete", || {
            self.ctx.store.complete_job(
                completion.job_id,
                completion.attempts,
                completion.outcome.clone(),
            )
        });
        match written {
            Ok(_) => {
                self.ctx.stats.jobs_finished.fetch_add(1, Ordering::Relaxed);
                self.emit(WorkerEvent::Finished {
                    worker_id: self.id,
                    job_id: completion.job_id,
                    outcome: completion.outcome,
                });
                Ok(())
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        "worker {}: job {} completion deferred: {}",
                        self.id, completion.job_id, e
                    );
                    self.unsettled.push(completion);
                }
                Err(e)
            }
        }
    }

    /// Retries completions the store rejected earlier.
    fn settle(&mut self) {
        for completion in std::mem::take(&mut self.unsettled) {
            let job_id = completion.job_id;
            if self.complete(completion).is_ok() {
                info!("worker {}: job {} completion written", self.id, job_id);
            }
        }
    }

    fn search(&mut self, job: &Job) -> Finish {
        let Self {
            id,
            ctx,
            settings,
            cache,
            pool,
            ..
        } = self;
        let base = job.attempts;

        let sampler = job
            .range()
            .and_then(|range| Sampler::new(job.mode, range, job.resume_cursor()?));
        let sampler = match sampler {
            Ok(sampler) => sampler,
            Err(e) => return Finish::failed(job, FailureKind::MalformedRange, e, base, job.cursor.clone()),
        };
        let config = PipelineConfig {
            variant: job.variant,
            network: ctx.targets.network(),
            sampler,
        };
        let mut pipeline = match Pipeline::new(cache, pool, &ctx.targets, config) {
            Ok(pipeline) => pipeline,
            Err(e) => return Finish::failed(job, FailureKind::Internal, e, base, job.cursor.clone()),
        };

        let cancel = ctx.store.cancellation_token(job.id);
        let mut reported = 0u64;
        let mut last_flush = Instant::now();
        let halt = loop {
            if ctx.stop_flag.load(Ordering::Relaxed)
                || cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
            {
                break Halt::Cancelled;
            }
            match pipeline.step() {
                Ok(None) => {}
                Ok(Some(found)) => break Halt::Matched(found),
                Err(SearchError::RangeExhausted) => break Halt::Exhausted,
                Err(e) => break Halt::Error(e),
            }

            let pending = pipeline.attempts() - reported;
            if pending >= settings.flush_every || last_flush.elapsed() >= settings.flush_interval {
                ctx.stats.attempts.fetch_add(pending, Ordering::Relaxed);
                reported = pipeline.attempts();
                last_flush = Instant::now();

                let attempts = base + reported;
                let cursor = pipeline.cursor().map(|c| c.to_hex());
                let ack = settings.retry.run("progress", || {
                    ctx.store
                        .update_job_progress(job.id, attempts, cursor.as_deref())
                });
                let _ = ctx.events.try_send(WorkerEvent::Progress {
                    worker_id: *id,
                    job_id: job.id,
                    attempts,
                });
                match ack {
                    Ok(ack) if ack.cancelled => break Halt::Cancelled,
                    Ok(_) => {}
                    Err(e) => warn!("worker {}: progress for job {} not saved: {}", id, job.id, e),
                }
            }
        };

        ctx.stats
            .attempts
            .fetch_add(pipeline.attempts() - reported, Ordering::Relaxed);
        let attempts = base + pipeline.attempts();
        let cursor = pipeline.cursor().map(|c| c.to_hex());

        match halt {
            Halt::Matched(found) => {
                ctx.stats.matches.fetch_add(1, Ordering::Relaxed);
                Finish {
                    outcome: JobOutcome::Succeeded(JobMatch::from(found)),
                    attempts,
                    fatal: None,
                }
            }
            Halt::Exhausted => {
                Finish::failed(job, FailureKind::RangeExhausted, SearchError::RangeExhausted, attempts, cursor)
            }
            Halt::Cancelled => Finish {
                outcome: JobOutcome::Stopped,
                attempts,
                fatal: None,
            },
            Halt::Error(e) => Finish::failed(job, FailureKind::Internal, e, attempts, cursor),
        }
    }

    fn stopped(&self) -> bool {
        self.ctx.stop_flag.load(Ordering::Relaxed)
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.ctx.events.try_send(event);
    }
}

impl Finish {
    fn failed(job: &Job, kind: FailureKind, error: SearchError, attempts: u64, cursor: Option<String>) -> Self {
        let outcome = JobOutcome::Failed(job.failure(kind, error.to_string(), attempts, cursor));
        Self {
            outcome,
            attempts,
            fatal: error.is_fatal().then_some(error),
        }
    }
}
