//! Worker pool management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use log::error;

use crate::job::JobStore;
use crate::matcher::TargetSet;

use super::cpu::{CpuWorker, WorkerContext, WorkerError, WorkerEvent, WorkerSettings, WorkerStats};
use super::refresh::{AddressRefresher, RefreshHandle};

/// Capacity of the event channel. Events past it are dropped.
const EVENT_CAPACITY: usize = 1024;

/// Fixed-rate deadline for progress reports, independent of how many events
/// arrive in between.
#[derive(Debug, Clone, Copy)]
pub struct ReportTimer {
    interval: Duration,
    next: Instant,
}

impl ReportTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now + interval,
        }
    }

    /// Time left until the next report is due.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Returns true once per elapsed interval and arms the next deadline.
    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}

/// A fixed set of CPU workers sharing one job store and target set.
pub struct WorkerPool {
    /// Number of workers
    num_workers: usize,
    /// Worker thread handles (Option to allow taking during join)
    handles: Option<Vec<JoinHandle<()>>>,
    /// Channel receiver for worker events
    event_rx: Receiver<WorkerEvent>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
    /// Shared statistics
    stats: Arc<WorkerStats>,
    /// Start time
    start_time: Instant,
    /// Address-data refresh task, if one was attached
    refresh: Option<RefreshHandle>,
}

impl WorkerPool {
    /// Creates the workers and starts their threads.
    pub fn new(
        num_workers: usize,
        store: Arc<dyn JobStore>,
        targets: Arc<TargetSet>,
        settings: WorkerSettings,
    ) -> Result<Self, WorkerError> {
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(WorkerStats::new());
        let ctx = WorkerContext {
            store,
            targets,
            events: event_tx,
            stop_flag: stop_flag.clone(),
            stats: stats.clone(),
        };

        // Build every worker first so a bad setting spawns nothing.
        let workers = (0..num_workers)
            .map(|id| CpuWorker::new(id, ctx.clone(), settings.clone()))
            .collect::<crate::error::Result<Vec<_>>>()?;
        drop(ctx);

        let mut handles = Vec::with_capacity(num_workers);
        for mut worker in workers {
            let spawned = thread::Builder::new()
                .name(format!("search-worker-{}", worker.id()))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    stop_flag.store(true, Ordering::Relaxed);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(Self {
            num_workers,
            handles: Some(handles),
            event_rx,
            stop_flag,
            stats,
            start_time: Instant::now(),
            refresh: None,
        })
    }

    /// Attaches an address-data refresh task that lives as long as the pool.
    pub fn with_refresh(mut self, refresher: AddressRefresher) -> Result<Self, WorkerError> {
        self.refresh = Some(refresher.spawn()?);
        Ok(self)
    }

    /// Waits for an event with a timeout.
    pub fn wait_for_event(&self, timeout: Duration) -> Option<WorkerEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Attempts to receive an event without blocking.
    pub fn try_recv(&self) -> Option<WorkerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Signals all workers to stop. Running jobs end as `Stopped` after the
    /// current iteration.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Stops and waits for all workers and the refresh task.
    pub fn join(mut self) {
        self.stop();
        self.join_all();
    }

    /// Returns true once every worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handles
            .as_ref()
            .map_or(true, |handles| handles.iter().all(JoinHandle::is_finished))
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns the candidates evaluated across all workers.
    pub fn total_attempts(&self) -> u64 {
        self.stats.total_attempts()
    }

    /// Returns the total matches found.
    pub fn total_matches(&self) -> u64 {
        self.stats.total_matches()
    }

    /// Returns the number of jobs driven to a terminal status.
    pub fn jobs_finished(&self) -> u64 {
        self.stats.total_jobs_finished()
    }

    /// Returns the elapsed time since the pool was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the current search rate (candidates per second).
    pub fn attempts_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_attempts() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a clone of the stop flag for external use (e.g., signal handlers).
    pub fn stop_flag_clone(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Returns true if the pool has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn join_all(&mut self) {
        if let Some(handles) = self.handles.take() {
            for handle in handles {
                if handle.join().is_err() {
                    error!("search worker panicked");
                }
            }
        }
        if let Some(refresh) = self.refresh.take() {
            refresh.stop();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
        // Wait for workers to finish if they haven't been joined
        self.join_all();
    }
}
