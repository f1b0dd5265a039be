//! Worker pool for parallel keyspace search.
//!
//! This module provides:
//! - CPU workers that claim jobs and drive them to a terminal status
//! - A pool owning the worker threads, stop flag and statistics
//! - Backoff for transient job store failures
//! - The recurring address-data refresh task

mod cpu;
mod pool;
mod refresh;
mod retry;

pub use cpu::{CpuWorker, WorkerContext, WorkerError, WorkerEvent, WorkerSettings, WorkerStats};
pub use pool::{ReportTimer, WorkerPool};
pub use refresh::{
    AddressBook, AddressData, AddressDataProvider, AddressRefresher, AddressUpdate, RefreshError,
    RefreshHandle, RefreshReport, RefreshSchedule, TrackedAddress,
};
pub use retry::RetryPolicy;
