//! Recurring address-data refresh.
//!
//! Runs on its own thread and timers. It shares no cache, pool or job with
//! the search workers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{after, bounded, select, tick, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::AddressId;

/// When the refresh task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    /// Wait before the first cycle.
    pub initial_delay: Duration,
    /// Wait between cycles.
    pub interval: Duration,
    /// An address is skipped if it was refreshed more recently than this.
    pub min_refresh_interval: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(10 * 60),
            min_refresh_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// An address the book wants kept up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAddress {
    pub address_id: AddressId,
    pub address: String,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// What a provider knows about an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressData {
    pub balance: u128,
    pub tx_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUpdate {
    pub address_id: AddressId,
    pub balance: u128,
    pub tx_count: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("address data provider: {0}")]
    Provider(String),

    #[error("address book: {0}")]
    Book(String),
}

/// Address metadata owned outside the engine.
pub trait AddressBook: Send + Sync {
    fn tracked(&self) -> Result<Vec<TrackedAddress>, RefreshError>;
    fn record(&self, update: AddressUpdate) -> Result<(), RefreshError>;
}

/// Source of balances and transaction counts.
pub trait AddressDataProvider: Send + Sync {
    fn fetch(&self, address: &str) -> Result<AddressData, RefreshError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct AddressRefresher {
    book: Arc<dyn AddressBook>,
    provider: Arc<dyn AddressDataProvider>,
    schedule: RefreshSchedule,
}

impl AddressRefresher {
    pub fn new(
        book: Arc<dyn AddressBook>,
        provider: Arc<dyn AddressDataProvider>,
        schedule: RefreshSchedule,
    ) -> Self {
        Self {
            book,
            provider,
            schedule,
        }
    }

    pub fn schedule(&self) -> RefreshSchedule {
        self.schedule
    }

    /// Refreshes every address that is due at `now`. A failing address is
    /// logged and counted; it does not abort the cycle.
    pub fn refresh_once(&self, now: DateTime<Utc>) -> Result<RefreshReport, RefreshError> {
        let cutoff = chrono::Duration::from_std(self.schedule.min_refresh_interval)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut report = RefreshReport::default();
        for tracked in self.book.tracked()? {
            if tracked.last_refreshed.is_some_and(|at| at > cutoff) {
                report.skipped += 1;
                continue;
            }
            let result = self.provider.fetch(&tracked.address).and_then(|data| {
                self.book.record(AddressUpdate {
                    address_id: tracked.address_id,
                    balance: data.balance,
                    tx_count: data.tx_count,
                    fetched_at: now,
                })
            });
            match result {
                Ok(()) => report.refreshed += 1,
                Err(e) => {
                    warn!("refresh of address {} failed: {}", tracked.address_id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Starts the schedule on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<RefreshHandle> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("address-refresh".into())
            .spawn(move || self.run(shutdown_rx))?;
        Ok(RefreshHandle {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    fn run(&self, shutdown: Receiver<()>) {
        let start = after(self.schedule.initial_delay);
        select! {
            recv(shutdown) -> _ => return,
            recv(start) -> _ => {}
        }
        let ticker = tick(self.schedule.interval);
        loop {
            self.cycle();
            select! {
                recv(shutdown) -> _ => break,
                recv(ticker) -> _ => {}
            }
        }
        debug!("address refresh stopped");
    }

    fn cycle(&self) {
        match self.refresh_once(Utc::now()) {
            Ok(report) => info!(
                "address refresh: {} refreshed, {} skipped, {} failed",
                report.refreshed, report.skipped, report.failed
            ),
            Err(e) => warn!("address refresh cycle failed: {}", e),
        }
    }
}

/// Stops the refresh thread when stopped or dropped.
pub struct RefreshHandle {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the select.
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBook {
        tracked: Vec<TrackedAddress>,
        updates: Mutex<Vec<AddressUpdate>>,
    }

    impl AddressBook for MemoryBook {
        fn tracked(&self) -> Result<Vec<TrackedAddress>, RefreshError> {
            Ok(self.tracked.clone())
        }

        fn record(&self, update: AddressUpdate) -> Result<(), RefreshError> {
            self.updates.lock().unwrap().push(update);
            Ok(())
        }
    }

    struct FixedProvider(HashMap<String, AddressData>);

    impl AddressDataProvider for FixedProvider {
        fn fetch(&self, address: &str) -> Result<AddressData, RefreshError> {
            self.0
                .get(address)
                .copied()
                .ok_or_else(|| RefreshError::Provider(format!("unknown {address}")))
        }
    }

    fn tracked(id: AddressId, address: &str, last: Option<DateTime<Utc>>) -> TrackedAddress {
        TrackedAddress {
            address_id: id,
            address: address.into(),
            last_refreshed: last,
        }
    }

    fn provider() -> Arc<FixedProvider> {
        let mut data = HashMap::new();
        data.insert(
            "a".to_string(),
            AddressData {
                balance: 5_000,
                tx_count: 3,
            },
        );
        data.insert("b".to_string(), AddressData::default());
        Arc::new(FixedProvider(data))
    }

    #[test]
    fn test_default_schedule() {
        let schedule = RefreshSchedule::default();
        assert_eq!(schedule.initial_delay, Duration::from_secs(30));
        assert_eq!(schedule.interval, Duration::from_secs(600));
        assert_eq!(schedule.min_refresh_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_refresh_once_respects_min_interval() {
        let now = Utc::now();
        let book = Arc::new(MemoryBook {
            tracked: vec![
                tracked(1, "a", None),
                tracked(2, "b", Some(now - chrono::Duration::minutes(5))),
                tracked(3, "c", Some(now - chrono::Duration::hours(2))),
            ],
            ..MemoryBook::default()
        });
        let refresher = AddressRefresher::new(book.clone(), provider(), RefreshSchedule::default());

        let report = refresher.refresh_once(now).unwrap();
        assert_eq!(
            report,
            RefreshReport {
                refreshed: 1,
                skipped: 1,
                failed: 1
            }
        );
        let updates = book.updates.lock().unwrap();
        assert_eq!(
            *updates,
            vec![AddressUpdate {
                address_id: 1,
                balance: 5_000,
                tx_count: 3,
                fetched_at: now,
            }]
        );
    }

    #[test]
    fn test_spawned_task_runs_and_stops() {
        let book = Arc::new(MemoryBook {
            tracked: vec![tracked(1, "a", None)],
            ..MemoryBook::default()
        });
        let schedule = RefreshSchedule {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(3600),
            min_refresh_interval: Duration::ZERO,
        };
        let handle = AddressRefresher::new(book.clone(), provider(), schedule)
            .spawn()
            .unwrap();

        for _ in 0..200 {
            if !book.updates.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();
        assert_eq!(book.updates.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_before_first_cycle() {
        let book = Arc::new(MemoryBook::default());
        let handle = AddressRefresher::new(book.clone(), provider(), RefreshSchedule::default())
            .spawn()
            .unwrap();
        handle.stop();
        assert!(book.updates.lock().unwrap().is_empty());
    }
}
