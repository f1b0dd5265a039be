//! End-to-end job runs through the worker pool.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use keyspace_hunter::job::{ClaimOutcome, FailureKind};
use keyspace_hunter::{
    derive_address, AddressVariant, GenerationMode, InMemoryJobStore, Job, JobStatus, JobStore,
    Network, TargetSet, WorkerPool, WorkerSettings, U256,
};

fn run_to_completion(store: Arc<InMemoryJobStore>, targets: TargetSet, workers: usize) {
    let settings = WorkerSettings {
        exit_when_idle: true,
        flush_every: 4,
        ..WorkerSettings::default()
    };
    let pool = WorkerPool::new(workers, store, Arc::new(targets), settings).unwrap();
    let deadline = Instant::now() + Duration::from_secs(60);
    while !pool.is_finished() {
        assert!(Instant::now() < deadline, "pool did not finish");
        thread::sleep(Duration::from_millis(5));
    }
    pool.join();
}

fn target_for(variant: AddressVariant, key: u64, id: u64) -> TargetSet {
    let address = derive_address(variant, Network::Mainnet, &U256::from_u64(key)).unwrap();
    let mut targets = TargetSet::new(Network::Mainnet);
    targets.insert(id, &address).unwrap();
    targets
}

#[test]
fn test_random_job_finds_key_three() {
    let variant = AddressVariant::Legacy { compressed: true };
    let store = Arc::new(InMemoryJobStore::with_jobs([Job::new(
        1,
        GenerationMode::Random,
        variant,
        "0x1",
        "0x5",
    )]));
    run_to_completion(store.clone(), target_for(variant, 3, 11), 2);

    let job = store.get(1).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    let found = job.result.unwrap();
    assert_eq!(found.candidate_scalar, U256::from_u64(3).to_hex());
    assert_eq!(found.address_id, 11);
    assert_eq!(
        found.address,
        derive_address(variant, Network::Mainnet, &U256::from_u64(3)).unwrap()
    );
    assert!(job.error.is_none());
}

#[test]
fn test_single_key_ascending_fails_with_cursor_past_end() {
    let x = U256::from_hex("0xABCDEF").unwrap();
    let store = Arc::new(InMemoryJobStore::with_jobs([Job::new(
        1,
        GenerationMode::Ascending,
        AddressVariant::Evm,
        "0xABCDEF",
        "0xabcdef",
    )]));
    run_to_completion(store.clone(), TargetSet::new(Network::Mainnet), 1);

    let job = store.get(1).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    let failure = job.error.unwrap();
    assert_eq!(failure.kind, FailureKind::RangeExhausted);
    assert_eq!(failure.mode, GenerationMode::Ascending);
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.cursor, Some(x.checked_increment().unwrap().to_hex()));
}

#[test]
fn test_descending_taproot_search() {
    let variant = AddressVariant::Taproot;
    let store = Arc::new(InMemoryJobStore::with_jobs([Job::new(
        1,
        GenerationMode::Descending,
        variant,
        "0x10",
        "0x40",
    )]));
    run_to_completion(store.clone(), target_for(variant, 0x20, 1), 1);

    let job = store.get(1).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempts, 0x40 - 0x20 + 1);
}

#[test]
fn test_many_jobs_each_run_once() {
    let variant = AddressVariant::SegWit;
    let jobs = (1..=12).map(|id| {
        let lower = format!("{:#x}", id * 100);
        let upper = format!("{:#x}", id * 100 + 9);
        Job::new(id, GenerationMode::Ascending, variant, lower, upper)
    });
    let store = Arc::new(InMemoryJobStore::with_jobs(jobs));
    run_to_completion(store.clone(), TargetSet::new(Network::Mainnet), 4);

    for job in store.jobs() {
        assert_eq!(job.status, JobStatus::Failed, "job {}", job.id);
        // A second worker running the same job would push attempts past 10.
        assert_eq!(job.attempts, 10, "job {}", job.id);
    }
}

#[test]
fn test_concurrent_claims_through_trait() {
    const CLAIMANTS: usize = 16;
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::with_jobs([Job::new(
        5,
        GenerationMode::Random,
        AddressVariant::default(),
        "1",
        "2",
    )]));
    let barrier = Arc::new(Barrier::new(CLAIMANTS));
    let handles: Vec<_> = (0..CLAIMANTS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.try_claim(5).unwrap()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|outcome| matches!(outcome, ClaimOutcome::Claimed(job) if job.status == JobStatus::Running))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(store.claim_next_pending().unwrap(), None);
}

#[test]
fn test_cancelled_pending_job_is_never_run() {
    let store = Arc::new(InMemoryJobStore::with_jobs([
        Job::new(1, GenerationMode::Ascending, AddressVariant::default(), "1", "4"),
        Job::new(2, GenerationMode::Ascending, AddressVariant::default(), "1", "4"),
    ]));
    assert!(store.cancel(2));
    run_to_completion(store.clone(), TargetSet::new(Network::Mainnet), 2);

    assert_eq!(store.get(1).unwrap().status, JobStatus::Failed);
    let cancelled = store.get(2).unwrap();
    assert_eq!(cancelled.status, JobStatus::Stopped);
    assert_eq!(cancelled.attempts, 0);
}
