//! Keyspace search CLI
//!
//! Usage:
//!   keyspace_hunter -l 1 -u ffff -a 1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH
//!   keyspace_hunter -m asc -t segwit -l 1 -u ffff --targets-file watch.txt
//!   keyspace_hunter --jobs-file jobs.json --targets-file watch.txt -w 8

use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use keyspace_hunter::job::JobOutcome;
use keyspace_hunter::worker::ReportTimer;
use keyspace_hunter::{Config, InMemoryJobStore, WorkerEvent, WorkerPool};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(1);
    }

    let targets = match config.load_targets() {
        Ok(targets) => Arc::new(targets),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let jobs = match config.load_jobs() {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Print startup info
    println!("Keyspace Hunter");
    println!("===============");
    println!("Network:  {}", config.network);
    println!("Targets:  {}", targets.len());
    println!("Jobs:     {}", jobs.len());
    println!("Workers:  {}", config.worker_count());
    println!();

    let store = Arc::new(InMemoryJobStore::with_jobs(jobs));
    let pool = match WorkerPool::new(
        config.worker_count(),
        store.clone(),
        targets,
        config.worker_settings(),
    ) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to start workers: {}", e);
            process::exit(1);
        }
    };

    // Set up ctrl-c handler
    let stop_flag = pool.stop_flag_clone();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_flag.store(true, std::sync::atomic::Ordering::Relaxed);
    }) {
        error!("Error setting Ctrl-C handler: {}", e);
    }

    println!("Searching... (Press Ctrl+C to stop)\n");

    let report_interval = Duration::from_secs(config.report_interval);
    let mut report = ReportTimer::new(report_interval, Instant::now());
    while !pool.is_finished() {
        if let Some(event) = pool.wait_for_event(report.remaining(Instant::now())) {
            print_event(&event);
        }
        if report.due(Instant::now()) {
            print_progress(&pool);
        }
    }
    // Events sent just before the last worker exited
    while let Some(event) = pool.try_recv() {
        print_event(&event);
    }
    if pool.is_stopped() {
        println!("\nStopped by user.");
    }

    // Print final stats
    println!("\n--- Final Statistics ---");
    println!("Candidates tried:   {}", format_number(pool.total_attempts()));
    println!("Matches found:      {}", pool.total_matches());
    println!("Jobs finished:      {}", pool.jobs_finished());
    println!("Time elapsed:       {:.2}s", pool.elapsed().as_secs_f64());
    println!(
        "Average speed:      {}/s",
        format_number(pool.attempts_per_second() as u64)
    );
    pool.join();

    match serde_json::to_string_pretty(&store.jobs()) {
        Ok(json) => println!("\n{}", json),
        Err(e) => error!("Failed to serialize jobs: {}", e),
    }
    info!("done");
}

fn print_event(event: &WorkerEvent) {
    if let WorkerEvent::Finished {
        job_id,
        outcome: JobOutcome::Succeeded(found),
        ..
    } = event
    {
        println!("=== Match (job {}) ===", job_id);
        println!("Address:     {}", found.address);
        println!("Address ID:  {}", found.address_id);
        println!("Private Key: {}", found.candidate_scalar);
        println!();
    }
}

fn print_progress(pool: &WorkerPool) {
    let attempts = pool.total_attempts();
    let rate = pool.attempts_per_second();
    let elapsed = pool.elapsed().as_secs();

    println!(
        "[{:>4}s] Tried {} keys ({}/s)",
        elapsed,
        format_number(attempts),
        format_number(rate as u64)
    );
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
