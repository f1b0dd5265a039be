//! Runtime configuration for the keyspace search CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::crypto::{AddressVariant, Network};
use crate::error::SearchError;
use crate::job::{Job, JobStatus};
use crate::keyspace::SearchRange;
use crate::matcher::{AddressId, TargetSet};
use crate::pipeline::GenerationMode;
use crate::worker::{RetryPolicy, WorkerSettings};

/// Keyspace search engine for Bitcoin and Ethereum addresses
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Generation mode: random, ascending or descending
    #[arg(short, long, default_value = "random")]
    pub mode: GenerationMode,

    /// Lower bound of the key range (hex, optional 0x)
    #[arg(short, long)]
    pub lower: Option<String>,

    /// Upper bound of the key range (hex, optional 0x)
    #[arg(short, long)]
    pub upper: Option<String>,

    /// Address variant: legacy, legacy-compressed, segwit, taproot or evm
    #[arg(short = 't', long, default_value = "legacy-compressed")]
    pub variant: AddressVariant,

    /// Target address (repeatable)
    #[arg(short = 'a', long = "target")]
    pub targets: Vec<String>,

    /// File with one target per line: `address` or `id address`
    #[arg(long)]
    pub targets_file: Option<PathBuf>,

    /// JSON file with an array of jobs to run
    #[arg(short, long)]
    pub jobs_file: Option<PathBuf>,

    /// Requeue STOPPED jobs from the jobs file, continuing from their cursor
    #[arg(long, default_value = "false")]
    pub resume_stopped: bool,

    /// Network: mainnet or testnet
    #[arg(short, long, default_value = "mainnet")]
    pub network: Network,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Random bytes pool size per worker
    #[arg(long, default_value = "4096")]
    pub pool_size: usize,

    /// Flush job progress every N candidates
    #[arg(long, default_value = "10000")]
    pub flush_every: u64,

    /// Flush job progress at least this often, in milliseconds
    #[arg(long, default_value = "1000")]
    pub flush_interval_ms: u64,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "5")]
    pub report_interval: u64,
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => {
                SearchRange::parse(lower, upper)?;
            }
            (None, None) if self.jobs_file.is_some() => {}
            (None, None) => {
                return Err(ConfigError::InvalidArgument(
                    "Either --lower and --upper or --jobs-file is required".into(),
                ))
            }
            _ => {
                return Err(ConfigError::InvalidArgument(
                    "--lower and --upper must be given together".into(),
                ))
            }
        }

        if self.targets.is_empty() && self.targets_file.is_none() {
            return Err(ConfigError::InvalidArgument(
                "At least one --target or a --targets-file is required".into(),
            ));
        }

        if self.workers == Some(0) {
            return Err(ConfigError::InvalidArgument("Worker count cannot be zero".into()));
        }

        if self.pool_size < 32 {
            return Err(ConfigError::InvalidArgument(
                "Pool size must be at least 32 bytes (one private key)".into(),
            ));
        }

        if self.flush_every == 0 {
            return Err(ConfigError::InvalidArgument("Flush cadence cannot be zero".into()));
        }

        if self.report_interval == 0 {
            return Err(ConfigError::InvalidArgument(
                "Report interval cannot be zero".into(),
            ));
        }

        Ok(())
    }

    /// Settings for every worker of the pool. The CLI exits once all jobs
    /// are done.
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            pool_size: self.pool_size,
            flush_every: self.flush_every,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            exit_when_idle: true,
            retry: RetryPolicy::default(),
            ..WorkerSettings::default()
        }
    }

    /// Decodes the command-line targets and the targets file.
    ///
    /// Command-line targets get ids 1, 2, ...; file lines without an id
    /// continue the sequence.
    pub fn load_targets(&self) -> Result<TargetSet, ConfigError> {
        let mut entries: Vec<(AddressId, String)> = self
            .targets
            .iter()
            .zip(1..)
            .map(|(address, id)| (id, address.clone()))
            .collect();

        if let Some(path) = &self.targets_file {
            let text = read_file(path)?;
            entries.extend(parse_targets(&text, entries.len() as AddressId + 1)?);
        }

        Ok(TargetSet::from_addresses(self.network, entries)?)
    }

    /// Jobs from the jobs file, followed by the job given on the command
    /// line, if any.
    pub fn load_jobs(&self) -> Result<Vec<Job>, ConfigError> {
        let mut jobs = match &self.jobs_file {
            Some(path) => serde_json::from_str::<Vec<Job>>(&read_file(path)?)?,
            None => Vec::new(),
        };

        if self.resume_stopped {
            for job in jobs.iter_mut().filter(|job| job.status == JobStatus::Stopped) {
                job.status = JobStatus::Pending;
            }
        }

        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            let id = jobs.iter().map(|job| job.id).max().map_or(1, |id| id + 1);
            jobs.push(Job::new(id, self.mode, self.variant, lower.as_str(), upper.as_str()));
        }

        Ok(jobs)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses `address` or `id address` lines. Blank lines and `#` comments are
/// skipped.
fn parse_targets(text: &str, first_id: AddressId) -> Result<Vec<(AddressId, String)>, ConfigError> {
    let mut next_id = first_id;
    let mut entries = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let entry = match (fields.next(), fields.next(), fields.next()) {
            (Some(address), None, None) => {
                let id = next_id;
                next_id += 1;
                (id, address.to_string())
            }
            (Some(id), Some(address), None) => {
                let id = id.parse().map_err(|_| {
                    ConfigError::InvalidArgument(format!("line {}: bad address id {:?}", number + 1, id))
                })?;
                (id, address.to_string())
            }
            _ => {
                return Err(ConfigError::InvalidArgument(format!(
                    "line {}: expected `address` or `id address`",
                    number + 1
                )))
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid jobs file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Search(#[from] SearchError),
}
