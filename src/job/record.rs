//! Search job records and their status machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::AddressVariant;
use crate::error::Result;
use crate::keyspace::{SearchRange, U256};
use crate::matcher::AddressId;
use crate::pipeline::{GenerationMode, MatchFound};

pub type JobId = u64;

/// Lifecycle of a job. `Succeeded`, `Failed` and `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Returns true if `self -> next` is an edge of the status machine.
    ///
    /// A pending job may be stopped before any worker claims it.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Stopped)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Stopped)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Outcome of applying a status to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The job already had that terminal status.
    Unchanged,
}

/// Payload of a successful search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMatch {
    pub candidate_scalar: String,
    pub address: String,
    pub address_id: AddressId,
}

impl From<MatchFound> for JobMatch {
    fn from(found: MatchFound) -> Self {
        Self {
            candidate_scalar: found.candidate_scalar.to_hex(),
            address: found.address,
            address_id: found.address_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RangeExhausted,
    MalformedRange,
    Internal,
}

/// Payload of a failed search, detailed enough to diagnose without a rerun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub cause: String,
    pub mode: GenerationMode,
    pub lower_bound: String,
    pub upper_bound: String,
    pub attempts: u64,
    pub cursor: Option<String>,
}

/// Terminal result reported through the job store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(JobMatch),
    Failed(JobFailure),
    Stopped,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Succeeded(_) => JobStatus::Succeeded,
            JobOutcome::Failed(_) => JobStatus::Failed,
            JobOutcome::Stopped => JobStatus::Stopped,
        }
    }
}

/// A unit of search work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub mode: GenerationMode,
    #[serde(default)]
    pub variant: AddressVariant,
    pub lower_bound: String,
    pub upper_bound: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub attempts: u64,
    #[serde(default)]
    pub result: Option<JobMatch>,
    #[serde(default)]
    pub error: Option<JobFailure>,
    /// Next key of an ascending or descending walk.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl Job {
    pub fn new(
        id: JobId,
        mode: GenerationMode,
        variant: AddressVariant,
        lower_bound: impl Into<String>,
        upper_bound: impl Into<String>,
    ) -> Self {
        Self {
            id,
            mode,
            variant,
            lower_bound: lower_bound.into(),
            upper_bound: upper_bound.into(),
            status: JobStatus::Pending,
            attempts: 0,
            result: None,
            error: None,
            cursor: None,
            version: 0,
        }
    }

    /// Parses and validates the bounds.
    pub fn range(&self) -> Result<SearchRange> {
        SearchRange::parse(&self.lower_bound, &self.upper_bound)
    }

    /// Parses the persisted cursor, if any.
    pub fn resume_cursor(&self) -> Result<Option<U256>> {
        self.cursor.as_deref().map(U256::from_hex).transpose()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the job to `next`. Re-applying the current terminal status is a
    /// no-op.
    pub fn transition(&mut self, next: JobStatus) -> std::result::Result<Transition, InvalidTransition> {
        if self.status == next && next.is_terminal() {
            return Ok(Transition::Unchanged);
        }
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(Transition::Applied)
    }

    /// Builds a failure payload from the job's current state.
    pub fn failure(&self, kind: FailureKind, cause: impl Into<String>, attempts: u64, cursor: Option<String>) -> JobFailure {
        JobFailure {
            kind,
            cause: cause.into(),
            mode: self.mode,
            lower_bound: self.lower_bound.clone(),
            upper_bound: self.upper_bound.clone(),
            attempts,
            cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(1, GenerationMode::Random, AddressVariant::default(), "0x1", "0x5")
    }

    #[test]
    fn test_happy_path() {
        let mut job = job();
        assert_eq!(job.transition(JobStatus::Running), Ok(Transition::Applied));
        assert_eq!(job.transition(JobStatus::Succeeded), Ok(Transition::Applied));
        assert!(job.is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        for terminal in [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Stopped] {
            for next in [
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Succeeded,
                JobStatus::Failed,
                JobStatus::Stopped,
            ] {
                let mut job = job();
                job.status = terminal;
                let result = job.transition(next);
                if next == terminal {
                    assert_eq!(result, Ok(Transition::Unchanged));
                } else {
                    assert!(result.is_err(), "{terminal} -> {next}");
                }
                assert_eq!(job.status, terminal);
            }
        }
    }

    #[test]
    fn test_running_is_not_reentrant() {
        let mut job = job();
        job.transition(JobStatus::Running).unwrap();
        assert_eq!(
            job.transition(JobStatus::Running),
            Err(InvalidTransition {
                from: JobStatus::Running,
                to: JobStatus::Running
            })
        );
        let mut pending = self::job();
        assert!(pending.transition(JobStatus::Succeeded).is_err());
        assert!(pending.transition(JobStatus::Stopped).is_ok());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"id":7,"mode":"ASCENDING","lower_bound":"0x1","upper_bound":"0xff"}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.mode, GenerationMode::Ascending);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.variant, AddressVariant::Legacy { compressed: true });
        assert_eq!(job.range().unwrap().upper(), U256::from_u64(0xff));

        let out = serde_json::to_value(&job).unwrap();
        assert_eq!(out["status"], "PENDING");
        assert_eq!(out["variant"], "legacy-compressed");
    }

    #[test]
    fn test_failure_payload_carries_context() {
        let job = job();
        let failure = job.failure(FailureKind::RangeExhausted, "done", 5, Some("06".into()));
        assert_eq!(failure.mode, GenerationMode::Random);
        assert_eq!(failure.lower_bound, "0x1");
        assert_eq!(failure.attempts, 5);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "range_exhausted");
    }
}
