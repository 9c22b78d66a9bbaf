//! Asynchronous job model.
//!
//! The management plane answers long-running requests (commits, pushes,
//! content downloads and installs) with a job id. The job then moves through
//! `PEND` and `ACT` until it reaches `FIN`, at which point its result is
//! either `OK` or `FAIL`. [`JobState`] tracks one job from submission to its
//! terminal outcome and refuses any transition once that outcome is known.

use std::fmt;

use serde::Serialize;

use crate::error::{PanError, Result};

/// Status reported by `<show><jobs><id>..</id></jobs></show>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Active,
    Finished,
    Other(String),
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "PEND" | "QUEUED" => Self::Pending,
            "ACT" => Self::Active,
            "FIN" => Self::Finished,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Other(_) => 0,
            Self::Active => 1,
            Self::Finished => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PEND"),
            Self::Active => write!(f, "ACT"),
            Self::Finished => write!(f, "FIN"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Result field of a job. Only meaningful once the status is `FIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Ok,
    Fail,
    Pending,
    Other(String),
}

impl JobResult {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "OK" => Self::Ok,
            "FAIL" => Self::Fail,
            "PEND" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
            Self::Pending => write!(f, "PEND"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One parsed job-status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Percent complete. `None` when the device reports something other than
    /// a number, which PAN-OS does for finished jobs (it puts a timestamp there).
    pub progress: Option<u8>,
    pub result: JobResult,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeResult {
    Success,
    Fail,
}

/// Terminal outcome of a job, handed back to the caller of the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub job_id: String,
    pub result: OutcomeResult,
    /// Raw result text as reported by the device (`OK`, `FAIL`, ...).
    pub reported: String,
    pub details: String,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.result == OutcomeResult::Success
    }

    pub fn into_error(self) -> PanError {
        PanError::JobFailed {
            job_id: self.job_id,
            details: if self.details.is_empty() {
                format!("job finished as {}", self.reported)
            } else {
                self.details
            },
        }
    }
}

/// Lifecycle of a single job: Submitted -> Polling -> Terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted {
        job_id: String,
    },
    Polling {
        job_id: String,
        status: JobStatus,
        progress: Option<u8>,
        polls: u32,
    },
    Terminal(Outcome),
}

impl JobState {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self::Submitted {
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Submitted { job_id } | Self::Polling { job_id, .. } => job_id,
            Self::Terminal(outcome) => &outcome.job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Feed one status snapshot into the machine.
    ///
    /// A snapshot whose status ranks below the one already seen is kept out:
    /// the previous status stays in place so the job never appears to go
    /// backwards.
    pub fn observe(self, snapshot: JobSnapshot) -> Result<Self> {
        match self {
            Self::Terminal(outcome) => Err(PanError::MalformedResponse(format!(
                "status update for job {} after it finished",
                outcome.job_id
            ))),
            Self::Submitted { job_id } => Ok(Self::advance(job_id, None, 0, snapshot)),
            Self::Polling {
                job_id,
                status,
                progress,
                polls,
            } => Ok(Self::advance(job_id, Some((status, progress)), polls, snapshot)),
        }
    }

    fn advance(
        job_id: String,
        previous: Option<(JobStatus, Option<u8>)>,
        polls: u32,
        snapshot: JobSnapshot,
    ) -> Self {
        if snapshot.status.is_terminal() {
            let result = if snapshot.result == JobResult::Ok {
                OutcomeResult::Success
            } else {
                OutcomeResult::Fail
            };
            return Self::Terminal(Outcome {
                job_id,
                result,
                reported: snapshot.result.to_string(),
                details: snapshot.details.unwrap_or_default(),
            });
        }

        let (status, progress) = match previous {
            Some((prev, prev_progress)) if prev.rank() > snapshot.status.rank() => {
                tracing::warn!(
                    job_id = %job_id,
                    previous = %prev,
                    reported = %snapshot.status,
                    "Ignoring job status regression"
                );
                (prev, prev_progress)
            }
            _ => (snapshot.status, snapshot.progress),
        };

        Self::Polling {
            job_id,
            status,
            progress,
            polls: polls + 1,
        }
    }
}
