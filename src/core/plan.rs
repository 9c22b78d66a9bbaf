//! Ordered operation plans and the interpreter that runs them.
//!
//! Each sequencer (device migration, content update) builds a `Vec<Step>`
//! up front and hands it to [`Sequencer::run`]. Steps run strictly in order;
//! a step marked `await_job` is followed by a poll of the job it submitted,
//! when its response references one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use super::job::Outcome;
use super::poller::{JobPoller, cancellable};
use crate::error::{PanError, Result};
use crate::xapi::{ApiResponse, CommitScope, XapiSession};

/// What to do when a polled job finishes as a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the sequence at the failed job.
    #[default]
    Abort,
    /// Report the failure and run the remaining steps anyway.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            _ => Err(format!("Invalid failure policy: {s}")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// A single remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Delete { xpath: String },
    Set { xpath: String, element: String },
    Op { cmd: String, target: Option<String> },
    Commit { cmd: String },
    CommitAll { cmd: String },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Set { .. } => "set",
            Self::Op { .. } => "op",
            Self::Commit { .. } => "commit",
            Self::CommitAll { .. } => "commit-all",
        }
    }

    fn target(&self) -> Option<&str> {
        match self {
            Self::Op { target, .. } => target.as_deref(),
            _ => None,
        }
    }

    async fn execute(&self, session: &dyn XapiSession) -> Result<ApiResponse> {
        match self {
            Self::Delete { xpath } => session.delete(xpath).await,
            Self::Set { xpath, element } => session.set(xpath, element).await,
            Self::Op { cmd, target } => session.op(cmd, target.as_deref()).await,
            Self::Commit { cmd } => session.commit(cmd, CommitScope::Local).await,
            Self::CommitAll { cmd } => session.commit(cmd, CommitScope::All).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Shown to the operator before the call is made.
    pub description: String,
    pub operation: Operation,
    /// Poll the job the response references, if any.
    pub await_job: bool,
}

impl Step {
    pub fn new(description: impl Into<String>, operation: Operation) -> Self {
        Self {
            description: description.into(),
            operation,
            await_job: false,
        }
    }

    pub fn awaiting_job(mut self) -> Self {
        self.await_job = true;
        self
    }
}

/// Outcome of every job polled during a run, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn extend(&mut self, other: RunSummary) {
        self.outcomes.extend(other.outcomes);
    }
}

pub struct Sequencer<'a> {
    session: &'a dyn XapiSession,
    poller: &'a JobPoller,
    policy: FailurePolicy,
}

impl<'a> Sequencer<'a> {
    pub fn new(session: &'a dyn XapiSession, poller: &'a JobPoller, policy: FailurePolicy) -> Self {
        Self {
            session,
            poller,
            policy,
        }
    }

    /// Run `steps` in order.
    ///
    /// Transport and API errors end the run immediately, and so does
    /// cancellation of the poller's token: no step starts after it trips,
    /// and a request in flight is dropped. A failed job ends
    /// it under [`FailurePolicy::Abort`]; under [`FailurePolicy::Continue`]
    /// it is recorded in the summary and the next step runs.
    pub async fn run(&self, steps: &[Step]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for (index, step) in steps.iter().enumerate() {
            if self.poller.cancellation().is_cancelled() {
                warn!(step = %step.description, "Cancelled before step");
                return Err(PanError::Cancelled);
            }

            let span = info_span!("step", index, kind = step.operation.kind());
            let outcome = self.run_step(step).instrument(span).await?;

            if let Some(outcome) = outcome {
                if !outcome.is_success() && self.policy == FailurePolicy::Abort {
                    warn!(job_id = %outcome.job_id, step = %step.description, "Aborting sequence after failed job");
                    return Err(outcome.into_error());
                }
                summary.outcomes.push(outcome);
            }
        }

        Ok(summary)
    }

    async fn run_step(&self, step: &Step) -> Result<Option<Outcome>> {
        self.poller.progress().step(&step.description);
        info!(step = %step.description, "Running step");

        let reply = cancellable(
            self.poller.cancellation(),
            step.operation.execute(self.session),
        )
        .await?;

        if !step.await_job {
            return Ok(None);
        }
        if !reply.has_job() {
            info!(step = %step.description, "No job to wait for");
            return Ok(None);
        }

        let outcome = self
            .poller
            .await_job(self.session, &reply, step.operation.target())
            .await?;
        Ok(Some(outcome))
    }
}

/// Quote a value for use inside an XPath `[@name='...']` predicate.
pub fn xpath_literal(value: &str) -> Result<&str> {
    if value.contains('\'') {
        return Err(PanError::InvalidName(value.to_string()));
    }
    Ok(value)
}
