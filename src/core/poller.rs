//! Polls an asynchronous job until it reaches a terminal state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::{Clock, TokioClock};
use super::job::{JobState, Outcome};
use super::progress::ProgressSink;
use crate::error::{PanError, Result};
use crate::xapi::{ApiResponse, XapiSession};

/// Poller options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Delay between two status queries
    pub interval: Duration,

    /// Give up after this long. `None` polls until the job finishes.
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Some(Duration::from_secs(3600)),
        }
    }
}

/// Run `fut` unless `cancel` trips first.
///
/// A token that is already cancelled wins without polling `fut`, so no
/// request goes out after Ctrl-C.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(PanError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PanError::Cancelled),
        res = fut => res,
    }
}

/// Status query for a job id.
pub fn show_job_cmd(job_id: &str) -> String {
    format!(
        "<show><jobs><id>{}</id></jobs></show>",
        quick_xml::escape::escape(job_id)
    )
}

pub struct JobPoller {
    options: PollOptions,
    clock: Arc<dyn Clock>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl JobPoller {
    pub fn new(options: PollOptions, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            options,
            clock: Arc::new(TokioClock),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> &Arc<dyn ProgressSink> {
        &self.progress
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the job referenced by `submission` to finish.
    ///
    /// The caller must have checked [`ApiResponse::has_job`]; a submission
    /// without a job id is reported as [`PanError::MalformedResponse`].
    /// `target` must be the same device qualifier used for the submission,
    /// otherwise the status query lands on the wrong device's job table.
    pub async fn await_job(
        &self,
        session: &dyn XapiSession,
        submission: &ApiResponse,
        target: Option<&str>,
    ) -> Result<Outcome> {
        let job_id = submission.job_id()?;
        self.await_job_id(session, &job_id, target).await
    }

    /// Same as [`await_job`](Self::await_job), starting from a known job id.
    pub async fn await_job_id(
        &self,
        session: &dyn XapiSession,
        job_id: &str,
        target: Option<&str>,
    ) -> Result<Outcome> {
        info!(job_id = %job_id, target = ?target, "Waiting for job");

        match self.poll(session, job_id, target).await {
            Err(e @ (PanError::Timeout { .. } | PanError::Cancelled)) => {
                self.progress.job_abandoned(job_id);
                Err(e)
            }
            other => other,
        }
    }

    async fn poll(
        &self,
        session: &dyn XapiSession,
        job_id: &str,
        target: Option<&str>,
    ) -> Result<Outcome> {
        let started = self.clock.now();
        let cmd = show_job_cmd(job_id);
        let mut state = JobState::submitted(job_id);

        loop {
            let reply = cancellable(&self.cancel, session.op(&cmd, target)).await?;
            let snapshot = reply.job_snapshot()?;
            debug!(
                job_id = %job_id,
                status = %snapshot.status,
                progress = ?snapshot.progress,
                "Job status"
            );

            state = state.observe(snapshot)?;

            match &state {
                JobState::Terminal(outcome) => {
                    self.progress.job_complete(outcome);
                    if outcome.is_success() {
                        info!(job_id = %job_id, "Job finished");
                    } else {
                        warn!(job_id = %job_id, details = %outcome.details, "Job failed");
                    }
                    return Ok(outcome.clone());
                }
                JobState::Polling { progress, .. } => {
                    self.progress.job_progress(job_id, *progress);
                }
                JobState::Submitted { .. } => {}
            }

            if let Some(deadline) = self.options.deadline {
                let waited = self.clock.now().saturating_duration_since(started);
                if waited >= deadline {
                    warn!(job_id = %job_id, waited_secs = waited.as_secs(), "Gave up waiting for job");
                    return Err(PanError::Timeout {
                        job_id: job_id.to_string(),
                        waited_secs: waited.as_secs(),
                    });
                }
            }

            cancellable(&self.cancel, async {
                self.clock.sleep(self.options.interval).await;
                Ok(())
            })
            .await?;
        }
    }
}
