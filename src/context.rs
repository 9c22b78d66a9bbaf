use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, Credentials};
use crate::core::{ConsoleProgress, JobPoller, ProgressSink, cancellable};
use crate::xapi::PanXapi;

/// Everything one invocation shares: configuration, the progress sink and
/// the cancellation token tripped by Ctrl-C.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            progress: Arc::new(ConsoleProgress::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn poller(&self) -> JobPoller {
        JobPoller::new(self.config.poll_options(), self.progress.clone())
            .with_cancellation(self.cancel.clone())
    }

    /// Open the session, generating an API key unless one is configured.
    pub async fn connect(&self) -> Result<PanXapi> {
        let host = self.config.host()?;
        let options = self.config.session_options();

        let session = match self.config.credentials()? {
            Credentials::ApiKey(key) => PanXapi::with_api_key(host, &key, &options)?,
            Credentials::Password { username, password } => {
                cancellable(
                    &self.cancel,
                    PanXapi::keygen(host, &username, &password, &options),
                )
                .await
                .with_context(|| format!("Failed to authenticate to {host}"))?
            }
        };

        tracing::debug!(endpoint = %session.endpoint(), "Session established");
        Ok(session)
    }
}
