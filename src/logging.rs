//! Logging and tracing initialization for panops.
//!
//! Structured logs go to stderr through the `tracing` ecosystem, either as
//! compact human-readable lines or as JSON for log aggregation. Stdout is
//! left to the operator-facing progress output.

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Configuration for the logging system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Output logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

impl LogConfig {
    fn level(&self) -> Level {
        if self.verbose { Level::DEBUG } else { Level::INFO }
    }

    /// Filter used when `RUST_LOG` is unset. Dependencies stay at warn so
    /// request-level chatter from the HTTP stack does not bury job progress.
    fn default_directives(&self) -> String {
        format!("warn,panops={}", self.level().as_str().to_lowercase())
    }
}

/// Install the global subscriber. Fails if one is already set.
///
/// Call once, after config is loaded. `RUST_LOG` overrides the level.
///
/// # Examples
///
/// ```ignore
/// panops::logging::init(LogConfig { json: true, ..Default::default() })?;
/// ```
pub fn init(config: LogConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
    });
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
}
