use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::core::{FailurePolicy, PollOptions};
use crate::xapi::SessionOptions;

const SYSTEM_CONFIG_PATH: &str = "/etc/panops/config.toml";
const LOCAL_CONFIG_PATH: &str = "panops.toml";
const ENV_PREFIX: &str = "PANOPS_";

/// Settings taken verbatim from the environment. Figment would otherwise
/// parse `PANOPS_PASSWORD=123456` as an integer.
const VERBATIM_ENV_KEYS: [&str; 4] = ["host", "username", "password", "api_key"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Panorama (or firewall) management address
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Skip key generation and use this key
    pub api_key: Option<String>,
    pub verify_tls: bool,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// 0 polls until the job finishes
    pub poll_timeout_secs: u64,
    pub on_job_failure: FailurePolicy,
    pub log_json: bool,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            api_key: None,
            verify_tls: true,
            request_timeout_secs: 60,
            poll_interval_secs: 5,
            poll_timeout_secs: 3600,
            on_job_failure: FailurePolicy::Abort,
            log_json: false,
            verbose: false,
        }
    }
}

/// How the session authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Password { username: String, password: String },
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file, then `PANOPS_*`
    /// environment variables, then `overrides` (serialized CLI flags).
    ///
    /// Without `config_file`, `/etc/panops/config.toml` and `./panops.toml`
    /// are read when present.
    pub fn new<T: Serialize>(config_file: Option<&Path>, overrides: Option<&T>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match config_file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                for path in [PathBuf::from(SYSTEM_CONFIG_PATH), PathBuf::from(LOCAL_CONFIG_PATH)] {
                    if path.exists() {
                        figment = figment.merge(Toml::file(path));
                    }
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&VERBATIM_ENV_KEYS));
        for key in VERBATIM_ENV_KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn host(&self) -> Result<&str> {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => Ok(host),
            _ => bail!("No management host configured (use --host or PANOPS_HOST)"),
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(Credentials::ApiKey(key.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::Password {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => bail!("No credentials configured: set an API key or both username and password"),
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            deadline: match self.poll_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            verify_tls: self.verify_tls,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            password: mask(&self.password),
            api_key: mask(&self.api_key),
            ..self.clone()
        }
    }
}
