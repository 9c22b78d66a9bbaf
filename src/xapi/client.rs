//! HTTPS client for the PAN-OS XML API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use super::response::ApiResponse;
use super::{CommitScope, XapiSession};
use crate::error::{PanError, Result};

/// Connection settings for [`PanXapi`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Verify the management certificate. Panorama ships with a self-signed
    /// certificate, so operators often turn this off.
    pub verify_tls: bool,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Authenticated XML API session.
pub struct PanXapi {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for PanXapi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanXapi")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn endpoint_for(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        if host.ends_with("/api") {
            format!("{host}/")
        } else {
            format!("{host}/api/")
        }
    } else {
        format!("https://{host}/api/")
    }
}

fn build_client(options: &SessionOptions) -> Result<Client> {
    let client = Client::builder()
        .timeout(options.request_timeout)
        .danger_accept_invalid_certs(!options.verify_tls)
        .build()?;
    Ok(client)
}

impl PanXapi {
    /// Generate an API key from username and password and return a session
    /// that uses it for every subsequent call.
    pub async fn keygen(
        host: &str,
        username: &str,
        password: &str,
        options: &SessionOptions,
    ) -> Result<Self> {
        let client = build_client(options)?;
        let endpoint = endpoint_for(host);
        debug!(endpoint = %endpoint, user = %username, "Requesting API key");

        let response = client
            .post(&endpoint)
            .form(&[("type", "keygen"), ("user", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let reply = ApiResponse::new(body);

        let envelope = match reply.envelope() {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(PanError::Authentication(format!(
                    "keygen returned HTTP {status}"
                )));
            }
            Err(e) => return Err(e),
        };
        if !envelope.success {
            error!(code = ?envelope.code, message = %envelope.message, "Key generation failed");
            return Err(PanError::Authentication(envelope.message));
        }

        let api_key = reply
            .api_key()
            .map_err(|e| PanError::Authentication(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Build a session from an API key that was generated earlier.
    pub fn with_api_key(host: &str, api_key: &str, options: &SessionOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
            endpoint: endpoint_for(host),
            api_key: api_key.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("key", self.api_key.as_str()));

        let kind = params
            .iter()
            .find(|(k, _)| *k == "type")
            .map(|(_, v)| *v)
            .unwrap_or("unknown");
        debug!(endpoint = %self.endpoint, kind, "POST");

        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(PanError::Authentication(format!("HTTP {status}")));
        }

        let reply = ApiResponse::new(body);
        let envelope = match reply.envelope() {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                error!(status = %status, "HTTP request failed");
                return Err(PanError::Api {
                    code: Some(u32::from(status.as_u16())),
                    message: format!("HTTP {status}"),
                });
            }
            Err(e) => return Err(e),
        };

        if !envelope.success {
            if envelope.code == Some(403) {
                return Err(PanError::Authentication(envelope.message));
            }
            error!(code = ?envelope.code, message = %envelope.message, "API call failed");
            return Err(PanError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(reply)
    }
}

#[async_trait]
impl XapiSession for PanXapi {
    async fn op(&self, cmd: &str, target: Option<&str>) -> Result<ApiResponse> {
        match target {
            Some(target) => {
                self.request(&[("type", "op"), ("cmd", cmd), ("target", target)])
                    .await
            }
            None => self.request(&[("type", "op"), ("cmd", cmd)]).await,
        }
    }

    async fn set(&self, xpath: &str, element: &str) -> Result<ApiResponse> {
        self.request(&[
            ("type", "config"),
            ("action", "set"),
            ("xpath", xpath),
            ("element", element),
        ])
        .await
    }

    async fn delete(&self, xpath: &str) -> Result<ApiResponse> {
        self.request(&[("type", "config"), ("action", "delete"), ("xpath", xpath)])
            .await
    }

    async fn commit(&self, cmd: &str, scope: CommitScope) -> Result<ApiResponse> {
        match scope {
            CommitScope::Local => self.request(&[("type", "commit"), ("cmd", cmd)]).await,
            CommitScope::All => {
                self.request(&[("type", "commit"), ("action", "all"), ("cmd", cmd)])
                    .await
            }
        }
    }
}
