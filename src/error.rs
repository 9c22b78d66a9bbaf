//! Error types for Panorama operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Job {job_id} failed: {details}")]
    JobFailed { job_id: String, details: String },

    #[error("Management endpoint unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Job {job_id} did not finish within {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("API error{}: {message}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Api { code: Option<u32>, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid name {0:?}: single quotes cannot appear in an XPath literal")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, PanError>;
