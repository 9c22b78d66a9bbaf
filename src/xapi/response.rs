//! PAN-OS XML API responses.
//!
//! Every reply is wrapped in `<response status="..." code="...">`. The fields
//! the tools care about (job id, job status, device entries, API key) are
//! pulled out with a streaming walk over the document rather than by
//! searching for tag substrings.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::core::job::{JobResult, JobSnapshot, JobStatus};
use crate::error::{PanError, Result};

/// A raw response body as returned by the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    body: String,
}

/// `status`, `code` and message of the `<response>` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub success: bool,
    pub code: Option<u32>,
    pub message: String,
}

/// A managed firewall listed under a device-group's `<devices>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub hostname: Option<String>,
}

enum Node<'a, 'e> {
    Start(&'a BytesStart<'e>),
    Text(&'a str),
    End,
}

/// Walk `xml`, calling `visit` with the current element path for every
/// start tag, text node and end tag.
fn walk<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&[String], Node<'_, '_>) -> Result<()>,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                path.push(local_name(&e));
                visit(&path, Node::Start(&e))?;
            }
            Event::Empty(e) => {
                path.push(local_name(&e));
                visit(&path, Node::Start(&e))?;
                visit(&path, Node::End)?;
                path.pop();
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                visit(&path, Node::Text(&text))?;
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = String::from_utf8_lossy(&raw);
                visit(&path, Node::Text(text.trim()))?;
            }
            Event::End(_) => {
                visit(&path, Node::End)?;
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name).map_err(quick_xml::Error::from)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

impl ApiResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn envelope(&self) -> Result<Envelope> {
        let mut envelope = None;
        let mut lines: Vec<String> = Vec::new();

        walk(&self.body, |path, node| {
            match node {
                Node::Start(e) if path.len() == 1 && path[0] == "response" => {
                    let status = attribute(e, "status")?.unwrap_or_default();
                    let code = attribute(e, "code")?.and_then(|c| c.trim().parse().ok());
                    envelope = Some(Envelope {
                        success: status == "success",
                        code,
                        message: String::new(),
                    });
                }
                Node::Text(text) if path.iter().any(|p| p == "msg") && !text.is_empty() => {
                    lines.push(text.to_string());
                }
                _ => {}
            }
            Ok(())
        })?;

        let mut envelope = envelope.ok_or_else(|| {
            PanError::MalformedResponse("missing <response> envelope".to_string())
        })?;
        envelope.message = lines.join(" ");
        Ok(envelope)
    }

    /// Job id of a just-submitted asynchronous operation, if the response
    /// carries one. Accepts both `<job>J</job>` and `<job><id>J</id>...</job>`.
    pub fn find_job_id(&self) -> Result<Option<String>> {
        let mut job_id = None;

        walk(&self.body, |path, node| {
            if job_id.is_some() {
                return Ok(());
            }
            if let Node::Text(text) = node {
                if (ends_with(path, &["job"]) || ends_with(path, &["job", "id"]))
                    && !text.is_empty()
                {
                    job_id = Some(text.to_string());
                }
            }
            Ok(())
        })?;

        Ok(job_id)
    }

    pub fn has_job(&self) -> bool {
        matches!(self.find_job_id(), Ok(Some(_)))
    }

    pub fn job_id(&self) -> Result<String> {
        self.find_job_id()?.ok_or_else(|| {
            PanError::MalformedResponse("response does not reference a job".to_string())
        })
    }

    /// Parse the status of a job from a `show jobs id` response.
    pub fn job_snapshot(&self) -> Result<JobSnapshot> {
        let mut status = None;
        let mut progress = None;
        let mut result = None;
        let mut details: Vec<String> = Vec::new();

        walk(&self.body, |path, node| {
            let Node::Text(text) = node else {
                return Ok(());
            };
            if ends_with(path, &["job", "status"]) {
                status = Some(JobStatus::parse(text));
            } else if ends_with(path, &["job", "progress"]) {
                progress = text.trim().parse::<u8>().ok();
            } else if ends_with(path, &["job", "result"]) {
                result = Some(JobResult::parse(text));
            } else if let Some(pos) = path.iter().rposition(|p| p == "details") {
                if pos > 0 && path[pos - 1] == "job" && !text.is_empty() {
                    details.push(text.to_string());
                }
            }
            Ok(())
        })?;

        let status = status
            .ok_or_else(|| PanError::MalformedResponse("job status missing <status>".to_string()))?;
        let result = result
            .ok_or_else(|| PanError::MalformedResponse("job status missing <result>".to_string()))?;

        Ok(JobSnapshot {
            status,
            progress,
            result,
            details: if details.is_empty() {
                None
            } else {
                Some(details.join("\n"))
            },
        })
    }

    /// Device entries listed under any `<devices>` element.
    pub fn devices(&self) -> Result<Vec<DeviceEntry>> {
        let mut devices = Vec::new();
        let mut current: Option<DeviceEntry> = None;

        walk(&self.body, |path, node| {
            match node {
                Node::Start(e) if ends_with(path, &["devices", "entry"]) => {
                    let serial = attribute(e, "name")?.unwrap_or_default();
                    current = Some(DeviceEntry {
                        serial,
                        hostname: None,
                    });
                }
                Node::Text(text) if ends_with(path, &["devices", "entry", "hostname"]) => {
                    if let Some(device) = current.as_mut() {
                        device.hostname = Some(text.to_string());
                    }
                }
                Node::End if ends_with(path, &["devices", "entry"]) => {
                    if let Some(device) = current.take() {
                        devices.push(device);
                    }
                }
                _ => {}
            }
            Ok(())
        })?;

        Ok(devices)
    }

    /// API key from a keygen response.
    pub fn api_key(&self) -> Result<String> {
        let mut key = None;
        walk(&self.body, |path, node| {
            if let Node::Text(text) = node {
                if ends_with(path, &["result", "key"]) {
                    key = Some(text.to_string());
                }
            }
            Ok(())
        })?;
        key.filter(|k| !k.is_empty())
            .ok_or_else(|| PanError::MalformedResponse("keygen response has no <key>".to_string()))
    }
}
